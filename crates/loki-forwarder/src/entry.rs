// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

/// Loki stream labels. Ordered so both wire encodings render them stably.
pub type Labels = BTreeMap<String, String>;

/// One shippable log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub labels: Labels,
    /// Serialized flat record, a single line.
    pub line: String,
    /// Producer side estimate of the entry's weight in bytes, used for the
    /// batch byte threshold.
    pub size: usize,
    /// Unix nanoseconds. Overwritten by the pipeline on arrival.
    pub timestamp: i64,
}

impl Entry {
    /// Builds an entry whose size is the length of the line plus its labels.
    pub fn new(labels: Labels, line: impl Into<String>) -> Self {
        let line = line.into();
        let size = line.len()
            + labels
                .iter()
                .map(|(key, value)| key.len() + value.len())
                .sum::<usize>();
        Entry {
            labels,
            line,
            size,
            timestamp: 0,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_counts_line_and_labels() {
        let labels = Labels::from([("key".to_string(), "orders".to_string())]);
        let entry = Entry::new(labels, "0123456789");
        assert_eq!(entry.size, 10 + 3 + 6);
        assert_eq!(entry.timestamp, 0);
        assert_eq!(entry.with_size(4).size, 4);
    }
}
