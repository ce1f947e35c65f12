// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Threshold bounded container of entries awaiting delivery.
//!
//! A batch is filled by the pipeline, handed whole to a sink and then
//! dropped. It is full as soon as either threshold is reached:
//!
//! 1. **Count**: `len() >= max_count`
//! 2. **Bytes**: `byte_size() >= max_bytes`, summing [`Entry::size`]
//!
//! Setting `max_bytes` to [`DEFAULT_MAX_BYTES`] effectively leaves only the
//! count trigger. A `max_bytes` of zero makes every non-empty batch full and
//! is rejected when the configuration is validated.

use crate::entry::Entry;

/// Default count threshold.
pub const DEFAULT_MAX_COUNT: usize = 10_000;

/// Default byte threshold, large enough to never trigger in practice.
pub const DEFAULT_MAX_BYTES: usize = i32::MAX as usize;

#[derive(Debug, Clone)]
pub struct Batch {
    entries: Vec<Entry>,
    byte_size: usize,
    max_count: usize,
    max_bytes: usize,
}

impl Batch {
    #[must_use]
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Batch {
            // Capped so a huge count threshold does not allocate up front.
            entries: Vec::with_capacity(max_count.min(1024)),
            byte_size: 0,
            max_count,
            max_bytes,
        }
    }

    /// Empty batch with the same thresholds.
    #[must_use]
    pub fn renewed(&self) -> Self {
        Batch::new(self.max_count, self.max_bytes)
    }

    pub fn append(&mut self, entry: Entry) {
        self.byte_size = self.byte_size.saturating_add(entry.size);
        self.entries.push(entry);
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_count || self.byte_size >= self.max_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    #[must_use]
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}
