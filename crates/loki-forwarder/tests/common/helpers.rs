// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use loki_forwarder::entry::{Entry, Labels};
use std::time::Duration;
use tokio::time::{sleep, timeout};

use super::mocks::RecordingSink;

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Entry with a `label1=value` label set and a producer chosen timestamp.
pub fn log_entry(line: &str, size: usize) -> Entry {
    let mut entry = Entry::new(labels(&[("label1", "value")]), line).with_size(size);
    entry.timestamp = 123;
    entry
}

/// Waits until `sink` has seen at least `sends` sends.
pub async fn wait_for_sends(sink: &RecordingSink, sends: usize) {
    let waited = timeout(Duration::from_secs(5), async {
        while sink.sent().len() < sends {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {sends} sends");
}
