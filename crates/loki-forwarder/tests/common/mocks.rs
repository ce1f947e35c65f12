// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock sinks and reporters

use async_trait::async_trait;
use loki_forwarder::batch::Batch;
use loki_forwarder::entry::Entry;
use loki_forwarder::errors::SinkError;
use loki_forwarder::reporter::ErrorReporter;
use loki_forwarder::sink::{SendOutcome, Sink};
use std::error::Error;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Send(Vec<Entry>),
    Shutdown,
}

/// Sink that records every call, optionally failing the first sends.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    failures_left: Mutex<usize>,
}

impl RecordingSink {
    pub fn failing_first(failures: usize) -> Self {
        RecordingSink {
            events: Mutex::new(Vec::new()),
            failures_left: Mutex::new(failures),
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    /// Entries of every send, in call order.
    pub fn sent(&self) -> Vec<Vec<Entry>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Send(entries) => Some(entries),
                SinkEvent::Shutdown => None,
            })
            .collect()
    }

    pub fn sent_lines(&self) -> Vec<Vec<String>> {
        self.sent()
            .into_iter()
            .map(|entries| entries.into_iter().map(|e| e.line).collect())
            .collect()
    }

    pub fn shutdowns(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == SinkEvent::Shutdown)
            .count()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn send(&self, batch: Batch) -> Result<SendOutcome, SinkError> {
        self.events
            .lock()
            .expect("lock poisoned")
            .push(SinkEvent::Send(batch.into_entries()));

        let mut failures_left = self.failures_left.lock().expect("lock poisoned");
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(SinkError::ShutDown);
        }
        Ok(SendOutcome::Accepted)
    }

    fn shutdown(&self) {
        self.events
            .lock()
            .expect("lock poisoned")
            .push(SinkEvent::Shutdown);
    }
}

/// Reporter that keeps the messages of reported errors.
#[derive(Default)]
pub struct CollectingReporter {
    pub reported: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn reported(&self) -> Vec<String> {
        self.reported.lock().expect("lock poisoned").clone()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, error: &(dyn Error + 'static)) {
        self.reported
            .lock()
            .expect("lock poisoned")
            .push(error.to_string());
    }
}
