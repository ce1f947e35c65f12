// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use tracing::debug;

use crate::batch::Batch;
use crate::entry::Labels;
use crate::errors::SinkError;
use crate::reporter::ErrorReporter;
use crate::sink::logproto::{EntryAdapter, PushRequest, StreamAdapter};
use crate::sink::push_client::PushClient;
use crate::sink::{SendOutcome, Sink};

pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Renders labels in Loki's selector syntax, e.g. `{clientId="c1", key="orders"}`.
pub fn format_labels(labels: &Labels) -> String {
    let pairs: Vec<String> = labels
        .iter()
        .map(|(key, value)| format!("{key}={}", quote(value)))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

/// Double quotes `value` with the escapes Loki's label parser accepts.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_ascii_control() => {
                let _ = write!(quoted, "\\x{:02x}", u32::from(c));
            }
            c if c.is_control() => {
                let _ = write!(quoted, "\\u{:04x}", u32::from(c));
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn to_timestamp(unix_nanos: i64) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: unix_nanos.div_euclid(NANOS_PER_SECOND),
        // Always in 0..1e9 so the cast is lossless.
        nanos: unix_nanos.rem_euclid(NANOS_PER_SECOND) as i32,
    }
}

#[must_use]
pub fn build_push_request(batch: &Batch) -> PushRequest {
    PushRequest {
        streams: batch
            .entries()
            .iter()
            .map(|entry| StreamAdapter {
                labels: format_labels(&entry.labels),
                entries: vec![EntryAdapter {
                    timestamp: Some(to_timestamp(entry.timestamp)),
                    line: entry.line.clone(),
                }],
                hash: 0,
            })
            .collect(),
    }
}

/// Protobuf encodes the batch and compresses it with raw (block) snappy, the
/// framing Loki expects on its push endpoint.
pub fn encode_protobuf(batch: &Batch) -> Result<Vec<u8>, SinkError> {
    let buf = build_push_request(batch).encode_to_vec();
    snap::raw::Encoder::new()
        .compress_vec(&buf)
        .map_err(SinkError::Compression)
}

/// Pushes batches as snappy compressed protobuf.
pub struct BinarySink {
    client: PushClient,
}

impl BinarySink {
    pub fn new(url: impl Into<String>, reporter: Arc<dyn ErrorReporter>) -> Result<Self, SinkError> {
        Ok(BinarySink {
            client: PushClient::new(url, reporter)?,
        })
    }
}

#[async_trait]
impl Sink for BinarySink {
    async fn send(&self, batch: Batch) -> Result<SendOutcome, SinkError> {
        let body = encode_protobuf(&batch).map_err(|e| self.client.fail(e))?;
        debug!(
            "LOKI | Sending {} entries ({} compressed bytes) to {}",
            batch.len(),
            body.len(),
            self.client.url()
        );
        self.client.push(body, PROTOBUF_CONTENT_TYPE).await
    }

    fn shutdown(&self) {
        self.client.shutdown();
    }
}
