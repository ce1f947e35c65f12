// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::batch::Batch;
use crate::entry::Labels;
use crate::errors::SinkError;
use crate::reporter::ErrorReporter;
use crate::sink::push_client::PushClient;
use crate::sink::{SendOutcome, Sink};

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Serialize)]
struct PushBody<'a> {
    streams: Vec<JsonStream<'a>>,
}

#[derive(Serialize)]
struct JsonStream<'a> {
    stream: &'a Labels,
    values: [(String, &'a str); 1],
}

/// Serializes a batch into Loki's JSON push body, one stream per entry:
///
/// ```json
/// {"streams":[{"stream":{"key":"orders"},"values":[["1700000000000000000","{...}"]]}]}
/// ```
pub fn encode_json(batch: &Batch) -> Result<Vec<u8>, SinkError> {
    let body = PushBody {
        streams: batch
            .entries()
            .iter()
            .map(|entry| JsonStream {
                stream: &entry.labels,
                values: [(entry.timestamp.to_string(), entry.line.as_str())],
            })
            .collect(),
    };
    serde_json::to_vec(&body).map_err(SinkError::Serialization)
}

/// Pushes batches as JSON.
pub struct TextSink {
    client: PushClient,
}

impl TextSink {
    pub fn new(url: impl Into<String>, reporter: Arc<dyn ErrorReporter>) -> Result<Self, SinkError> {
        Ok(TextSink {
            client: PushClient::new(url, reporter)?,
        })
    }
}

#[async_trait]
impl Sink for TextSink {
    async fn send(&self, batch: Batch) -> Result<SendOutcome, SinkError> {
        let body = encode_json(&batch).map_err(|e| self.client.fail(e))?;
        debug!(
            "LOKI | Sending {} entries ({} bytes) to {}",
            batch.len(),
            body.len(),
            self.client.url()
        );
        self.client.push(body, JSON_CONTENT_TYPE).await
    }

    fn shutdown(&self) {
        self.client.shutdown();
    }
}
