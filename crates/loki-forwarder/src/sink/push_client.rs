// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::errors::SinkError;
use crate::http::get_client;
use crate::reporter::ErrorReporter;
use crate::sink::SendOutcome;

/// HTTP plumbing shared by both sink encodings: one POST per batch to the
/// Loki push endpoint.
pub(crate) struct PushClient {
    url: String,
    /// `None` once shut down.
    client: Mutex<Option<reqwest::Client>>,
    reporter: Arc<dyn ErrorReporter>,
}

impl PushClient {
    pub(crate) fn new(
        url: impl Into<String>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, SinkError> {
        let client = get_client().map_err(SinkError::Client)?;
        Ok(PushClient {
            url: url.into(),
            client: Mutex::new(Some(client)),
            reporter,
        })
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> Option<reqwest::Client> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) async fn push(
        &self,
        body: Vec<u8>,
        content_type: &'static str,
    ) -> Result<SendOutcome, SinkError> {
        let Some(client) = self.client() else {
            return Err(self.fail(SinkError::ShutDown));
        };

        let body_len = body.len();
        let start = Instant::now();
        let resp = client
            .post(&self.url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await;

        match resp {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::NO_CONTENT {
                    debug!(
                        "LOKI | Pushed {body_len} bytes in {} ms",
                        start.elapsed().as_millis()
                    );
                    return Ok(SendOutcome::Accepted);
                }
                let body = resp.text().await.unwrap_or_default();
                warn!("LOKI | Push not accepted: {status} - {body}");
                Ok(SendOutcome::Rejected { status, body })
            }
            Err(e) => Err(self.fail(SinkError::Transport(e))),
        }
    }

    /// Hands `error` to the reporter and gives it back for the caller.
    pub(crate) fn fail(&self, error: SinkError) -> SinkError {
        self.reporter.report(&error);
        error
    }

    pub(crate) fn shutdown(&self) {
        let released = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!("LOKI | Released pooled connections to {}", self.url);
        } else {
            debug!("LOKI | Sink already shut down");
        }
    }
}
