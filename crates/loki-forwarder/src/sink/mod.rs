// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of batches to a Loki push endpoint.
//!
//! Two encodings sit behind the [`Sink`] trait:
//!
//! - **[`TextSink`]**: JSON body, `application/json`
//! - **[`BinarySink`]**: snappy compressed protobuf, `application/x-protobuf`
//!
//! Delivery is fire and forget. A failed push is logged, handed to the
//! [`ErrorReporter`] and the batch is dropped; nothing is retried.

pub mod binary;
pub mod logproto;
mod push_client;
pub mod text;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::info;

use crate::batch::Batch;
use crate::errors::{ConfigError, SinkError};
use crate::reporter::ErrorReporter;

pub use binary::BinarySink;
pub use text::TextSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The backend answered `204 No Content`.
    Accepted,
    /// Any other status. Soft failure: the batch is gone either way.
    Rejected { status: StatusCode, body: String },
}

#[async_trait]
pub trait Sink: Send + Sync {
    /// Delivers the whole batch in one request.
    async fn send(&self, batch: Batch) -> Result<SendOutcome, SinkError>;

    /// Releases pooled connections. Sends issued afterwards fail with
    /// [`SinkError::ShutDown`]; calling it again does nothing.
    fn shutdown(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkMode {
    #[default]
    Text,
    Binary,
}

impl FromStr for SinkMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "json" | "http" => Ok(SinkMode::Text),
            "binary" | "proto" | "protobuf" => Ok(SinkMode::Binary),
            _ => Err(ConfigError::invalid(
                "sink mode",
                s,
                "expected one of: text, json, http, binary, proto, protobuf",
            )),
        }
    }
}

impl fmt::Display for SinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkMode::Text => write!(f, "text"),
            SinkMode::Binary => write!(f, "binary"),
        }
    }
}

/// Builds the sink variant selected by `mode`.
pub fn create_sink(
    mode: SinkMode,
    url: &str,
    reporter: Arc<dyn ErrorReporter>,
) -> Result<Arc<dyn Sink>, SinkError> {
    info!("LOKI | Pushing to {url} using the {mode} encoding");
    Ok(match mode {
        SinkMode::Text => Arc::new(TextSink::new(url, reporter)?),
        SinkMode::Binary => Arc::new(BinarySink::new(url, reporter)?),
    })
}
