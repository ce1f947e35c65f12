// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types, one enum per concern.

/// A record could not be flattened.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FlattenError {
    #[error("record must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A raw intake payload could not be turned into an entry.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("failed to parse record: {0}")]
    Parse(serde_json::Error),
    #[error(transparent)]
    Flatten(#[from] FlattenError),
    #[error("failed to serialize flattened record: {0}")]
    Serialize(serde_json::Error),
}

/// Delivery of a batch failed. The batch is consumed either way.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("failed to serialize batch: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to compress batch: {0}")]
    Compression(snap::Error),
    #[error("failed to push batch: {0}")]
    Transport(reqwest::Error),
    #[error("sink has been shut down")]
    ShutDown,
}

/// Construction or intake errors raised by the batching pipeline.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline requires a sink")]
    MissingSink,
    #[error("{name} must be greater than zero")]
    InvalidThreshold { name: &'static str },
    #[error("pipeline queue is full")]
    Full,
    #[error("pipeline is closed")]
    Closed,
}

/// Configuration is missing, malformed or out of range.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
