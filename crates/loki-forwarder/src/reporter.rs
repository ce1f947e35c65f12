// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::fmt::Write;

use tracing::error;

/// Destination for errors worth surfacing outside of the logs, such as an
/// exception tracker. Handed to each component at construction.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &(dyn Error + 'static));
}

/// Reports errors as `error` level tracing events, including the source chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &(dyn Error + 'static)) {
        error!("{}", error_chain(error));
    }
}

/// Formats `error` followed by each of its sources, separated by `: `.
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(message, ": {cause}");
        source = cause.source();
    }
    message
}
