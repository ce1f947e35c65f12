// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Flattens JSON records into log lines, batches them and pushes the batches
//! to Loki as JSON or snappy compressed protobuf.
//!
//! ```text
//!   Intake ──> PipelineHandle ──> BatchingPipeline ──> Batch ──> Sink ──> Loki
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod clock;
pub mod config;
pub mod entry;
pub mod errors;
pub mod flatten;
pub mod http;
pub mod intake;
pub mod intake_server;
pub mod pipeline;
pub mod reporter;
pub mod sink;
