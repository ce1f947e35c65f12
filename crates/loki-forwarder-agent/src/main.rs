// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use loki_forwarder::{
    config::ForwarderConfig,
    intake_server::IntakeServer,
    pipeline::PipelineBuilder,
    reporter::TracingReporter,
    sink::create_sink,
};

const DEFAULT_LOG_LEVEL: &str = "info";

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("LOKI_FWD_LOG_LEVEL")
        .map(|val| val.trim().to_lowercase())
        .unwrap_or(DEFAULT_LOG_LEVEL.to_string());
    init_logging(&log_level);

    let config = match ForwarderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}. Shutting down.");
            return ExitCode::FAILURE;
        }
    };
    debug!("Loaded configuration: {config:?}");

    let sink = match create_sink(config.sink_mode, &config.push_url, Arc::new(TracingReporter)) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to create Loki sink: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (pipeline, handle) = match PipelineBuilder::new(config.pipeline_config())
        .sink(sink)
        .build()
    {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to build pipeline: {e}");
            return ExitCode::FAILURE;
        }
    };
    let pipeline_task = tokio::spawn(pipeline.run());

    let intake_cancel = CancellationToken::new();
    let intake_task = match IntakeServer::new(
        &config.intake_server_config(),
        handle.clone(),
        intake_cancel.clone(),
    )
    .await
    {
        Ok(server) => tokio::spawn(server.spin()),
        Err(e) => {
            error!(
                "Failed to bind intake on {}:{}: {e}",
                config.intake_host, config.intake_port
            );
            handle.shutdown();
            if let Err(e) = pipeline_task.await {
                error!("Pipeline task failed: {e}");
            }
            return ExitCode::FAILURE;
        }
    };

    wait_for_signal().await;

    // Producers stop first so the pipeline drains everything they queued.
    intake_cancel.cancel();
    if let Err(e) = intake_task.await {
        error!("Intake task failed: {e}");
    }
    handle.shutdown();
    if let Err(e) = pipeline_task.await {
        error!("Pipeline task failed: {e}");
        return ExitCode::FAILURE;
    }

    info!("Loki forwarder stopped");
    ExitCode::SUCCESS
}

fn init_logging(log_level: &str) {
    let env_filter = EnvFilter::try_new(format!("h2=off,hyper=off,rustls=off,{log_level}"))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }
    debug!("Logging subsystem enabled");
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => log_ctrl_c(result),
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
                }
                return;
            }
            Err(e) => error!("Failed to listen for SIGTERM: {e}"),
        }
    }
    log_ctrl_c(tokio::signal::ctrl_c().await);
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Received Ctrl+C, initiating shutdown"),
        Err(e) => error!("Failed to listen for Ctrl+C: {e}"),
    }
}
