// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! UDP listener feeding records into a pipeline.
//!
//! Each datagram carries one JSON record. Several producer tasks share the
//! socket so that flattening runs in parallel; they all push into the same
//! [`PipelineHandle`], which suspends them while the pipeline queue is full.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::errors::PipelineError;
use crate::intake::Intake;
use crate::pipeline::PipelineHandle;

// Largest possible UDP payload.
const BUFFER_SIZE: usize = 65_536;

#[derive(Debug, Clone)]
pub struct IntakeServerConfig {
    pub host: String,
    /// 0 binds an ephemeral port.
    pub port: u16,
    pub producers: usize,
    /// Value of the `key` label on every entry from this listener.
    pub routing_key: String,
}

pub struct IntakeServer {
    socket: Arc<UdpSocket>,
    intake: Intake,
    producers: usize,
    pipeline: PipelineHandle,
    cancel_token: CancellationToken,
}

impl IntakeServer {
    pub async fn new(
        config: &IntakeServerConfig,
        pipeline: PipelineHandle,
        cancel_token: CancellationToken,
    ) -> std::io::Result<IntakeServer> {
        let addr = format!("{}:{}", config.host, config.port);
        let socket = UdpSocket::bind(addr).await?;
        Ok(IntakeServer {
            socket: Arc::new(socket),
            intake: Intake::new(config.routing_key.clone()),
            producers: config.producers.max(1),
            pipeline,
            cancel_token,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives until cancelled or until the pipeline stops accepting entries.
    pub async fn spin(self) {
        info!(
            "intake-udp: listening on {:?} with {} producers",
            self.local_addr().ok(),
            self.producers
        );

        let mut producers = JoinSet::new();
        for id in 0..self.producers {
            let producer = Producer {
                id,
                socket: Arc::clone(&self.socket),
                intake: self.intake.clone(),
                pipeline: self.pipeline.clone(),
                cancel_token: self.cancel_token.clone(),
            };
            producers.spawn(producer.run());
        }

        while let Some(result) = producers.join_next().await {
            if let Err(e) = result {
                error!("intake-udp: producer task failed: {e}");
            }
        }
        info!("intake-udp: stopped");
    }
}

struct Producer {
    id: usize,
    socket: Arc<UdpSocket>,
    intake: Intake,
    pipeline: PipelineHandle,
    cancel_token: CancellationToken,
}

impl Producer {
    async fn run(self) {
        let mut buf = vec![0u8; BUFFER_SIZE];
        loop {
            let received = tokio::select! {
                () = self.cancel_token.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };
            let (len, src) = match received {
                Ok(received) => received,
                Err(e) => {
                    warn!("intake-udp: producer {} failed to receive: {e}", self.id);
                    continue;
                }
            };
            trace!("intake-udp: {len} bytes from {src}");

            let entry = match self.intake.entry_from_slice(&buf[..len]) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("intake-udp: skipping record from {src}: {e}");
                    continue;
                }
            };

            if let Err(PipelineError::Closed) = self.pipeline.push(entry).await {
                debug!("intake-udp: pipeline closed, producer {} exiting", self.id);
                break;
            }
        }
    }
}
