// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Single consumer batching engine between producers and a [`Sink`].
//!
//! # Architecture
//!
//! ```text
//!   producer tasks (N)
//!          │  PipelineHandle::push (waits while the queue is full)
//!          v
//!   ┌──────────────┐
//!   │ bounded mpsc │
//!   └──────┬───────┘
//!          v
//!   ┌──────────────────┐   count / bytes / timer / shutdown
//!   │ BatchingPipeline │ ─────────────────────────────────────> Sink::send
//!   └──────────────────┘
//! ```
//!
//! The pipeline task is the only writer of the open [`Batch`] and the only
//! caller of the sink, so at most one send is in flight and a slow backend
//! fills the queue, which in turn suspends producers.
//!
//! # Flush triggers
//!
//! 1. **Count / bytes**: checked after every append
//! 2. **Timer**: every `flush_interval`, if nothing was flushed for at least
//!    that long
//! 3. **Shutdown**: one pass over the entries already queued, then an
//!    unconditional final flush
//!
//! The event loop waits on all sources at once with no priority between them.
//!
//! # Status
//!
//! The loop publishes its [`PipelineStatus`] on a watch channel, so
//! [`PipelineHandle::status`] never waits on a flush in progress and does see
//! [`PipelineStatus::Flushing`] while a send is in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::{Batch, DEFAULT_MAX_BYTES, DEFAULT_MAX_COUNT};
use crate::clock::{Clock, SystemClock};
use crate::entry::Entry;
use crate::errors::PipelineError;
use crate::sink::{SendOutcome, Sink};

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_count: usize,
    pub max_bytes: usize,
    pub flush_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_count: DEFAULT_MAX_COUNT,
            max_bytes: DEFAULT_MAX_BYTES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |name| Err(PipelineError::InvalidThreshold { name });
        if self.max_count == 0 {
            return invalid("max_count");
        }
        if self.max_bytes == 0 {
            return invalid("max_bytes");
        }
        if self.flush_interval.is_zero() {
            return invalid("flush_interval");
        }
        if self.queue_capacity == 0 {
            return invalid("queue_capacity");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Accumulating,
    /// A send is in flight.
    Flushing,
    /// Terminal. The queue is closed and the sink shut down.
    Shutdown,
}

/// Owned by the task running [`BatchingPipeline::run`].
struct PipelineState {
    batch: Batch,
    last_flush: Instant,
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    sink: Option<Arc<dyn Sink>>,
    clock: Arc<dyn Clock>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        PipelineBuilder {
            config,
            sink: None,
            clock: Arc::new(SystemClock::new()),
        }
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replaces the [`SystemClock`] used to stamp entries.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<(BatchingPipeline, PipelineHandle), PipelineError> {
        let sink = self.sink.ok_or(PipelineError::MissingSink)?;
        self.config.validate()?;

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let (status_tx, status_rx) = watch::channel(PipelineStatus::Accumulating);
        let state = PipelineState {
            batch: Batch::new(self.config.max_count, self.config.max_bytes),
            last_flush: Instant::now(),
        };
        let cancel_token = CancellationToken::new();

        let pipeline = BatchingPipeline {
            core: Core {
                sink,
                clock: self.clock,
                flush_interval: self.config.flush_interval,
                status: status_tx,
            },
            rx,
            state,
            cancel_token: cancel_token.clone(),
        };
        let handle = PipelineHandle {
            tx,
            status: status_rx,
            cancel_token,
        };
        Ok((pipeline, handle))
    }
}

/// Producer side of a pipeline. Cheap to clone, one per producer task.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<Entry>,
    status: watch::Receiver<PipelineStatus>,
    cancel_token: CancellationToken,
}

impl PipelineHandle {
    /// Queues `entry`, waiting for room when the queue is full.
    pub async fn push(&self, entry: Entry) -> Result<(), PipelineError> {
        self.tx
            .send(entry)
            .await
            .map_err(|_| PipelineError::Closed)
    }

    pub fn try_push(&self, entry: Entry) -> Result<(), PipelineError> {
        self.tx.try_send(entry).map_err(|e| match e {
            TrySendError::Full(_) => PipelineError::Full,
            TrySendError::Closed(_) => PipelineError::Closed,
        })
    }

    /// Asks the pipeline to drain and stop. Returns immediately; await the
    /// task running [`BatchingPipeline::run`] to wait for the final flush.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Latest status published by the event loop. Never waits.
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        *self.status.borrow()
    }
}

struct Core {
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    flush_interval: Duration,
    status: watch::Sender<PipelineStatus>,
}

impl Core {
    async fn accept(&self, state: &mut PipelineState, mut entry: Entry) {
        // Producers race each other; Loki needs per stream ordering, so the
        // single consumer is the only place timestamps can be assigned.
        entry.timestamp = self.clock.now_nanos();
        state.batch.append(entry);
        if state.batch.is_full() {
            self.flush(state).await;
        }
    }

    async fn flush(&self, state: &mut PipelineState) {
        if state.batch.is_empty() {
            return;
        }
        let fresh = state.batch.renewed();
        let batch = std::mem::replace(&mut state.batch, fresh);
        let entries = batch.len();
        let bytes = batch.byte_size();

        self.status.send_replace(PipelineStatus::Flushing);
        match self.sink.send(batch).await {
            Ok(SendOutcome::Accepted) => {
                debug!("Flushed {entries} entries ({bytes} bytes)");
            }
            Ok(SendOutcome::Rejected { status, .. }) => {
                debug!("Flushed {entries} entries ({bytes} bytes), backend answered {status}");
            }
            Err(e) => {
                warn!("Dropped batch of {entries} entries: {e}");
            }
        }
        state.last_flush = Instant::now();
        self.status.send_replace(PipelineStatus::Accumulating);
    }

    async fn flush_if_stale(&self, state: &mut PipelineState) {
        if state.last_flush.elapsed() >= self.flush_interval {
            self.flush(state).await;
        }
    }
}

/// Consumer side of a pipeline; drive it with [`BatchingPipeline::run`].
pub struct BatchingPipeline {
    core: Core,
    rx: mpsc::Receiver<Entry>,
    state: PipelineState,
    cancel_token: CancellationToken,
}

impl BatchingPipeline {
    /// Runs until shutdown is requested or every [`PipelineHandle`] is
    /// dropped, then drains the queue, flushes and shuts the sink down.
    pub async fn run(self) {
        let BatchingPipeline {
            core,
            mut rx,
            mut state,
            cancel_token,
        } = self;

        info!(
            "Batching pipeline started, flushing at least every {:?}",
            core.flush_interval
        );

        let mut ticker = interval(core.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                maybe_entry = rx.recv() => {
                    let Some(entry) = maybe_entry else {
                        debug!("All pipeline handles dropped");
                        break;
                    };
                    core.accept(&mut state, entry).await;
                }
                _ = ticker.tick() => {
                    core.flush_if_stale(&mut state).await;
                }
                () = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        info!("Shutting down batching pipeline. Draining");

        // Entries offered from here on are rejected; only what is already
        // queued makes it into the final flush.
        rx.close();
        let mut drained = 0usize;
        while let Ok(entry) = rx.try_recv() {
            core.accept(&mut state, entry).await;
            drained += 1;
        }
        info!("Drained {drained} queued entries");

        core.flush(&mut state).await;
        core.sink.shutdown();
        core.status.send_replace(PipelineStatus::Shutdown);
        info!("Batching pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::entry::Labels;
    use crate::errors::SinkError;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct CountingSink {
        sends: StdMutex<Vec<usize>>,
    }

    #[async_trait]
    impl Sink for CountingSink {
        async fn send(&self, batch: Batch) -> Result<SendOutcome, SinkError> {
            self.sends.lock().expect("lock poisoned").push(batch.len());
            Ok(SendOutcome::Accepted)
        }

        fn shutdown(&self) {}
    }

    /// Holds every send until released.
    #[derive(Default)]
    struct GatedSink {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Sink for GatedSink {
        async fn send(&self, _batch: Batch) -> Result<SendOutcome, SinkError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(SendOutcome::Accepted)
        }

        fn shutdown(&self) {}
    }

    fn entry(line: &str) -> Entry {
        Entry::new(Labels::new(), line)
    }

    #[test]
    fn test_build_requires_sink() {
        let result = PipelineBuilder::new(PipelineConfig::default()).build();
        assert!(matches!(result, Err(PipelineError::MissingSink)));
    }

    #[test]
    fn test_config_validate() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));

        let cases = [
            (PipelineConfig { max_count: 0, ..Default::default() }, "max_count"),
            (PipelineConfig { max_bytes: 0, ..Default::default() }, "max_bytes"),
            (
                PipelineConfig {
                    flush_interval: Duration::ZERO,
                    ..Default::default()
                },
                "flush_interval",
            ),
            (
                PipelineConfig {
                    queue_capacity: 0,
                    ..Default::default()
                },
                "queue_capacity",
            ),
        ];
        for (config, name) in cases {
            assert_eq!(
                config.validate(),
                Err(PipelineError::InvalidThreshold { name })
            );
        }
    }

    #[tokio::test]
    async fn test_try_push_reports_full_queue() {
        let (_pipeline, handle) = PipelineBuilder::new(PipelineConfig {
            queue_capacity: 1,
            ..Default::default()
        })
        .sink(Arc::new(CountingSink::default()))
        .build()
        .expect("failed to build pipeline");

        assert_eq!(handle.try_push(entry("a")), Ok(()));
        assert_eq!(handle.try_push(entry("b")), Err(PipelineError::Full));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let sink = Arc::new(CountingSink::default());
        let (pipeline, handle) = PipelineBuilder::new(PipelineConfig::default())
            .sink(sink.clone())
            .clock(Arc::new(FixedClock(1)))
            .build()
            .expect("failed to build pipeline");

        assert_eq!(handle.status(), PipelineStatus::Accumulating);

        let task = tokio::spawn(pipeline.run());
        handle.push(entry("a")).await.expect("push failed");
        handle.shutdown();
        task.await.expect("pipeline task failed");

        assert_eq!(handle.status(), PipelineStatus::Shutdown);
        assert_eq!(*sink.sends.lock().expect("lock poisoned"), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_never_sends() {
        let sink = Arc::new(CountingSink::default());
        let (pipeline, handle) = PipelineBuilder::new(PipelineConfig::default())
            .sink(sink.clone())
            .build()
            .expect("failed to build pipeline");

        let task = tokio::spawn(pipeline.run());
        handle.shutdown();
        task.await.expect("pipeline task failed");

        assert!(sink.sends.lock().expect("lock poisoned").is_empty());
    }

    #[tokio::test]
    async fn test_status_is_flushing_during_send() {
        let sink = Arc::new(GatedSink::default());
        let (pipeline, handle) = PipelineBuilder::new(PipelineConfig {
            max_count: 1,
            ..Default::default()
        })
        .sink(sink.clone())
        .build()
        .expect("failed to build pipeline");
        let task = tokio::spawn(pipeline.run());

        handle.push(entry("a")).await.expect("push failed");
        sink.entered.notified().await;

        assert_eq!(handle.status(), PipelineStatus::Flushing);

        sink.release.notify_one();
        handle.shutdown();
        task.await.expect("pipeline task failed");
        assert_eq!(handle.status(), PipelineStatus::Shutdown);
    }
}
