// File: scheduler.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use futures::FutureExt;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::collector::ResultCollector;
use crate::config::{EnumerationConfig, RunnerOptions};
use crate::errors::{EnumError, EnumResult};
use crate::model::Variant;
use crate::runner::{RunState, TimedRequestRunner};
use crate::template::{ConcreteRequest, RequestTemplate};
use crate::transport::Transport;

/// What the lane is doing right now.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LaneStatus {
    /// Batches queued or running.
    pub queued: usize,
    pub current: Option<RunState>,
    pub completed_batches: u64,
    pub shut_down: bool,
}

struct BatchJob {
    request: ConcreteRequest,
    attempts: u32,
    variant: Variant,
}

struct Lane {
    sender: mpsc::UnboundedSender<BatchJob>,
    handle: JoinHandle<()>,
}

/// Owns exactly one execution lane. Batches queued on it run strictly one
/// after another, so no two timed attempts ever overlap.
pub struct EnumerationScheduler {
    runner: TimedRequestRunner,
    collector: Arc<ResultCollector>,
    options: RunnerOptions,
    lane: Mutex<Option<Lane>>,
    shut_down: AtomicBool,
    status: Arc<watch::Sender<LaneStatus>>,
}

impl EnumerationScheduler {
    pub fn new(
        transport: Arc<dyn Transport>,
        collector: Arc<ResultCollector>,
        options: RunnerOptions,
    ) -> Self {
        let (status, _) = watch::channel(LaneStatus::default());
        EnumerationScheduler {
            runner: TimedRequestRunner::new(transport, &options),
            collector,
            options,
            lane: Mutex::new(None),
            shut_down: AtomicBool::new(false),
            status: Arc::new(status),
        }
    }

    pub fn collector(&self) -> Arc<ResultCollector> {
        Arc::clone(&self.collector)
    }

    pub fn status(&self) -> LaneStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaneStatus> {
        self.status.subscribe()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Clears previous results and queues the valid batch, then the invalid
    /// batch. Returns as soon as both are queued.
    pub fn start_run(&self, config: &EnumerationConfig) -> EnumResult<()> {
        let mut lane = lock(&self.lane);

        if self.is_shut_down() {
            return Err(EnumError::ShutDown);
        }

        if lane.as_ref().is_some_and(|l| l.handle.is_finished()) {
            warn!("Enumeration lane terminated unexpectedly, replacing it");
            *lane = None;
            self.status.send_modify(|s| {
                s.queued = 0;
                s.current = None;
            });
        }

        if self.status.borrow().queued > 0 {
            return Err(EnumError::RunInProgress);
        }

        let (valid, invalid) = RequestTemplate::new(config)
            .with_content_length_fixup(self.options.fix_content_length())
            .build()?;

        self.collector.reset();

        let sender = match lane.as_ref() {
            Some(existing) => existing.sender.clone(),
            None => {
                let spawned = self.spawn_lane()?;
                let sender = spawned.sender.clone();
                *lane = Some(spawned);
                sender
            }
        };

        info!(
            "Queueing enumeration against {}:{} ({} attempts per variant)",
            config.host(),
            config.port(),
            config.attempts()
        );

        for request in [valid, invalid] {
            let variant = request.variant();
            self.status.send_modify(|s| s.queued += 1);
            let job = BatchJob {
                request,
                attempts: config.attempts(),
                variant,
            };
            if sender.send(job).is_err() {
                warn!("Enumeration lane closed, dropping {} batch", variant);
                self.status
                    .send_modify(|s| s.queued = s.queued.saturating_sub(1));
            }
        }

        Ok(())
    }

    /// Discards collected results between runs.
    pub fn reset(&self) -> EnumResult<()> {
        let _lane = lock(&self.lane);
        if self.status.borrow().queued > 0 {
            return Err(EnumError::RunInProgress);
        }
        self.collector.reset();
        Ok(())
    }

    /// Stops accepting batches. Queued and running batches still finish;
    /// the lane task exits afterwards. Idempotent.
    pub fn shutdown(&self) {
        let mut lane = lock(&self.lane);
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender lets the lane drain its queue and stop.
        lane.take();
        self.status.send_modify(|s| s.shut_down = true);
        info!("Enumeration scheduler shut down");
    }

    /// Resolves once every queued batch has completed.
    pub async fn wait_idle(&self) {
        let mut receiver = self.status.subscribe();
        let _ = receiver.wait_for(|s| s.queued == 0).await;
    }

    fn spawn_lane(&self) -> EnumResult<Lane> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EnumError::NoRuntime)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = runtime.spawn(drive_lane(
            receiver,
            self.runner.clone(),
            Arc::clone(&self.collector),
            Arc::clone(&self.status),
        ));
        debug!("Spawned enumeration lane");
        Ok(Lane { sender, handle })
    }
}

impl Drop for EnumerationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn drive_lane(
    mut receiver: mpsc::UnboundedReceiver<BatchJob>,
    runner: TimedRequestRunner,
    collector: Arc<ResultCollector>,
    status: Arc<watch::Sender<LaneStatus>>,
) {
    while let Some(job) = receiver.recv().await {
        let batch = runner.run(
            &job.request,
            job.attempts,
            job.variant,
            collector.as_ref(),
            |state| {
                status.send_modify(|s| {
                    let mut state = state.clone();
                    state.is_shut_down = s.shut_down;
                    s.current = Some(state);
                })
            },
        );

        // A batch that panics still counts as finished.
        match AssertUnwindSafe(batch).catch_unwind().await {
            Ok(state) => debug!(
                "Finished {} batch: {} recorded, {} skipped",
                state.variant, state.attempts_completed, state.attempts_skipped
            ),
            Err(_) => error!("The {} batch panicked and was abandoned", job.variant),
        }

        status.send_modify(|s| {
            s.queued = s.queued.saturating_sub(1);
            s.completed_batches += 1;
        });
    }
    debug!("Enumeration lane stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
