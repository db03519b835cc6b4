// File: runner.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use futures::FutureExt;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use log::{debug, info, warn};
use serde::Serialize;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::collector::ResultSink;
use crate::config::RunnerOptions;
use crate::model::{AttemptOutcome, AttemptResult, Variant};
use crate::template::ConcreteRequest;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Draining,
    Complete,
}

/// Bookkeeping of one batch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunState {
    pub variant: Variant,
    pub attempts_requested: u32,
    pub attempts_completed: u32,
    pub attempts_skipped: u32,
    pub is_shut_down: bool,
    pub phase: RunPhase,
}

impl RunState {
    pub fn new(variant: Variant, attempts_requested: u32) -> Self {
        RunState {
            variant,
            attempts_requested,
            attempts_completed: 0,
            attempts_skipped: 0,
            is_shut_down: false,
            phase: RunPhase::Idle,
        }
    }

    pub fn attempts_done(&self) -> u32 {
        self.attempts_completed + self.attempts_skipped
    }
}

/// Issues the attempts of one batch strictly one after another and times
/// each of them.
#[derive(Clone)]
pub struct TimedRequestRunner {
    transport: Arc<dyn Transport>,
    rate_limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
}

impl TimedRequestRunner {
    pub fn new(transport: Arc<dyn Transport>, options: &RunnerOptions) -> Self {
        let rate_limiter = NonZeroU32::new(options.rate_limit())
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        TimedRequestRunner {
            transport,
            rate_limiter,
        }
    }

    /// Runs `attempts` timed requests, pushing every response into `sink`.
    /// `sink.on_batch_complete` is called exactly once when the loop ends.
    pub async fn run<F>(
        &self,
        request: &ConcreteRequest,
        attempts: u32,
        variant: Variant,
        sink: &dyn ResultSink,
        mut on_progress: F,
    ) -> RunState
    where
        F: FnMut(&RunState),
    {
        let mut state = RunState::new(variant, attempts);
        state.phase = RunPhase::Running;
        on_progress(&state);

        info!(
            "Starting {} batch of {} attempts via {} transport (request {})",
            variant,
            attempts,
            self.transport.name(),
            request.fingerprint()
        );

        let completion = BatchCompletion::new(sink, variant);

        for attempt in 1..=attempts {
            debug!("Sending request number {} of type {}", attempt, variant);

            match self.attempt(request, attempt, variant).await {
                AttemptOutcome::Recorded(result) => {
                    debug!(
                        "# {} - Type: {} - Status Code: {} - Response Time: {}",
                        result.attempt_index(),
                        result.variant(),
                        result.status_code(),
                        result.response_time_ms()
                    );
                    sink.push(result);
                    state.attempts_completed += 1;
                }
                AttemptOutcome::Skipped {
                    attempt_index,
                    reason,
                } => {
                    warn!(
                        "Skipping attempt #{} of type {}: {}",
                        attempt_index, variant, reason
                    );
                    state.attempts_skipped += 1;
                }
            }
            on_progress(&state);
        }

        state.phase = RunPhase::Draining;
        on_progress(&state);
        info!("Received responses for type {}", variant);
        completion.finish();

        state.phase = RunPhase::Complete;
        on_progress(&state);
        state
    }

    /// Only the transport call sits inside the measured window.
    async fn attempt(&self, request: &ConcreteRequest, attempt: u32, variant: Variant) -> AttemptOutcome {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let start = Instant::now();
        let outcome = AssertUnwindSafe(self.transport.send(request))
            .catch_unwind()
            .await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(response)) => AttemptOutcome::Recorded(AttemptResult::new(
                attempt,
                elapsed.as_nanos() as f64 / 1_000_000.0,
                variant,
                response.status,
            )),
            Ok(Err(e)) => AttemptOutcome::Skipped {
                attempt_index: attempt,
                reason: e.to_string(),
            },
            Err(_) => AttemptOutcome::Skipped {
                attempt_index: attempt,
                reason: "transport panicked".to_string(),
            },
        }
    }
}

/// Raises `on_batch_complete` exactly once, also when the batch loop unwinds.
struct BatchCompletion<'a> {
    sink: &'a dyn ResultSink,
    variant: Variant,
    done: bool,
}

impl<'a> BatchCompletion<'a> {
    fn new(sink: &'a dyn ResultSink, variant: Variant) -> Self {
        BatchCompletion {
            sink,
            variant,
            done: false,
        }
    }

    fn finish(mut self) {
        self.done = true;
        self.sink.on_batch_complete(self.variant);
    }
}

impl Drop for BatchCompletion<'_> {
    fn drop(&mut self) {
        if !self.done {
            warn!("Batch of type {} ended abnormally, integrating partial results", self.variant);
            self.sink.on_batch_complete(self.variant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::transport::TransportResponse;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails every attempt whose number is listed, answers 200 otherwise.
    struct FlakyTransport {
        calls: AtomicU32,
        failing: Vec<u32>,
        panicking: Vec<u32>,
    }

    impl FlakyTransport {
        fn new(failing: Vec<u32>, panicking: Vec<u32>) -> Self {
            FlakyTransport {
                calls: AtomicU32::new(0),
                failing,
                panicking,
            }
        }
    }

    impl Transport for FlakyTransport {
        fn send<'a>(
            &'a self,
            _request: &'a ConcreteRequest,
        ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if self.panicking.contains(&call) {
                    panic!("boom");
                }
                if self.failing.contains(&call) {
                    return Err(TransportError::Connect("refused".to_string()));
                }
                Ok(TransportResponse::new(200))
            })
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        pushed: Mutex<Vec<AttemptResult>>,
        completed: Mutex<Vec<Variant>>,
    }

    impl ResultSink for RecordingSink {
        fn push(&self, result: AttemptResult) {
            self.pushed.lock().unwrap().push(result);
        }

        fn on_batch_complete(&self, variant: Variant) {
            self.completed.lock().unwrap().push(variant);
        }
    }

    fn request() -> ConcreteRequest {
        ConcreteRequest::new("a.test", 80, false, Variant::Valid, "GET / HTTP/1.1\r\n\r\n".to_string())
    }

    #[tokio::test]
    async fn test_emits_every_attempt_in_order() {
        let runner = TimedRequestRunner::new(
            Arc::new(FlakyTransport::new(vec![], vec![])),
            &RunnerOptions::new(),
        );
        let sink = RecordingSink::default();

        let state = runner.run(&request(), 5, Variant::Valid, &sink, |_| {}).await;

        let pushed = sink.pushed.lock().unwrap();
        let indices: Vec<u32> = pushed.iter().map(|r| r.attempt_index()).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert!(pushed.iter().all(|r| r.variant() == Variant::Valid));
        assert!(pushed.iter().all(|r| r.status_code() == 200));
        assert!(pushed.iter().all(|r| r.response_time_ms() >= 0.0));
        assert_eq!(*sink.completed.lock().unwrap(), vec![Variant::Valid]);
        assert_eq!(state.attempts_completed, 5);
        assert_eq!(state.phase, RunPhase::Complete);
    }

    #[tokio::test]
    async fn test_failed_attempts_are_skipped_not_fatal() {
        let runner = TimedRequestRunner::new(
            Arc::new(FlakyTransport::new(vec![2, 4], vec![])),
            &RunnerOptions::new(),
        );
        let sink = RecordingSink::default();

        let state = runner.run(&request(), 5, Variant::Invalid, &sink, |_| {}).await;

        let indices: Vec<u32> = sink
            .pushed
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.attempt_index())
            .collect();
        assert_eq!(indices, vec![1, 3, 5]);
        assert_eq!(state.attempts_skipped, 2);
        assert_eq!(sink.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_transport_only_loses_one_attempt() {
        let runner = TimedRequestRunner::new(
            Arc::new(FlakyTransport::new(vec![], vec![1])),
            &RunnerOptions::new(),
        );
        let sink = RecordingSink::default();

        runner.run(&request(), 3, Variant::Valid, &sink, |_| {}).await;

        assert_eq!(sink.pushed.lock().unwrap().len(), 2);
        assert_eq!(*sink.completed.lock().unwrap(), vec![Variant::Valid]);
    }

    #[tokio::test]
    async fn test_all_attempts_failing_still_completes_batch() {
        let runner = TimedRequestRunner::new(
            Arc::new(FlakyTransport::new(vec![1, 2], vec![])),
            &RunnerOptions::new(),
        );
        let sink = RecordingSink::default();

        runner.run(&request(), 2, Variant::Valid, &sink, |_| {}).await;

        assert!(sink.pushed.lock().unwrap().is_empty());
        assert_eq!(sink.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_walks_through_phases() {
        let runner = TimedRequestRunner::new(
            Arc::new(FlakyTransport::new(vec![], vec![])),
            &RunnerOptions::new(),
        );
        let sink = RecordingSink::default();
        let mut phases = Vec::new();

        runner
            .run(&request(), 2, Variant::Valid, &sink, |state| {
                if phases.last() != Some(&state.phase) {
                    phases.push(state.phase);
                }
            })
            .await;

        assert_eq!(
            phases,
            vec![RunPhase::Running, RunPhase::Draining, RunPhase::Complete]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_keeps_results() {
        let mut options = RunnerOptions::new();
        options.set_rate_limit(1000);
        let runner = TimedRequestRunner::new(Arc::new(FlakyTransport::new(vec![], vec![])), &options);
        let sink = RecordingSink::default();

        runner.run(&request(), 3, Variant::Valid, &sink, |_| {}).await;

        assert_eq!(sink.pushed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_batch_completes_when_progress_callback_panics() {
        let runner = TimedRequestRunner::new(
            Arc::new(FlakyTransport::new(vec![], vec![])),
            &RunnerOptions::new(),
        );
        let sink = RecordingSink::default();

        let outcome = AssertUnwindSafe(runner.run(&request(), 3, Variant::Valid, &sink, |state| {
            if state.attempts_completed == 2 {
                panic!("progress observer failed");
            }
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert_eq!(sink.pushed.lock().unwrap().len(), 2);
        assert_eq!(*sink.completed.lock().unwrap(), vec![Variant::Valid]);
    }
}
