// File: collector.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::errors::IntegrationError;
use crate::model::{AttemptResult, Variant};

/// Receiver of attempt records produced by the runner.
pub trait ResultSink: Send + Sync {
    fn push(&self, result: AttemptResult);

    /// Called once per batch, after its last attempt.
    fn on_batch_complete(&self, variant: Variant);
}

/// Presentation side of the collector: table views, statistics, exports.
/// Callbacks run outside the collector's lock.
pub trait ResultListener: Send + Sync {
    fn on_integrated(&self, _variant: Variant, _snapshot: &ResultSnapshot) {}

    fn on_aggregate_ready(&self, snapshot: &ResultSnapshot);
}

/// Immutable view of both result sequences as of one completed drain.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResultSnapshot {
    generation: u64,
    valid: Vec<AttemptResult>,
    invalid: Vec<AttemptResult>,
}

impl ResultSnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn valid(&self) -> &[AttemptResult] {
        &self.valid
    }

    pub fn invalid(&self) -> &[AttemptResult] {
        &self.invalid
    }

    pub fn results(&self, variant: Variant) -> &[AttemptResult] {
        match variant {
            Variant::Valid => &self.valid,
            Variant::Invalid => &self.invalid,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty() && self.invalid.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        CompletionGate::is_ready(self.valid.len(), self.invalid.len())
    }

    /// Whether both sides hold the same set of attempt indices.
    pub fn indices_aligned(&self) -> bool {
        let valid: BTreeSet<u32> = self.valid.iter().map(|r| r.attempt_index()).collect();
        let invalid: BTreeSet<u32> = self.invalid.iter().map(|r| r.attempt_index()).collect();
        valid == invalid
    }

    /// Rows of `(attempt, valid, invalid)` for side-by-side display.
    pub fn rows(&self) -> Vec<(u32, Option<&AttemptResult>, Option<&AttemptResult>)> {
        let indices: BTreeSet<u32> = self
            .valid
            .iter()
            .chain(self.invalid.iter())
            .map(|r| r.attempt_index())
            .collect();

        indices
            .into_iter()
            .map(|index| {
                (
                    index,
                    self.valid.iter().find(|r| r.attempt_index() == index),
                    self.invalid.iter().find(|r| r.attempt_index() == index),
                )
            })
            .collect()
    }
}

/// Decides when both sequences are comparable. Fires once per distinct
/// equal-sized, non-empty pair.
#[derive(Debug, Default, Clone)]
pub struct CompletionGate {
    fired_at: Option<usize>,
}

impl CompletionGate {
    pub fn new() -> Self {
        CompletionGate { fired_at: None }
    }

    pub fn is_ready(valid_len: usize, invalid_len: usize) -> bool {
        valid_len > 0 && valid_len == invalid_len
    }

    /// Returns `true` when aggregate-ready must be raised for these sizes.
    pub fn observe(&mut self, valid_len: usize, invalid_len: usize) -> bool {
        if Self::is_ready(valid_len, invalid_len) && self.fired_at != Some(valid_len) {
            self.fired_at = Some(valid_len);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.fired_at = None;
    }
}

#[derive(Debug, Default)]
struct Integrated {
    generation: u64,
    valid: Vec<AttemptResult>,
    invalid: Vec<AttemptResult>,
    gate: CompletionGate,
}

impl Integrated {
    fn accept(&mut self, result: AttemptResult) -> Result<(), IntegrationError> {
        let variant = result.variant();
        let target = match variant {
            Variant::Valid => &mut self.valid,
            Variant::Invalid => &mut self.invalid,
        };
        if let Some(last) = target.last() {
            if result.attempt_index() <= last.attempt_index() {
                return Err(IntegrationError::OutOfOrder {
                    variant,
                    attempt: result.attempt_index(),
                    last: last.attempt_index(),
                });
            }
        }
        target.push(result);
        Ok(())
    }

    fn snapshot(&self) -> ResultSnapshot {
        ResultSnapshot {
            generation: self.generation,
            valid: self.valid.clone(),
            invalid: self.invalid.clone(),
        }
    }
}

/// Buffers attempt records and integrates them into the authoritative
/// valid/invalid sequences, one drain at a time.
pub struct ResultCollector {
    pending: Mutex<VecDeque<AttemptResult>>,
    integrated: Mutex<Integrated>,
    snapshot: RwLock<Arc<ResultSnapshot>>,
    listeners: RwLock<Vec<Arc<dyn ResultListener>>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        ResultCollector {
            pending: Mutex::new(VecDeque::new()),
            integrated: Mutex::new(Integrated::default()),
            snapshot: RwLock::new(Arc::new(ResultSnapshot::default())),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn ResultListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ResultSnapshot> {
        match self.snapshot.read() {
            Ok(snapshot) => Arc::clone(&snapshot),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn valid_results(&self) -> Vec<AttemptResult> {
        self.snapshot().valid().to_vec()
    }

    pub fn invalid_results(&self) -> Vec<AttemptResult> {
        self.snapshot().invalid().to_vec()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Discards all results. Must not be called while a batch is running.
    pub fn reset(&self) {
        let mut integrated = lock(&self.integrated);
        lock(&self.pending).clear();
        integrated.valid.clear();
        integrated.invalid.clear();
        integrated.gate.reset();
        integrated.generation += 1;
        self.publish(integrated.snapshot());
        debug!("Cleared results");
    }

    fn publish(&self, snapshot: ResultSnapshot) -> Arc<ResultSnapshot> {
        let snapshot = Arc::new(snapshot);
        match self.snapshot.write() {
            Ok(mut current) => *current = Arc::clone(&snapshot),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&snapshot),
        }
        snapshot
    }

    fn listeners(&self) -> Vec<Arc<dyn ResultListener>> {
        match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Moves all pending records into the result sequences under the drain
    /// lock. Returns the published snapshot and whether the gate fired.
    fn drain(&self, variant: Variant) -> (Arc<ResultSnapshot>, bool) {
        let mut integrated = lock(&self.integrated);
        let mut batch = std::mem::take(&mut *lock(&self.pending));
        let mut moved = 0usize;

        while let Some(result) = batch.pop_front() {
            match integrated.accept(result) {
                Ok(()) => moved += 1,
                Err(e) => {
                    error!("Error: collecting results for type {}: {}", variant, e);
                    if !batch.is_empty() {
                        let mut pending = lock(&self.pending);
                        while let Some(rest) = batch.pop_back() {
                            pending.push_front(rest);
                        }
                    }
                    break;
                }
            }
        }

        integrated.generation += 1;
        let (valid_len, invalid_len) = (integrated.valid.len(), integrated.invalid.len());
        let fired = integrated.gate.observe(valid_len, invalid_len);
        let snapshot = self.publish(integrated.snapshot());

        debug!(
            "Integrated {} record(s) after {} batch: {} valid, {} invalid",
            moved, variant, valid_len, invalid_len
        );

        if fired && !snapshot.indices_aligned() {
            warn!("Result sets have equal size but cover different attempt numbers");
        }

        (snapshot, fired)
    }
}

impl Default for ResultCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink for ResultCollector {
    fn push(&self, result: AttemptResult) {
        lock(&self.pending).push_back(result);
    }

    fn on_batch_complete(&self, variant: Variant) {
        let (snapshot, fired) = self.drain(variant);

        let listeners = self.listeners();
        for listener in &listeners {
            notify(|| listener.on_integrated(variant, &snapshot));
        }

        if fired {
            info!(
                "Both result sets complete ({} attempts each)",
                snapshot.valid().len()
            );
            for listener in &listeners {
                notify(|| listener.on_aggregate_ready(&snapshot));
            }
        }
    }
}

/// Runs one listener callback; a panicking listener is logged and skipped.
fn notify<F: FnOnce()>(callback: F) {
    if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!("Result listener panicked, notification dropped");
    }
}

/// A panicking holder must not wedge the collector forever.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
#[path = "collector_tests.rs"]
mod collector_tests;
