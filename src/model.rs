// File: model.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which candidate value was substituted into the request template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Valid,
    Invalid,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Valid => "valid",
            Variant::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed request that produced a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptResult {
    attempt_index: u32,
    response_time_ms: f64,
    variant: Variant,
    status_code: u16,
}

impl AttemptResult {
    /// `response_time_ms` is clamped to zero and rounded to two decimals.
    pub fn new(attempt_index: u32, response_time_ms: f64, variant: Variant, status_code: u16) -> Self {
        AttemptResult {
            attempt_index,
            response_time_ms: round_ms(response_time_ms.max(0.0)),
            variant,
            status_code,
        }
    }

    pub fn attempt_index(&self) -> u32 {
        self.attempt_index
    }

    pub fn response_time_ms(&self) -> f64 {
        self.response_time_ms
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Table cell rendering, e.g. `123.45 ms (200)`.
    pub fn display_cell(&self) -> String {
        format!("{:.2} ms ({})", self.response_time_ms, self.status_code)
    }
}

/// Outcome of a single attempt in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Recorded(AttemptResult),
    Skipped { attempt_index: u32, reason: String },
}

impl AttemptOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AttemptOutcome::Recorded(_))
    }
}

pub(crate) fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}
