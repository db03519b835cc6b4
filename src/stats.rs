// File: stats.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use serde::Serialize;

use crate::collector::ResultSnapshot;
use crate::model::{round_ms, AttemptResult};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TimingSummary {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub std_dev_ms: f64,
}

impl TimingSummary {
    pub fn from_results(results: &[AttemptResult]) -> Self {
        let mut samples: Vec<f64> = results.iter().map(|r| r.response_time_ms()).collect();
        if samples.is_empty() {
            return TimingSummary::default();
        }
        samples.sort_by(|a, b| a.total_cmp(b));

        let count = samples.len();
        let mean = samples.iter().sum::<f64>() / count as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

        TimingSummary {
            count,
            min_ms: samples[0],
            max_ms: samples[count - 1],
            mean_ms: round_ms(mean),
            median_ms: round_ms(median(&samples)),
            p95_ms: percentile(&samples, 95),
            std_dev_ms: round_ms(variance.sqrt()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Verdict {
    /// The valid candidate answers measurably slower.
    ValidSlower,
    /// The valid candidate answers measurably faster.
    ValidFaster,
    Inconclusive,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimingComparison {
    pub valid: TimingSummary,
    pub invalid: TimingSummary,
    pub median_delta_ms: f64,
    pub verdict: Verdict,
}

impl TimingComparison {
    /// A gap counts only when the medians differ by more than `threshold_ms`
    /// and by more than the larger of the two standard deviations.
    pub fn from_snapshot(snapshot: &ResultSnapshot, threshold_ms: f64) -> Self {
        let valid = TimingSummary::from_results(snapshot.valid());
        let invalid = TimingSummary::from_results(snapshot.invalid());
        let delta = valid.median_ms - invalid.median_ms;
        let noise = valid.std_dev_ms.max(invalid.std_dev_ms);

        let verdict = if valid.count == 0 || invalid.count == 0 {
            Verdict::Inconclusive
        } else if delta.abs() > threshold_ms && delta.abs() > noise {
            if delta > 0.0 {
                Verdict::ValidSlower
            } else {
                Verdict::ValidFaster
            }
        } else {
            Verdict::Inconclusive
        };

        TimingComparison {
            valid,
            invalid,
            median_delta_ms: round_ms(delta),
            verdict,
        }
    }
}

fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len == 0 {
        return 0.0;
    }
    if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    }
}

fn percentile(sorted: &[f64], percentile: u8) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((percentile as f64 / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{ResultCollector, ResultSink};
    use crate::model::Variant;

    fn results(variant: Variant, times: &[f64]) -> Vec<AttemptResult> {
        times
            .iter()
            .enumerate()
            .map(|(i, t)| AttemptResult::new(i as u32 + 1, *t, variant, 200))
            .collect()
    }

    #[test]
    fn test_summary_of_empty_set() {
        assert_eq!(TimingSummary::from_results(&[]), TimingSummary::default());
    }

    #[test]
    fn test_summary_values() {
        let summary = TimingSummary::from_results(&results(Variant::Valid, &[40.0, 10.0, 30.0, 20.0]));
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min_ms, 10.0);
        assert_eq!(summary.max_ms, 40.0);
        assert_eq!(summary.mean_ms, 25.0);
        assert_eq!(summary.median_ms, 25.0);
        assert_eq!(summary.p95_ms, 40.0);
        assert_eq!(summary.std_dev_ms, 11.18);
    }

    fn snapshot(valid: &[f64], invalid: &[f64]) -> std::sync::Arc<ResultSnapshot> {
        let collector = ResultCollector::new();
        for r in results(Variant::Valid, valid)
            .into_iter()
            .chain(results(Variant::Invalid, invalid))
        {
            collector.push(r);
        }
        collector.on_batch_complete(Variant::Invalid);
        collector.snapshot()
    }

    #[test]
    fn test_clear_gap_is_distinguishable() {
        let comparison = TimingComparison::from_snapshot(
            &snapshot(&[250.0, 252.0, 249.0], &[101.0, 99.0, 100.0]),
            10.0,
        );
        assert_eq!(comparison.verdict, Verdict::ValidSlower);
        assert_eq!(comparison.median_delta_ms, 150.0);
    }

    #[test]
    fn test_noise_is_inconclusive() {
        let comparison = TimingComparison::from_snapshot(
            &snapshot(&[100.0, 300.0, 120.0, 280.0], &[110.0, 290.0, 130.0, 270.0]),
            10.0,
        );
        assert_eq!(comparison.verdict, Verdict::Inconclusive);
    }

    #[test]
    fn test_missing_side_is_inconclusive() {
        let comparison = TimingComparison::from_snapshot(&snapshot(&[100.0], &[]), 1.0);
        assert_eq!(comparison.verdict, Verdict::Inconclusive);
    }
}
