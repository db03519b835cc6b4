// File: display.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use colored::*;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::collector::{ResultListener, ResultSnapshot};
use crate::model::Variant;
use crate::reports::text::{results_table, verdict_text};
use crate::stats::{TimingComparison, TimingSummary, Verdict};

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Prints the result table and timing summary once both result sets are
/// complete, and keeps the last complete snapshot for exporting.
pub struct ConsoleListener {
    threshold_ms: f64,
    suppress_output: bool,
    reports: AtomicUsize,
    last_ready: Mutex<Option<Arc<ResultSnapshot>>>,
}

impl ConsoleListener {
    pub fn new(threshold_ms: f64) -> Self {
        ConsoleListener {
            threshold_ms,
            suppress_output: false,
            reports: AtomicUsize::new(0),
            last_ready: Mutex::new(None),
        }
    }

    pub fn quiet(mut self) -> Self {
        self.suppress_output = true;
        self
    }

    /// How many times both result sets became complete.
    pub fn reports(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }

    pub fn last_ready(&self) -> Option<Arc<ResultSnapshot>> {
        match self.last_ready.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn render(&self, snapshot: &ResultSnapshot) -> String {
        let comparison = TimingComparison::from_snapshot(snapshot, self.threshold_ms);
        let mut output = String::new();

        output.push_str(&format!("\n{}\n", "Enumeration Results".bold()));
        output.push_str(&format!("{}\n", "=".repeat(19)));
        output.push_str(&results_table(snapshot));
        output.push('\n');
        output.push_str(&summary_line("valid", &comparison.valid));
        output.push_str(&summary_line("invalid", &comparison.invalid));

        let verdict = verdict_text(comparison.verdict);
        let verdict = match comparison.verdict {
            Verdict::Inconclusive => verdict.yellow(),
            _ => verdict.green().bold(),
        };
        output.push_str(&format!(
            "\nMedian delta: {} ms, {}\n",
            format!("{:.2}", comparison.median_delta_ms).cyan(),
            verdict
        ));
        output
    }
}

fn summary_line(label: &str, summary: &TimingSummary) -> String {
    format!(
        "  {:<8} median {:>9.2} ms  mean {:>9.2} ms  sd {:>8.2} ms  (n={})\n",
        label, summary.median_ms, summary.mean_ms, summary.std_dev_ms, summary.count
    )
}

impl ResultListener for ConsoleListener {
    fn on_integrated(&self, variant: Variant, snapshot: &ResultSnapshot) {
        debug!(
            "{} results integrated, {} stored",
            variant,
            snapshot.results(variant).len()
        );
    }

    fn on_aggregate_ready(&self, snapshot: &ResultSnapshot) {
        self.reports.fetch_add(1, Ordering::SeqCst);
        match self.last_ready.lock() {
            Ok(mut guard) => *guard = Some(Arc::new(snapshot.clone())),
            Err(poisoned) => *poisoned.into_inner() = Some(Arc::new(snapshot.clone())),
        }

        if !self.suppress_output {
            println!("{}", self.render(snapshot));
        }
    }
}
