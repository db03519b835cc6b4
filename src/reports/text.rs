// File: text.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;

use super::{ReportData, ReportGenerator};
use crate::collector::ResultSnapshot;
use crate::stats::{TimingSummary, Verdict};

const RULE: &str =
    "===============================================================================\n";
const CELL_WIDTH: usize = 22;

pub struct TextGenerator;

impl TextGenerator {
    pub fn new() -> Self {
        Self
    }

    fn format_summary(&self, label: &str, summary: &TimingSummary) -> String {
        format!(
            "{:<10} n={:<4} min={:.2} median={:.2} mean={:.2} p95={:.2} max={:.2} sd={:.2}\n",
            label,
            summary.count,
            summary.min_ms,
            summary.median_ms,
            summary.mean_ms,
            summary.p95_ms,
            summary.max_ms,
            summary.std_dev_ms
        )
    }
}

/// Side-by-side table with one row per attempt number.
pub fn results_table(snapshot: &ResultSnapshot) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:>8} | {:<width$} | {:<width$}\n",
        "Attempt",
        "Valid",
        "Invalid",
        width = CELL_WIDTH
    ));
    output.push_str(&format!(
        "{}-+-{}-+-{}\n",
        "-".repeat(8),
        "-".repeat(CELL_WIDTH),
        "-".repeat(CELL_WIDTH)
    ));

    for (attempt, valid, invalid) in snapshot.rows() {
        output.push_str(&format!(
            "{:>8} | {:<width$} | {:<width$}\n",
            attempt,
            valid.map(|r| r.display_cell()).unwrap_or_default(),
            invalid.map(|r| r.display_cell()).unwrap_or_default(),
            width = CELL_WIDTH
        ));
    }
    output
}

pub fn verdict_text(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::ValidSlower => "valid candidate responds measurably slower",
        Verdict::ValidFaster => "valid candidate responds measurably faster",
        Verdict::Inconclusive => "no distinguishable timing difference",
    }
}

impl ReportGenerator for TextGenerator {
    fn generate(&self, data: &ReportData) -> Result<String> {
        let mut output = String::new();

        output.push_str(RULE);
        output.push_str(&format!(
            "                          {}\n",
            data.title.to_uppercase()
        ));
        output.push_str(RULE);
        output.push_str(&format!(
            "Generated: {}\n",
            data.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!("Tool: ticktock v{}\n", env!("CARGO_PKG_VERSION")));
        output.push_str(RULE);
        output.push('\n');

        output.push_str("TARGET\n");
        output.push_str("------\n");
        output.push_str(&format!("Target:        {}\n", data.target));
        output.push_str(&format!("Attempts:      {}\n", data.attempts));
        output.push_str(&format!("Valid input:   {}\n", data.valid_input));
        output.push_str(&format!("Invalid input: {}\n\n", data.invalid_input));

        output.push_str("RESULTS\n");
        output.push_str("-------\n");
        if data.results.is_empty() {
            output.push_str("No results collected.\n\n");
        } else {
            output.push_str(&results_table(&data.results));
            output.push('\n');
        }

        output.push_str("TIMING SUMMARY\n");
        output.push_str("--------------\n");
        output.push_str(&self.format_summary("valid", &data.comparison.valid));
        output.push_str(&self.format_summary("invalid", &data.comparison.invalid));
        output.push_str(&format!(
            "Median delta:  {:.2} ms\n",
            data.comparison.median_delta_ms
        ));
        output.push_str(&format!(
            "Verdict:       {}\n",
            verdict_text(data.comparison.verdict)
        ));

        Ok(output)
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }

    fn content_type(&self) -> &'static str {
        "text/plain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::test_support::sample_data;

    #[test]
    fn test_table_has_row_per_attempt() {
        let data = sample_data();
        let table = results_table(&data.results);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[2].contains("201.00 ms (200)"));
        assert!(lines[2].contains("100.50 ms (200)"));
    }

    #[test]
    fn test_text_report_sections() {
        let report = TextGenerator::new().generate(&sample_data()).unwrap();

        assert!(report.contains("TICKTOCK ENUMERATION REPORT"));
        assert!(report.contains("Target:        https://a.test:443"));
        assert!(report.contains("valid candidate responds measurably slower"));
    }
}
