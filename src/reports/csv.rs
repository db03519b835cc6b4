// File: csv.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;

use super::{ReportData, ReportGenerator};
use crate::model::AttemptResult;

pub const CSV_HEADER: &str = "Request, Input, Response Time, Status Code";

/// One row per attempt: attempt number, variant, response time in ms and
/// status code. Valid rows come first.
pub struct CsvGenerator;

impl CsvGenerator {
    pub fn new() -> Self {
        Self
    }

    fn append_rows(&self, csv: &mut String, results: &[AttemptResult]) {
        for result in results {
            csv.push_str(&format!(
                "{}, {}, {}, {}\n",
                result.attempt_index(),
                result.variant(),
                format_time(result.response_time_ms()),
                result.status_code()
            ));
        }
    }
}

/// Shortest decimal form, keeping one decimal on whole values (`201.0`).
pub fn format_time(ms: f64) -> String {
    if ms.is_finite() && ms.fract() == 0.0 {
        format!("{:.1}", ms)
    } else {
        format!("{}", ms)
    }
}

impl ReportGenerator for CsvGenerator {
    fn generate(&self, data: &ReportData) -> Result<String> {
        let mut csv = String::new();
        csv.push_str(CSV_HEADER);
        csv.push('\n');
        self.append_rows(&mut csv, data.results.valid());
        self.append_rows(&mut csv, data.results.invalid());
        Ok(csv)
    }

    fn file_extension(&self) -> &'static str {
        "csv"
    }

    fn content_type(&self) -> &'static str {
        "text/csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::test_support::sample_data;

    #[test]
    fn test_csv_layout() {
        let csv = CsvGenerator::new().generate(&sample_data()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1, valid, 201.0, 200");
        assert_eq!(lines[4], "1, invalid, 100.5, 200");
        assert!(lines[1..4].iter().all(|l| l.contains(", valid, ")));
        assert!(lines[4..].iter().all(|l| l.contains(", invalid, ")));
    }

    #[test]
    fn test_every_row_has_four_fields() {
        let csv = CsvGenerator::new().generate(&sample_data()).unwrap();
        assert!(csv.lines().all(|l| l.split(", ").count() == 4));
    }

    #[test]
    fn test_time_format_keeps_one_decimal_on_whole_values() {
        assert_eq!(format_time(201.0), "201.0");
        assert_eq!(format_time(0.0), "0.0");
        assert_eq!(format_time(12.5), "12.5");
        assert_eq!(format_time(12.35), "12.35");
    }
}
