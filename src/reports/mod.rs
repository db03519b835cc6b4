// File: mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::collector::ResultSnapshot;
use crate::config::EnumerationConfig;
use crate::stats::TimingComparison;

pub mod csv;
pub mod json;
pub mod text;

pub const DEFAULT_THRESHOLD_MS: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub title: String,
    pub target: String,
    pub attempts: u32,
    pub valid_input: String,
    pub invalid_input: String,
    pub results: ResultSnapshot,
    pub comparison: TimingComparison,
}

pub trait ReportGenerator {
    fn generate(&self, data: &ReportData) -> Result<String>;
    fn file_extension(&self) -> &'static str;
    fn content_type(&self) -> &'static str;
}

pub struct ReportEngine {
    threshold_ms: f64,
}

impl ReportEngine {
    pub fn new() -> Self {
        Self {
            threshold_ms: DEFAULT_THRESHOLD_MS,
        }
    }

    pub fn with_threshold(mut self, threshold_ms: f64) -> Self {
        self.threshold_ms = threshold_ms;
        self
    }

    pub fn generate_report<P: AsRef<Path>>(
        &self,
        format: &str,
        data: &ReportData,
        output_path: Option<P>,
    ) -> Result<String> {
        let generator = self.get_generator(format)?;
        let content = generator.generate(data)?;

        if let Some(path) = output_path {
            std::fs::write(path, &content)?;
        }

        Ok(content)
    }

    pub fn create_report_data(&self, config: &EnumerationConfig, snapshot: &ResultSnapshot) -> ReportData {
        ReportData {
            generated_at: Utc::now(),
            title: "TickTock Enumeration Report".to_string(),
            target: format!("{}://{}:{}", config.protocol(), config.host(), config.port()),
            attempts: config.attempts(),
            valid_input: config.valid_input().to_string(),
            invalid_input: config.invalid_input().to_string(),
            results: snapshot.clone(),
            comparison: TimingComparison::from_snapshot(snapshot, self.threshold_ms),
        }
    }

    pub fn get_generator(&self, format: &str) -> Result<Box<dyn ReportGenerator>> {
        match format.to_lowercase().as_str() {
            "csv" => Ok(Box::new(csv::CsvGenerator::new())),
            "json" => Ok(Box::new(json::JsonGenerator::new())),
            "text" | "txt" => Ok(Box::new(text::TextGenerator::new())),
            _ => Err(anyhow::anyhow!("Unsupported report format: {}", format)),
        }
    }
}

impl Default for ReportEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::collector::{ResultCollector, ResultSink};
    use crate::config::EnumerationParams;
    use crate::model::{AttemptResult, Variant};
    use crate::validation::ValidationGate;

    pub fn sample_data() -> ReportData {
        let config = ValidationGate::new()
            .validate(&EnumerationParams {
                host: "a.test".to_string(),
                port: 443,
                protocol: "https".to_string(),
                request_template: "POST /login HTTP/1.1\r\nHost: a.test\r\n\r\nuser=$ticktock$"
                    .to_string(),
                attempts: 3,
                valid_input: "admin".to_string(),
                invalid_input: "zz9".to_string(),
            })
            .unwrap();

        let collector = ResultCollector::new();
        for i in 1..=3 {
            collector.push(AttemptResult::new(i, 200.0 + i as f64, Variant::Valid, 200));
        }
        for i in 1..=3 {
            collector.push(AttemptResult::new(i, 100.5, Variant::Invalid, 200));
        }
        collector.on_batch_complete(Variant::Invalid);

        ReportEngine::new().create_report_data(&config, &collector.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(ReportEngine::new().get_generator("xml").is_err());
        assert!(ReportEngine::new().get_generator("CSV").is_ok());
        assert!(ReportEngine::new().get_generator("txt").is_ok());
    }

    #[test]
    fn test_report_is_written_to_file() {
        let data = test_support::sample_data();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let content = ReportEngine::new()
            .generate_report("csv", &data, Some(&path))
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
        assert_eq!(data.target, "https://a.test:443");
    }
}
