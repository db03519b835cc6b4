// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    /// Case-insensitive; surrounding whitespace is ignored.
    pub fn parse(value: &str) -> Option<Protocol> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Https => f.write_str("https"),
        }
    }
}

/// Raw, unvalidated enumeration parameters as they arrive from the command
/// line or a JSON parameter file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnumerationParams {
    pub host: String,
    pub port: u32,
    pub protocol: String,
    pub request_template: String,
    pub attempts: u32,
    pub valid_input: String,
    pub invalid_input: String,
}

impl EnumerationParams {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
        let params = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse parameter file {}", path.display()))?;
        Ok(params)
    }

    /// Fills host, port and protocol from a target URL such as
    /// `https://login.example.com:8443/`.
    pub fn apply_target_url(&mut self, target: &str) -> Result<()> {
        let parsed = url::Url::parse(target).with_context(|| format!("Invalid target URL '{}'", target))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("No host in target URL '{}'", target))?;
        self.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        self.protocol = parsed.scheme().to_string();
        if let Some(port) = parsed.port_or_known_default() {
            self.port = port as u32;
        }
        Ok(())
    }
}

/// Parameters that passed the validation gate. Immutable.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnumerationConfig {
    host: String,
    port: u16,
    protocol: Protocol,
    request_template: String,
    attempts: u32,
    valid_input: String,
    invalid_input: String,
}

impl EnumerationConfig {
    pub(crate) fn new(
        host: String,
        port: u16,
        protocol: Protocol,
        request_template: String,
        attempts: u32,
        valid_input: String,
        invalid_input: String,
    ) -> Self {
        Self {
            host,
            port,
            protocol,
            request_template,
            attempts,
            valid_input,
            invalid_input,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn use_tls(&self) -> bool {
        self.protocol == Protocol::Https
    }

    pub fn request_template(&self) -> &str {
        &self.request_template
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn valid_input(&self) -> &str {
        &self.valid_input
    }

    pub fn invalid_input(&self) -> &str {
        &self.invalid_input
    }
}

/// Tuning knobs of the timed runner.
#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    rate_limit: u32,
    fix_content_length: bool,
}

impl RunnerOptions {
    pub fn new() -> Self {
        Self {
            rate_limit: 0,
            fix_content_length: true,
        }
    }

    /// Requests per second, `0` disables throttling.
    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn set_rate_limit(&mut self, rate_limit: u32) {
        self.rate_limit = rate_limit;
    }

    pub fn fix_content_length(&self) -> bool {
        self.fix_content_length
    }

    pub fn set_fix_content_length(&mut self, fix_content_length: bool) {
        self.fix_content_length = fix_content_length;
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    connect_timeout: Duration,
    read_timeout: Duration,
    insecure: bool,
    proxy: Option<String>,
    max_response_size: usize,
}

impl TransportOptions {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_millis(3000),
            read_timeout: Duration::from_millis(10000),
            insecure: false,
            proxy: None,
            max_response_size: 1024 * 1024,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn set_connect_timeout(&mut self, connect_timeout: Duration) {
        self.connect_timeout = connect_timeout;
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.read_timeout = read_timeout;
    }

    pub fn insecure(&self) -> bool {
        self.insecure
    }

    pub fn set_insecure(&mut self, insecure: bool) {
        self.insecure = insecure;
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn set_proxy(&mut self, proxy: Option<String>) {
        self.proxy = proxy;
    }

    pub fn max_response_size(&self) -> usize {
        self.max_response_size
    }

    pub fn set_max_response_size(&mut self, max_response_size: usize) {
        self.max_response_size = max_response_size;
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
