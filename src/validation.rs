// File: validation.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{debug, error};

use crate::config::{EnumerationConfig, EnumerationParams, Protocol};
use crate::errors::ConfigError;
use crate::template::{header_lines, PLACEHOLDER};

/// Gatekeeper between raw parameters and a run. Checks are evaluated in a
/// fixed order and the first failure wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidationGate;

impl ValidationGate {
    pub fn new() -> Self {
        ValidationGate
    }

    pub fn validate(&self, params: &EnumerationParams) -> Result<EnumerationConfig, ConfigError> {
        let result = Self::check(params);
        if let Err(e) = &result {
            error!("Error: {}", e);
        }
        result
    }

    fn check(params: &EnumerationParams) -> Result<EnumerationConfig, ConfigError> {
        if params.attempts == 0 {
            return Err(ConfigError::InvalidAttempts);
        }

        if params.valid_input.trim().is_empty() {
            return Err(ConfigError::BlankValidInput);
        }

        if params.invalid_input.trim().is_empty() {
            return Err(ConfigError::BlankInvalidInput);
        }

        let host = params.host.trim();
        if host.is_empty() {
            return Err(ConfigError::BlankHost);
        }

        if params.port == 0 || params.port > u16::MAX as u32 {
            return Err(ConfigError::InvalidPort(params.port));
        }
        let port = params.port as u16;

        let protocol = Protocol::parse(&params.protocol)
            .ok_or_else(|| ConfigError::InvalidProtocol(params.protocol.clone()))?;

        if params.request_template.trim().is_empty() {
            return Err(ConfigError::BlankRequest);
        }

        if !params.request_template.contains(PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder);
        }

        verify_host_header(&params.request_template, host, port)?;

        debug!(
            "Validated target {}://{}:{} with {} attempts per variant",
            protocol, host, port, params.attempts
        );

        Ok(EnumerationConfig::new(
            host.to_string(),
            port,
            protocol,
            params.request_template.clone(),
            params.attempts,
            params.valid_input.clone(),
            params.invalid_input.clone(),
        ))
    }
}

/// Guards against a template copied from another target: a `Host:` header
/// must agree with the configured host and, when it carries one, port.
fn verify_host_header(template: &str, host: &str, port: u16) -> Result<(), ConfigError> {
    let lines = header_lines(template);
    if lines.first().map_or(true, |line| line.trim().is_empty()) {
        return Err(ConfigError::MalformedHeaders);
    }

    let Some(value) = lines.iter().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case("host").then(|| value.trim())
    }) else {
        return Ok(());
    };

    let (header_host, header_port) = split_host_port(value);

    if !header_host.eq_ignore_ascii_case(host) {
        return Err(ConfigError::HostMismatch {
            header: header_host.to_string(),
            configured: host.to_string(),
        });
    }

    match header_port {
        Some(header_port) if header_port != port => Err(ConfigError::PortMismatch {
            header: header_port,
            configured: port,
        }),
        _ => Ok(()),
    }
}

/// Splits a `Host` header value into hostname and optional port. A port
/// that does not parse counts as absent.
pub fn split_host_port(value: &str) -> (&str, Option<u16>) {
    if let Some(rest) = value.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() == 2 {
        (parts[0], parts[1].parse().ok())
    } else {
        (value, None)
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
