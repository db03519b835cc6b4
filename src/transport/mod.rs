// File: mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use futures::future::BoxFuture;
use std::collections::HashMap;

use crate::errors::TransportError;
use crate::template::ConcreteRequest;

pub mod client;
pub mod raw;

pub use client::ClientTransport;
pub use raw::RawTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body_len: usize,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        TransportResponse {
            status,
            headers: HashMap::new(),
            body_len: 0,
        }
    }
}

/// Capability that delivers one concrete request and reports the response
/// status. Implementations must not retry: every call is one timed attempt.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a ConcreteRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;

    fn name(&self) -> &'static str;
}

/// Parses the status line and header block of a raw HTTP/1.x response.
pub(crate) fn parse_response_head(raw: &str) -> Result<TransportResponse, TransportError> {
    let mut lines = raw.split("\r\n");

    let status_line = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| TransportError::InvalidResponse("No status line in response".to_string()))?;
    let parts: Vec<&str> = status_line.split_whitespace().collect();

    if parts.len() < 2 || !parts[0].starts_with("HTTP/") {
        return Err(TransportError::InvalidResponse(format!(
            "Invalid status line format: {}",
            status_line
        )));
    }

    let status: u16 = parts[1].parse().map_err(|_| {
        TransportError::InvalidResponse(format!("Invalid status code: {}", parts[1]))
    })?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    Ok(TransportResponse {
        status,
        headers,
        body_len: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_head() {
        let response = parse_response_head(
            "HTTP/1.1 302 Found\r\nLocation: /home\r\nContent-Length: 0\r\n\r\n",
        )
        .unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.headers.get("location").map(String::as_str), Some("/home"));
        assert_eq!(response.headers.get("content-length").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_parse_status_line_without_reason() {
        let response = parse_response_head("HTTP/1.1 204\r\n\r\n").unwrap();
        assert_eq!(response.status, 204);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_response_head("").is_err());
        assert!(parse_response_head("hello world\r\n\r\n").is_err());
        assert!(parse_response_head("HTTP/1.1 abc OK\r\n\r\n").is_err());
    }
}
