// File: errors.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::fmt;

use crate::model::Variant;

/// Rejection reasons of the validation gate and the request builder.
/// Every message names the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidAttempts,
    BlankValidInput,
    BlankInvalidInput,
    BlankHost,
    InvalidPort(u32),
    InvalidProtocol(String),
    BlankRequest,
    MissingPlaceholder,
    MalformedHeaders,
    HostMismatch { header: String, configured: String },
    PortMismatch { header: u16, configured: u16 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAttempts => {
                write!(f, "No or incorrect value provided in the 'Attempts' field")
            }
            Self::BlankValidInput => write!(f, "No value provided in the 'Valid User' field"),
            Self::BlankInvalidInput => {
                write!(f, "No value provided in the 'Invalid User' field")
            }
            Self::BlankHost => write!(f, "No value provided in the 'Host' field"),
            Self::InvalidPort(port) => write!(
                f,
                "Incorrect value provided in the 'Port' field: {} (expected 1-65535)",
                port
            ),
            Self::InvalidProtocol(protocol) => write!(
                f,
                "Incorrect value provided in the 'Protocol' field: '{}' (expected http or https)",
                protocol
            ),
            Self::BlankRequest => write!(f, "No value provided in the 'Request' field"),
            Self::MissingPlaceholder => write!(
                f,
                "Placeholder '{}' not found in the 'Request' field",
                crate::template::PLACEHOLDER
            ),
            Self::MalformedHeaders => write!(
                f,
                "Could not extract the HTTP headers from the 'Request' field"
            ),
            Self::HostMismatch { header, configured } => write!(
                f,
                "Host mismatch between request header ('{}') and 'Host' field ('{}')",
                header, configured
            ),
            Self::PortMismatch { header, configured } => write!(
                f,
                "Port mismatch between request header ({}) and 'Port' field ({})",
                header, configured
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A single request attempt that did not produce a response.
#[derive(Debug)]
pub enum TransportError {
    Connect(String),
    Timeout(String),
    Tls(String),
    Io(std::io::Error),
    InvalidResponse(String),
    InvalidRequest(String),
    Client(reqwest::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "Connection failed: {}", msg),
            Self::Timeout(msg) => write!(f, "Timed out: {}", msg),
            Self::Tls(msg) => write!(f, "TLS error: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::Client(e) => write!(f, "HTTP client error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Client(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::Client(error)
    }
}

/// Raised while merging pending records into the result sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    OutOfOrder {
        variant: Variant,
        attempt: u32,
        last: u32,
    },
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrder {
                variant,
                attempt,
                last,
            } => write!(
                f,
                "Attempt #{} of type {} does not follow attempt #{}",
                attempt, variant, last
            ),
        }
    }
}

impl std::error::Error for IntegrationError {}

#[derive(Debug)]
pub enum EnumError {
    Config(ConfigError),
    ShutDown,
    RunInProgress,
    NoRuntime,
}

impl fmt::Display for EnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {}", e),
            Self::ShutDown => write!(f, "Scheduler has been shut down"),
            Self::RunInProgress => write!(f, "An enumeration run is still in progress"),
            Self::NoRuntime => write!(f, "No async runtime available to host the enumeration lane"),
        }
    }
}

impl std::error::Error for EnumError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for EnumError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

pub type EnumResult<T> = Result<T, EnumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages_name_the_field() {
        assert!(ConfigError::InvalidAttempts.to_string().contains("'Attempts'"));
        assert!(ConfigError::BlankValidInput.to_string().contains("'Valid User'"));
        assert!(ConfigError::BlankInvalidInput
            .to_string()
            .contains("'Invalid User'"));
        assert!(ConfigError::InvalidPort(0).to_string().contains("'Port'"));
        assert!(ConfigError::MissingPlaceholder
            .to_string()
            .contains("$ticktock$"));
    }

    #[test]
    fn test_enum_error_source() {
        use std::error::Error;

        let err = EnumError::from(ConfigError::BlankHost);
        assert!(err.source().is_some());
        assert!(EnumError::ShutDown.source().is_none());
    }
}
