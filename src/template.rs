// File: template.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::config::EnumerationConfig;
use crate::errors::ConfigError;
use crate::model::Variant;

pub const PLACEHOLDER: &str = "$ticktock$";

const HEAD_SEPARATOR: &str = "\r\n\r\n";

static CONTENT_LENGTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(content-length[ \t]*:)[ \t]*\d*").unwrap());

/// A fully substituted request for one variant, bound to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteRequest {
    host: String,
    port: u16,
    use_tls: bool,
    variant: Variant,
    raw: String,
}

impl ConcreteRequest {
    pub fn new(host: &str, port: u16, use_tls: bool, variant: Variant, raw: String) -> Self {
        ConcreteRequest {
            host: host.to_string(),
            port,
            use_tls,
            variant,
            raw,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.raw.as_bytes());
        let digest = hasher.finalize();
        digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
    }

    /// Base URL of the target, e.g. `https://a.test:443`.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        if self.host.contains(':') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

pub struct RequestTemplate<'a> {
    config: &'a EnumerationConfig,
    fix_content_length: bool,
}

impl<'a> RequestTemplate<'a> {
    pub fn new(config: &'a EnumerationConfig) -> Self {
        RequestTemplate {
            config,
            fix_content_length: true,
        }
    }

    pub fn with_content_length_fixup(mut self, enabled: bool) -> Self {
        self.fix_content_length = enabled;
        self
    }

    /// Builds the valid and the invalid request, in that order.
    pub fn build(&self) -> Result<(ConcreteRequest, ConcreteRequest), ConfigError> {
        let template = self.config.request_template();
        if !template.contains(PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder);
        }

        let valid = self.substitute(Variant::Valid, self.config.valid_input());
        let invalid = self.substitute(Variant::Invalid, self.config.invalid_input());

        debug!("Valid request:\n{}", valid.raw());
        debug!("Invalid request:\n{}", invalid.raw());

        Ok((valid, invalid))
    }

    fn substitute(&self, variant: Variant, input: &str) -> ConcreteRequest {
        let mut raw = self.config.request_template().replace(PLACEHOLDER, input);
        if self.fix_content_length {
            raw = fix_content_length(&raw);
        }
        ConcreteRequest::new(
            self.config.host(),
            self.config.port(),
            self.config.use_tls(),
            variant,
            raw,
        )
    }
}

/// Splits a raw request into its header block and body. A request without
/// a blank line is all header block.
pub fn split_head(raw: &str) -> (&str, &str) {
    match raw.find(HEAD_SEPARATOR) {
        Some(pos) => (&raw[..pos], &raw[pos + HEAD_SEPARATOR.len()..]),
        None => (raw, ""),
    }
}

pub fn header_lines(raw: &str) -> Vec<&str> {
    let (head, _) = split_head(raw);
    head.split("\r\n").collect()
}

/// Value of the first header named `name` (case-insensitive).
pub fn find_header<'r>(raw: &'r str, name: &str) -> Option<&'r str> {
    header_lines(raw).into_iter().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Rewrites an existing `Content-Length` header to the body length.
pub fn fix_content_length(raw: &str) -> String {
    let Some(pos) = raw.find(HEAD_SEPARATOR) else {
        return raw.to_string();
    };
    let (head, rest) = raw.split_at(pos);
    let body_len = rest.len() - HEAD_SEPARATOR.len();
    let head = CONTENT_LENGTH.replace_all(head, |caps: &Captures| format!("{} {}", &caps[1], body_len));
    format!("{}{}", head, rest)
}

/// Converts bare `\n` line endings to `\r\n` so that templates saved by
/// ordinary editors form valid HTTP/1.1 messages.
pub fn normalize_line_endings(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 32);
    let mut prev = '\0';
    for c in raw.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnumerationParams;
    use crate::validation::ValidationGate;

    fn config_with(template: &str) -> EnumerationConfig {
        let params = EnumerationParams {
            host: "a.test".to_string(),
            port: 443,
            protocol: "https".to_string(),
            request_template: template.to_string(),
            attempts: 3,
            valid_input: "admin".to_string(),
            invalid_input: "zz9".to_string(),
        };
        ValidationGate::new().validate(&params).unwrap()
    }

    #[test]
    fn test_build_substitutes_both_variants() {
        let config = config_with("POST /login HTTP/1.1\r\nHost: a.test\r\n\r\nuser=$ticktock$");
        let (valid, invalid) = RequestTemplate::new(&config).build().unwrap();

        assert_eq!(valid.variant(), Variant::Valid);
        assert_eq!(invalid.variant(), Variant::Invalid);
        assert!(valid.raw().ends_with("user=admin"));
        assert!(invalid.raw().ends_with("user=zz9"));
        assert!(valid.use_tls());
        assert_eq!(valid.port(), 443);
    }

    #[test]
    fn test_requests_differ_only_at_substitution_site() {
        let config = config_with("POST /login HTTP/1.1\r\nHost: a.test\r\n\r\nuser=$ticktock$&pw=x");
        let (valid, invalid) = RequestTemplate::new(&config).build().unwrap();

        let prefix = "POST /login HTTP/1.1\r\nHost: a.test\r\n\r\nuser=";
        let suffix = "&pw=x";
        assert!(valid.raw().starts_with(prefix) && invalid.raw().starts_with(prefix));
        assert!(valid.raw().ends_with(suffix) && invalid.raw().ends_with(suffix));
        assert_eq!(&valid.raw()[prefix.len()..valid.raw().len() - suffix.len()], "admin");
        assert_eq!(&invalid.raw()[prefix.len()..invalid.raw().len() - suffix.len()], "zz9");
    }

    #[test]
    fn test_every_occurrence_is_replaced() {
        let config = config_with("GET /u/$ticktock$ HTTP/1.1\r\nHost: a.test\r\n\r\nname=$ticktock$");
        let (valid, _) = RequestTemplate::new(&config).build().unwrap();
        assert!(!valid.raw().contains(PLACEHOLDER));
        assert_eq!(valid.raw().matches("admin").count(), 2);
    }

    #[test]
    fn test_content_length_follows_body() {
        let config = config_with(
            "POST /login HTTP/1.1\r\nHost: a.test\r\nContent-Length: 15\r\n\r\nuser=$ticktock$",
        );
        let (valid, invalid) = RequestTemplate::new(&config).build().unwrap();
        assert_eq!(find_header(valid.raw(), "content-length"), Some("10"));
        assert_eq!(find_header(invalid.raw(), "content-length"), Some("8"));

        let (valid, _) = RequestTemplate::new(&config)
            .with_content_length_fixup(false)
            .build()
            .unwrap();
        assert_eq!(find_header(valid.raw(), "Content-Length"), Some("15"));
    }

    #[test]
    fn test_fingerprint_differs_between_variants() {
        let config = config_with("POST / HTTP/1.1\r\nHost: a.test\r\n\r\n$ticktock$");
        let (valid, invalid) = RequestTemplate::new(&config).build().unwrap();
        assert_eq!(valid.fingerprint().len(), 16);
        assert_ne!(valid.fingerprint(), invalid.fingerprint());
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(
            normalize_line_endings("GET / HTTP/1.1\nHost: a\n\nbody"),
            "GET / HTTP/1.1\r\nHost: a\r\n\r\nbody"
        );
        assert_eq!(normalize_line_endings("a\r\nb"), "a\r\nb");
    }

    #[test]
    fn test_split_head_without_body() {
        let (head, body) = split_head("GET / HTTP/1.1\r\nHost: a");
        assert_eq!(head, "GET / HTTP/1.1\r\nHost: a");
        assert_eq!(body, "");
    }

    #[test]
    fn test_base_url() {
        let request = ConcreteRequest::new("::1", 8443, true, Variant::Valid, String::new());
        assert_eq!(request.base_url(), "https://[::1]:8443");
        let request = ConcreteRequest::new("a.test", 80, false, Variant::Valid, String::new());
        assert_eq!(request.base_url(), "http://a.test:80");
    }
}
