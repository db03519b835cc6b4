// File: client.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use std::collections::HashMap;

use super::{Transport, TransportResponse};
use crate::config::TransportOptions;
use crate::errors::TransportError;
use crate::template::{split_head, ConcreteRequest};

const SKIPPED_HEADERS: &[&str] = &["content-length", "connection", "transfer-encoding"];

/// Replays the raw template through `reqwest`, which allows routing the
/// traffic through an upstream proxy.
#[derive(Debug, Clone)]
pub struct ClientTransport {
    client: reqwest::Client,
}

impl ClientTransport {
    pub fn new(options: &TransportOptions) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout())
            .timeout(options.read_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(options.insecure());

        if let Some(proxy) = options.proxy() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(ClientTransport {
            client: builder.build()?,
        })
    }

    async fn send_parsed(&self, request: &ConcreteRequest) -> Result<TransportResponse, TransportError> {
        let parsed = ParsedRequest::parse(request)?;

        let response = self
            .client
            .request(parsed.method, &parsed.url)
            .headers(parsed.headers)
            .body(parsed.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            headers,
            body_len: body.len(),
        })
    }
}

impl Transport for ClientTransport {
    fn send<'a>(
        &'a self,
        request: &'a ConcreteRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(self.send_parsed(request))
    }

    fn name(&self) -> &'static str {
        "client"
    }
}

#[derive(Debug)]
struct ParsedRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: String,
}

impl ParsedRequest {
    fn parse(request: &ConcreteRequest) -> Result<Self, TransportError> {
        let (head, body) = split_head(request.raw());
        let mut lines = head.split("\r\n");

        let request_line = lines
            .next()
            .ok_or_else(|| TransportError::InvalidRequest("Missing request line".to_string()))?;
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
            return Err(TransportError::InvalidRequest(format!(
                "Malformed request line: {}",
                request_line
            )));
        };

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("Invalid method: {}", method)))?;

        let url = if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("{}{}", request.base_url(), target)
        };

        let mut headers = HeaderMap::new();
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if SKIPPED_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
                continue;
            }
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidRequest(format!("Invalid header name: {}", name)))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|_| TransportError::InvalidRequest(format!("Invalid header value for {}", name)))?;
            headers.append(name, value);
        }

        Ok(ParsedRequest {
            method,
            url,
            headers,
            body: body.to_string(),
        })
    }
}
