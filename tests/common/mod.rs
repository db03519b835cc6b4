// File: common/mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(dead_code)]

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use ticktock::config::{EnumerationConfig, EnumerationParams};
use ticktock::errors::TransportError;
use ticktock::model::Variant;
use ticktock::template::ConcreteRequest;
use ticktock::transport::{Transport, TransportResponse};
use ticktock::validation::ValidationGate;

pub const LOGIN_TEMPLATE: &str = "POST /login HTTP/1.1\r\nHost: a.test\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 0\r\n\r\nuser=$ticktock$";

pub fn login_params(attempts: u32) -> EnumerationParams {
    EnumerationParams {
        host: "a.test".to_string(),
        port: 443,
        protocol: "https".to_string(),
        request_template: LOGIN_TEMPLATE.to_string(),
        attempts,
        valid_input: "admin".to_string(),
        invalid_input: "zz9".to_string(),
    }
}

pub fn login_config(attempts: u32) -> EnumerationConfig {
    ValidationGate::new()
        .validate(&login_params(attempts))
        .expect("login parameters are valid")
}

/// Answers 200 after a per-variant delay. Attempt numbers listed in
/// `failing` (per variant) return a transport error instead.
pub struct ScriptedTransport {
    valid_delay: Duration,
    invalid_delay: Duration,
    failing: HashMap<Variant, Vec<u32>>,
    calls: Mutex<HashMap<Variant, u32>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(valid_delay: Duration, invalid_delay: Duration) -> Self {
        ScriptedTransport {
            valid_delay,
            invalid_delay,
            failing: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, variant: Variant, attempts: Vec<u32>) -> Self {
        self.failing.insert(variant, attempts);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        request: &'a ConcreteRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            let variant = request.variant();
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let counter = calls.entry(variant).or_insert(0);
                *counter += 1;
                *counter
            };
            self.requests.lock().unwrap().push(request.raw().to_string());

            if self
                .failing
                .get(&variant)
                .is_some_and(|attempts| attempts.contains(&attempt))
            {
                return Err(TransportError::Connect("connection reset".to_string()));
            }

            let delay = match variant {
                Variant::Valid => self.valid_delay,
                Variant::Invalid => self.invalid_delay,
            };
            tokio::time::sleep(delay).await;
            Ok(TransportResponse::new(200))
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
