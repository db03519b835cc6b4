// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{EnumerationParams, RunnerOptions, TransportOptions};
use crate::template::normalize_line_endings;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long = "log-level", default_value = "warn", global = true)]
    pub log_level: String,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Enable verbose output",
        global = true
    )]
    pub verbose: bool,

    #[arg(long = "no-color", help = "Disable colored output", global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a timing comparison between a valid and an invalid username
    Run(RunArgs),
    /// Check the parameters without sending any request
    Validate(TargetArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Raw TCP/TLS, bytes sent exactly as written
    Raw,
    /// HTTP client, honours --proxy
    Client,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    #[arg(short = 'c', long = "config", help = "JSON parameter file")]
    pub config: Option<PathBuf>,

    #[arg(long = "target", help = "Target URL, e.g. https://login.example.com")]
    pub target: Option<String>,

    #[arg(long = "host")]
    pub host: Option<String>,

    #[arg(short = 'p', long = "port")]
    pub port: Option<u32>,

    #[arg(long = "protocol", help = "http or https")]
    pub protocol: Option<String>,

    #[arg(
        short = 'r',
        long = "request",
        help = "Raw HTTP request file containing the $ticktock$ placeholder ('-' for stdin)"
    )]
    pub request: Option<String>,

    #[arg(short = 'n', long = "attempts")]
    pub attempts: Option<u32>,

    #[arg(long = "valid", help = "Known valid username")]
    pub valid: Option<String>,

    #[arg(long = "invalid", help = "Known invalid username")]
    pub invalid: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long = "transport", value_enum, default_value_t = TransportKind::Raw)]
    pub transport: TransportKind,

    #[arg(long = "proxy", help = "Proxy URL for the client transport")]
    pub proxy: Option<String>,

    #[arg(short = 'k', long = "insecure", help = "Do not verify TLS certificates")]
    pub insecure: bool,

    #[arg(long = "connect-timeout", default_value_t = 3000, help = "Milliseconds")]
    pub connect_timeout: u64,

    #[arg(long = "read-timeout", default_value_t = 10000, help = "Milliseconds")]
    pub read_timeout: u64,

    #[arg(
        long = "rate-limit",
        default_value_t = 0,
        help = "Requests per second (0 = unlimited)"
    )]
    pub rate_limit: u32,

    #[arg(
        long = "no-fix-content-length",
        help = "Send Content-Length exactly as written in the template"
    )]
    pub no_fix_content_length: bool,

    #[arg(
        long = "threshold",
        default_value_t = 5.0,
        help = "Minimum median difference in ms to call a result distinguishable"
    )]
    pub threshold: f64,

    #[arg(short = 'o', long = "output", help = "Export directory")]
    pub output: Option<PathBuf>,

    #[arg(short = 'f', long = "format", default_value = "csv")]
    pub format: String,

    #[arg(
        long = "i-have-authorization",
        help = "Skip authorization prompt (requires explicit written permission)"
    )]
    pub i_have_authorization: bool,
}

impl TargetArgs {
    /// Merges the parameter file, the target URL and the explicit flags, in
    /// that order. `request_template` is the template text already loaded.
    pub fn to_params(&self, request_template: Option<String>) -> anyhow::Result<EnumerationParams> {
        let mut params = match &self.config {
            Some(path) => EnumerationParams::from_json_file(path)?,
            None => EnumerationParams::default(),
        };

        if let Some(target) = &self.target {
            params.apply_target_url(target)?;
        }
        if let Some(host) = &self.host {
            params.host = host.clone();
        }
        if let Some(port) = self.port {
            params.port = port;
        }
        if let Some(protocol) = &self.protocol {
            params.protocol = protocol.clone();
        }
        if let Some(template) = request_template {
            params.request_template = template;
        }
        if let Some(attempts) = self.attempts {
            params.attempts = attempts;
        }
        if let Some(valid) = &self.valid {
            params.valid_input = valid.clone();
        }
        if let Some(invalid) = &self.invalid {
            params.invalid_input = invalid.clone();
        }
        params.request_template = normalize_line_endings(&params.request_template);

        Ok(params)
    }
}

impl RunArgs {
    pub fn runner_options(&self) -> RunnerOptions {
        let mut options = RunnerOptions::new();
        options.set_rate_limit(self.rate_limit);
        options.set_fix_content_length(!self.no_fix_content_length);
        options
    }

    pub fn transport_options(&self) -> TransportOptions {
        let mut options = TransportOptions::new();
        options.set_connect_timeout(Duration::from_millis(self.connect_timeout));
        options.set_read_timeout(Duration::from_millis(self.read_timeout));
        options.set_insecure(self.insecure);
        options.set_proxy(self.proxy.clone());
        options
    }
}
