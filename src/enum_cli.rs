// File: enum_cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::{RunArgs, TargetArgs, TransportKind};
use crate::collector::ResultCollector;
use crate::config::{EnumerationConfig, TransportOptions};
use crate::display::{print_error, print_info, print_success, print_warning, ConsoleListener};
use crate::model::Variant;
use crate::reports::ReportEngine;
use crate::scheduler::{EnumerationScheduler, LaneStatus};
use crate::template::normalize_line_endings;
use crate::transport::{ClientTransport, RawTransport, Transport};
use crate::validation::ValidationGate;

pub async fn run_enumeration(args: RunArgs) -> Result<()> {
    println!("{}", "=".repeat(80).bright_red());
    println!("{}", "TickTock Timing-Based Username Enumeration".bright_red().bold());
    println!("{}", "=".repeat(80).bright_red());
    println!();
    println!(
        "{}",
        "This tool sends repeated login requests to the target and may:".bright_yellow()
    );
    println!("   - Lock out or alert on the accounts being probed");
    println!("   - Trigger security alerts and incident response");
    println!();
    println!("{}", "LEGAL REQUIREMENT:".bright_red().bold());
    println!("   You MUST have explicit written authorization to test the target.");
    println!();

    if !args.i_have_authorization {
        println!(
            "{}",
            "Do you have explicit written authorization to test the target system? (yes/NO):"
                .bright_yellow()
        );
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim().to_lowercase() != "yes" {
            println!("{}", "Authorization not confirmed. Exiting for safety.".red());
            println!("   Use --i-have-authorization flag only if you have proper authorization.");
            return Ok(());
        }
    }

    let config = load_config(&args.target)?;
    let transport = build_transport(args.transport, args.transport_options())?;
    debug!("Using {} transport", transport.name());

    let collector = Arc::new(ResultCollector::new());
    let listener = Arc::new(ConsoleListener::new(args.threshold));
    collector.subscribe(listener.clone());

    let scheduler = EnumerationScheduler::new(transport, Arc::clone(&collector), args.runner_options());
    let total = config.attempts() as u64 * 2;

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}",
            )?
            .progress_chars("##-"),
    );

    let mut status = scheduler.subscribe();
    let attempts = config.attempts();
    let progress = pb.clone();
    let watcher = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let snapshot = status.borrow_and_update().clone();
            update_progress(&progress, &snapshot, attempts);
        }
    });

    scheduler.start_run(&config)?;

    tokio::select! {
        _ = scheduler.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            print_warning("Interrupted, letting the queued batches finish (Ctrl-C again to abort)");
            if !drain_lane(&scheduler, tokio::signal::ctrl_c()).await {
                pb.abandon_with_message("Aborted");
                print_error("Aborted, results of the running batch are lost");
                return Ok(());
            }
        }
    }

    pb.finish_with_message("Enumeration completed");
    watcher.abort();

    let snapshot = match listener.last_ready() {
        Some(snapshot) => snapshot,
        None => {
            let snapshot = collector.snapshot();
            print_warning(&format!(
                "Result sets are incomplete ({} valid, {} invalid); attempts were skipped",
                snapshot.valid().len(),
                snapshot.invalid().len()
            ));
            snapshot
        }
    };

    if let Some(output_dir) = &args.output {
        let engine = ReportEngine::new().with_threshold(args.threshold);
        let data = engine.create_report_data(&config, &snapshot);
        let path = export_path(output_dir, &args.format)?;
        engine.generate_report(&args.format, &data, Some(&path))?;
        print_success(&format!("Results saved to: {}", path.display()));
    }

    scheduler.shutdown();
    Ok(())
}

/// Stops accepting batches and waits for the queued ones, unless `abort`
/// resolves first. Returns whether the lane drained.
async fn drain_lane<F: Future>(scheduler: &EnumerationScheduler, abort: F) -> bool {
    scheduler.shutdown();
    tokio::select! {
        _ = scheduler.wait_idle() => true,
        _ = abort => false,
    }
}

pub fn validate_parameters(args: TargetArgs) -> Result<()> {
    match load_config(&args) {
        Ok(config) => {
            print_success(&format!(
                "Parameters are valid: {}://{}:{}, {} attempts, '{}' vs '{}'",
                config.protocol(),
                config.host(),
                config.port(),
                config.attempts(),
                config.valid_input(),
                config.invalid_input()
            ));
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            Err(e)
        }
    }
}

fn load_config(args: &TargetArgs) -> Result<EnumerationConfig> {
    let template = match &args.request {
        Some(source) => Some(read_template(source)?),
        None => None,
    };
    let params = args.to_params(template)?;
    let config = ValidationGate::new().validate(&params)?;
    Ok(config)
}

/// Reads the raw request from a file, or from stdin when `source` is `-`.
pub fn read_template(source: &str) -> Result<String> {
    let raw = if source == "-" {
        print_info("Reading request template from stdin");
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read request file {}", source))?
    };
    Ok(normalize_line_endings(&raw))
}

pub fn build_transport(kind: TransportKind, options: TransportOptions) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match kind {
        TransportKind::Raw => {
            if options.proxy().is_some() {
                warn!("--proxy is ignored by the raw transport, use --transport client");
            }
            Arc::new(RawTransport::new(options))
        }
        TransportKind::Client => Arc::new(ClientTransport::new(&options)?),
    };
    Ok(transport)
}

fn export_path(output_dir: &Path, format: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let extension = ReportEngine::new().get_generator(format)?.file_extension();
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    Ok(output_dir.join(format!("ticktock_results_{}.{}", timestamp, extension)))
}

/// Valid batch runs first, so the invalid batch's attempts count on top of a
/// full valid batch.
fn update_progress(pb: &ProgressBar, status: &LaneStatus, attempts: u32) {
    let finished = match &status.current {
        Some(run) if run.variant == Variant::Valid => run.attempts_done(),
        Some(run) => attempts + run.attempts_done(),
        None => 0,
    };
    pb.set_position(finished as u64);
    if let Some(run) = &status.current {
        pb.set_message(format!("{} candidate", run.variant));
    }
}
