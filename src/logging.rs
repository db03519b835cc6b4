// File: logging.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::str::FromStr;

/// `--verbose` raises anything quieter than debug to debug.
pub fn parse_level(log_level: &str, verbose: bool) -> Result<LevelFilter> {
    let level = LevelFilter::from_str(log_level.trim())
        .map_err(|_| anyhow::anyhow!("Unknown log level '{}'", log_level))?;
    if verbose && level < LevelFilter::Debug {
        return Ok(LevelFilter::Debug);
    }
    Ok(level)
}

pub fn init(log_level: &str, verbose: bool) -> Result<()> {
    let level = parse_level(log_level, verbose)?;

    SimpleLogger::new()
        .with_level(LevelFilter::Off)
        .with_module_level(env!("CARGO_CRATE_NAME"), level)
        .with_utc_timestamps()
        .init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warn", false).unwrap(), LevelFilter::Warn);
        assert_eq!(parse_level("INFO", false).unwrap(), LevelFilter::Info);
        assert_eq!(parse_level("warn", true).unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("trace", true).unwrap(), LevelFilter::Trace);
        assert!(parse_level("loud", false).is_err());
    }
}
