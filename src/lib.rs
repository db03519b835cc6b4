// File: lib.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_inception)]
#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::new_without_default)]

pub mod cli;
pub mod collector;
pub mod config;
pub mod display;
pub mod enum_cli;
pub mod errors;
pub mod logging;
pub mod model;
pub mod reports;
pub mod runner;
pub mod scheduler;
pub mod stats;
pub mod template;
pub mod transport;
pub mod validation;
