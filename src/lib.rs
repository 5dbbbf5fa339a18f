// File: lib.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::new_without_default)]

pub mod cli;
pub mod comparator;
pub mod config;
pub mod error;
pub mod generator;
pub mod mutations;
pub mod prober;
pub mod runner;
pub mod scan_state;
pub mod scheduler;
pub mod sink;
pub mod target;
pub mod transport;
pub mod worker;
