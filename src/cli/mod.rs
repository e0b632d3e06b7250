// src/cli/mod.rs
//! Command-line argument definitions

mod commands;

pub use commands::{Action, BenchmarkOptions, Commands, ConfigOptions, StartOptions};
