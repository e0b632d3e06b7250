// src/config/mod.rs
//! Configuration management for the miner
//!
//! Settings are read from a TOML file listing the pools to mine on, the
//! stats print interval, and an optional cap on worker threads.

/// Core configuration implementation
///
/// Contains the [`Config`] struct and the per-pool [`PoolConfig`].
pub mod config;

// Re-export key items for easy access
pub use config::{Config, PoolConfig};

use crate::utils::error::MinerError;
use std::path::PathBuf;

/// Loads miner configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the configuration file (anything convertible to PathBuf)
///
/// # Returns
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(MinerError)` - If the file couldn't be read or parsed
pub fn load(path: impl Into<PathBuf>) -> Result<Config, MinerError> {
    Config::load(path)
}

/// Generates a commented configuration template
pub fn generate_template() -> String {
    Config::generate_template()
}
