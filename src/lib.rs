//! nevo_miner-rs - RandomX pool miner in Rust
//!
//! This crate provides a CPU miner for RandomX pools with:
//! - A restartable worker pool driven by one control loop
//! - Monero-style stratum over TCP with automatic reconnection
//! - Asynchronous share submission
//! - Hashrate and hardware monitoring

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core implementation including the hash engine and scheduling
pub mod miner;

/// Network communication components for pool sessions
pub mod network;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

#[cfg(test)]
mod testing;

// Core exports
pub use cli::Commands;
pub use config::{Config, PoolConfig};
pub use miner::{HashEngine, MiningJob, RandomXEngine, Scheduler, Share, WorkerPool};
pub use network::{Controller, PoolClient, Supervisor};
pub use stats::{HardwareStats, StatsReporter, StatsTracker};
pub use types::{ActivityState, Command};
pub use utils::{MinerError, init_logging};
