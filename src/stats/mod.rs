//! Statistics collection and reporting module
//!
//! This module provides functionality for tracking and reporting mining statistics,
//! including:
//! - Rolling hashrate over the configured print interval
//! - Share acceptance/rejection tracking
//! - Hardware monitoring (CPU, memory, temperature)
//!
//! [`StatsTracker`] is the shared accumulator; [`StatsReporter`] periodically
//! logs a summary of it.

/// Shared counters for hashes and shares
pub mod tracker;

/// Periodic summary logging with hardware readings
pub mod reporter;

// Re-export main components
pub use reporter::{HardwareStats, StatsReporter};
pub use tracker::{StatsSnapshot, StatsTracker, format_hashrate};
