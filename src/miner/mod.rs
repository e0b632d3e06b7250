// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the mining process:
//! - Job decoding and difficulty handling
//! - The hash engine boundary and the RandomX engine
//! - Worker generations, the control loop and share submission

/// Activity-state change tracking
pub mod activity;

/// Target and difficulty conversions
pub mod difficulty;

/// Hash engine boundary
///
/// Contains the [`HashEngine`](engine::HashEngine) trait, the decoded
/// [`HashOutcome`](engine::HashOutcome) and the RandomX implementation.
pub mod engine;

/// Pool jobs and their decoded form
pub mod job;

/// Mining control loop
///
/// Reacts to new jobs, commands and a periodic timer by restarting the
/// worker generation. Owns the seed state of the engine.
pub mod scheduler;

/// Share submission to the pool
pub mod submitter;

/// Worker thread implementation
///
/// Contains the worker thread logic that performs actual hash computations.
pub mod worker;

// Re-export main components for cleaner imports
pub use self::engine::{HashEngine, HashOutcome, randomx::RandomXEngine};
pub use self::job::{MiningJob, PoolJob};
pub use self::scheduler::{Scheduler, SeedState, Session};
pub use self::submitter::{Share, ShareSink, ShareSubmitter, SubmitOutcome, SubmitPolicy};
pub use self::worker::WorkerPool;
