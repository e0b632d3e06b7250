// src/utils/error.rs
use crate::miner::job::PoolJob;
use crate::types::Command;
use serde_json;
use std::io;
use thiserror::Error;
use url;

/// Main error type for the mining application
///
/// This enum represents all possible error conditions that can occur
/// during mining operations, including network, I/O, protocol, and
/// configuration errors.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Errors raised by the hash engine (dataset allocation, seeding)
    #[error("Hash engine error: {0}")]
    EngineError(String),

    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// Errors in protocol handling or invalid protocol messages
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Thread communication channel errors
    #[error("Thread communication error: {0}")]
    ChannelError(String),

    /// Invalid user input or parameter errors
    #[error("Invalid input: {0}")]
    InputError(String),

    /// Compact target with a width other than 4 or 8 bytes
    #[error("target length {0} not supported")]
    UnsupportedTarget(usize),

    /// Async task execution errors
    #[error("Task execution error: {0}")]
    TaskError(String),
}

/// Converts crossbeam channel send errors for pool jobs into MinerError
///
/// Raised by the pool reader when the control loop has dropped its end
/// of the job stream.
impl From<crossbeam_channel::SendError<PoolJob>> for MinerError {
    fn from(e: crossbeam_channel::SendError<PoolJob>) -> Self {
        MinerError::ChannelError(format!("Job send failed: {}", e))
    }
}

/// Converts crossbeam channel send errors for control commands into MinerError
impl From<crossbeam_channel::SendError<Command>> for MinerError {
    fn from(e: crossbeam_channel::SendError<Command>) -> Self {
        MinerError::ChannelError(format!("Command send failed: {}", e))
    }
}

/// Converts hex decoding errors into MinerError
///
/// Used when invalid hex data is encountered in job blobs, seeds,
/// targets or configured fingerprints.
impl From<hex::FromHexError> for MinerError {
    fn from(e: hex::FromHexError) -> Self {
        MinerError::InputError(format!("Hex conversion failed: {}", e))
    }
}

/// Converts async task join errors into MinerError
///
/// Used when blocking sections (engine init, the control loop) are run
/// through `spawn_blocking` and fail unexpectedly.
impl From<tokio::task::JoinError> for MinerError {
    fn from(e: tokio::task::JoinError) -> Self {
        MinerError::TaskError(format!("Async task failed: {}", e))
    }
}
