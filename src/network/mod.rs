// src/network/mod.rs
//! Network communication components
//!
//! This module defines the seam between the mining core and the pool:
//! - [`PoolConnector`] opens a session and yields its job stream
//! - [`PoolConnection`] is the live session used for liveness checks and
//!   share submission
//!
//! [`PoolClient`] implements both over Monero-style stratum, and
//! [`Supervisor`] keeps a session alive for as long as the miner runs.

use crate::config::PoolConfig;
use crate::miner::job::PoolJob;
use crate::utils::error::MinerError;
use crossbeam_channel::Receiver;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Mining pool client implementation
///
/// Speaks newline-delimited JSON-RPC over TCP or TLS: login, job notifications,
/// share submission and keepalives.
pub mod pool;

/// TLS transport with optional certificate pinning
pub mod tls;

/// Reconnect-forever session supervisor
pub mod session;

// Re-export main components for cleaner imports
pub use pool::{PoolClient, StratumConnection};
pub use session::{Controller, Supervisor};

/// Pool reply to a share submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitResponse {
    /// Result payload on success
    pub result: Option<Value>,
    /// Error payload when the pool refused the share
    pub error: Option<Value>,
}

/// A live pool session
pub trait PoolConnection: Send + Sync + 'static {
    /// Whether the session can currently carry submissions.
    fn is_alive(&self) -> bool;

    /// Submits a share.
    ///
    /// `Err` means the transport failed; a pool-side refusal comes back as
    /// `Ok` with [`SubmitResponse::error`] set. Concurrent calls are allowed.
    fn submit_work(
        &self,
        nonce: &str,
        job_id: &str,
        hash: &str,
        sequence: u64,
    ) -> impl Future<Output = Result<SubmitResponse, MinerError>> + Send;

    /// Tears the session down; the job stream closes shortly after.
    fn close(&self);
}

/// Opens pool sessions
pub trait PoolConnector: Send + Sync + 'static {
    /// Session type produced by this connector
    type Connection: PoolConnection;

    /// Connects and logs in, returning the session and its job stream.
    ///
    /// The stream disconnects when the session ends.
    fn connect(
        &self,
        pool: &PoolConfig,
        user_agent: &str,
    ) -> impl Future<Output = Result<(Arc<Self::Connection>, Receiver<PoolJob>), MinerError>> + Send;
}
