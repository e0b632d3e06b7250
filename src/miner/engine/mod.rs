// src/miner/engine/mod.rs
//! Hash engine interface
//!
//! The engine owns the process-wide dataset and performs the nonce search.
//! Its raw search result is sign-encoded; [`HashOutcome::decode`] turns it
//! into a tagged value at the boundary so nothing else branches on sign.

/// RandomX engine backed by `rust-randomx`
pub mod randomx;

use crate::utils::error::MinerError;
use std::sync::atomic::AtomicBool;

/// Operations the miner needs from a hash engine
pub trait HashEngine: Send + Sync + 'static {
    /// Prepares per-thread state for `threads` workers.
    fn init(&self, threads: usize) -> Result<(), MinerError>;

    /// Rebuilds the dataset from `seed`.
    ///
    /// Must only be called while no worker is inside [`HashEngine::hash_until`].
    fn seed(&self, seed: &[u8], threads: usize) -> Result<(), MinerError>;

    /// Searches nonces for `blob` until a hash meeting `difficulty` is found
    /// or `stop` is raised.
    ///
    /// A positive return is the number of hashes computed up to and
    /// including a qualifying one, whose hash and nonce are written to
    /// `hash_out` and `nonce_out`. Zero or a negative return means the search
    /// stopped without a find after computing that many hashes (absolute
    /// value).
    fn hash_until(
        &self,
        blob: &[u8],
        difficulty: u64,
        thread: usize,
        hash_out: &mut [u8; 32],
        nonce_out: &mut [u8; 4],
        stop: &AtomicBool,
    ) -> i64;
}

/// Decoded result of one [`HashEngine::hash_until`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashOutcome {
    /// A qualifying hash was found
    Found {
        /// Nonce bytes as placed in the blob
        nonce: [u8; 4],
        /// The qualifying hash
        hash: [u8; 32],
        /// Hashes computed during the call
        hashes: u64,
    },
    /// The stop flag ended the search
    Stopped {
        /// Hashes computed during the call
        hashes: u64,
    },
}

impl HashOutcome {
    /// Decodes a raw engine result.
    pub fn decode(raw: i64, hash: [u8; 32], nonce: [u8; 4]) -> Self {
        if raw > 0 {
            HashOutcome::Found {
                nonce,
                hash,
                hashes: raw as u64,
            }
        } else {
            HashOutcome::Stopped {
                hashes: raw.unsigned_abs(),
            }
        }
    }

    /// Hashes computed, regardless of outcome.
    pub fn hashes(&self) -> u64 {
        match self {
            HashOutcome::Found { hashes, .. } | HashOutcome::Stopped { hashes } => *hashes,
        }
    }
}
