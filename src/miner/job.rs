// src/miner/job.rs
//! Mining jobs as received from the pool and in decoded form

use crate::miner::difficulty::target_to_difficulty;
use crate::miner::engine::randomx::NONCE_OFFSET;
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};

/// Shortest blob that still has room for the 4-byte nonce
pub const MIN_BLOB_LEN: usize = NONCE_OFFSET + 4;

/// Job record exactly as the pool sends it (hex-encoded fields)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolJob {
    /// Hashing blob template
    pub blob: String,
    /// Opaque identifier echoed back on submission
    pub job_id: String,
    /// Compact target, 4 or 8 bytes
    pub target: String,
    /// Algorithm tag, e.g. `rx/0`
    #[serde(default)]
    pub algo: String,
    /// Block height, when the pool provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    /// Dataset seed for the hash engine
    #[serde(default)]
    pub seed_hash: String,
}

/// A decoded mining job ready to be handed to workers
#[derive(Debug, Clone, PartialEq)]
pub struct MiningJob {
    /// Unique identifier for the job
    pub job_id: String,
    /// Block data blob to be hashed
    pub blob: Vec<u8>,
    /// Raw compact target
    pub target: Vec<u8>,
    /// Difficulty derived from `target`
    pub difficulty: u64,
    /// Block height, if known
    pub height: Option<u64>,
    /// Dataset seed
    pub seed: Vec<u8>,
    /// Algorithm tag
    pub algorithm: String,
}

impl MiningJob {
    /// Decodes the hex fields of a pool job and derives its difficulty.
    pub fn decode(job: &PoolJob) -> Result<Self, MinerError> {
        let blob = hex::decode(&job.blob)?;
        if blob.len() < MIN_BLOB_LEN {
            return Err(MinerError::InputError(format!(
                "blob of {} bytes is shorter than {}",
                blob.len(),
                MIN_BLOB_LEN
            )));
        }
        let seed = hex::decode(&job.seed_hash)?;
        let target = hex::decode(&job.target)?;
        let difficulty = target_to_difficulty(&target)?;

        Ok(MiningJob {
            job_id: job.job_id.clone(),
            blob,
            target,
            difficulty,
            height: job.height,
            seed,
            algorithm: job.algo.clone(),
        })
    }
}

impl TryFrom<&PoolJob> for MiningJob {
    type Error = MinerError;

    fn try_from(job: &PoolJob) -> Result<Self, Self::Error> {
        MiningJob::decode(job)
    }
}
