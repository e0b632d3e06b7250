// src/miner/engine/randomx.rs
//! RandomX hash engine
//!
//! Wraps `rust-randomx` behind [`HashEngine`]:
//! - the dataset context is swapped atomically on every reseed
//! - each worker thread owns a lazily created hasher slot
//! - nonces come from one counter shared by all threads

use crate::miner::difficulty::meets_difficulty;
use crate::miner::engine::HashEngine;
use crate::types::EngineStatus;
use crate::utils::error::MinerError;
use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use rust_randomx::{Context, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Byte offset of the 4-byte nonce inside a hashing blob
pub const NONCE_OFFSET: usize = 39;

/// RandomX engine
pub struct RandomXEngine {
    /// Dataset context built from the current seed
    context: ArcSwapOption<Context>,
    /// One hasher per worker thread, bound to `context`
    hashers: RwLock<Vec<Mutex<Option<Hasher>>>>,
    /// Next nonce to hand out
    nonce: AtomicU32,
    /// Use the full dataset (fast mode) rather than the light cache
    fast: bool,
    status: Mutex<EngineStatus>,
}

impl RandomXEngine {
    /// Creates an engine with no dataset.
    ///
    /// # Performance Notes
    /// - Seeding is expensive (dataset generation takes several seconds)
    /// - Fast mode requires ~2080MB RAM vs ~256MB in light mode
    pub fn new(fast: bool) -> Self {
        RandomXEngine {
            context: ArcSwapOption::empty(),
            hashers: RwLock::new(Vec::new()),
            nonce: AtomicU32::new(1),
            fast,
            status: Mutex::new(EngineStatus::NotStarted),
        }
    }

    /// Current dataset lifecycle state.
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }
}

impl HashEngine for RandomXEngine {
    fn init(&self, threads: usize) -> Result<(), MinerError> {
        if threads == 0 {
            return Err(MinerError::EngineError("thread count must be at least 1".into()));
        }
        let mut hashers = self.hashers.write();
        if hashers.len() != threads {
            log::debug!("Allocating {} RandomX hasher slots", threads);
            hashers.clear();
            hashers.extend((0..threads).map(|_| Mutex::new(None)));
        }
        Ok(())
    }

    fn seed(&self, seed: &[u8], threads: usize) -> Result<(), MinerError> {
        *self.status.lock() = EngineStatus::Starting;
        log::info!(
            "Initializing RandomX dataset ({} mode, {} threads)",
            if self.fast { "fast" } else { "light" },
            threads
        );

        // Hashers hold the old context; drop them before swapping.
        for slot in self.hashers.read().iter() {
            *slot.lock() = None;
        }
        self.context.store(Some(Arc::new(Context::new(seed, self.fast))));

        *self.status.lock() = EngineStatus::Ok;
        log::info!("RandomX dataset initialized");
        Ok(())
    }

    fn hash_until(
        &self,
        blob: &[u8],
        difficulty: u64,
        thread: usize,
        hash_out: &mut [u8; 32],
        nonce_out: &mut [u8; 4],
        stop: &AtomicBool,
    ) -> i64 {
        let Some(context) = self.context.load_full() else {
            log::error!("hash_until called before the dataset was seeded");
            return 0;
        };
        if blob.len() < NONCE_OFFSET + 4 {
            log::error!("blob of {} bytes is too short to carry a nonce", blob.len());
            return 0;
        }

        let slots = self.hashers.read();
        let Some(slot) = slots.get(thread) else {
            log::error!("no hasher slot for thread {}", thread);
            return 0;
        };
        let mut slot = slot.lock();
        let hasher = slot.get_or_insert_with(|| Hasher::new(context));

        let mut input = blob.to_vec();
        let mut hashes: i64 = 0;
        loop {
            let nonce = self.nonce.fetch_add(1, Ordering::Relaxed).to_le_bytes();
            input[NONCE_OFFSET..NONCE_OFFSET + 4].copy_from_slice(&nonce);

            let output = hasher.hash(&input);
            hashes += 1;

            if let Ok(digest) = <[u8; 32]>::try_from(output.as_ref()) {
                if meets_difficulty(&digest, difficulty) {
                    *hash_out = digest;
                    *nonce_out = nonce;
                    return hashes;
                }
            }
            if stop.load(Ordering::Acquire) {
                return -hashes;
            }
        }
    }
}
