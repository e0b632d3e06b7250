//! Test doubles for the pool and hash engine seams

use crate::miner::engine::HashEngine;
use crate::network::{PoolConnection, SubmitResponse};
use crate::utils::error::MinerError;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Hash written by [`StubEngine`] on a scripted find
pub const FOUND_HASH: [u8; 32] = [0xab; 32];
/// Nonce written by [`StubEngine`] on a scripted find
pub const FOUND_NONCE: [u8; 4] = [1, 2, 3, 4];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub nonce: String,
    pub job_id: String,
    pub hash: String,
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBehavior {
    Accept,
    Refuse,
    TransportError,
    EmptyResult,
}

pub struct StubPool {
    alive: AtomicBool,
    behavior: SubmitBehavior,
    submissions: Mutex<Vec<Submission>>,
    closes: AtomicUsize,
    alive_checks: AtomicUsize,
}

impl StubPool {
    pub fn new(alive: bool) -> Self {
        StubPool {
            alive: AtomicBool::new(alive),
            behavior: SubmitBehavior::Accept,
            submissions: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            alive_checks: AtomicUsize::new(0),
        }
    }

    pub fn with_behavior(mut self, behavior: SubmitBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn alive_checks(&self) -> usize {
        self.alive_checks.load(Ordering::SeqCst)
    }
}

impl PoolConnection for StubPool {
    fn is_alive(&self) -> bool {
        self.alive_checks.fetch_add(1, Ordering::SeqCst);
        self.alive.load(Ordering::SeqCst)
    }

    async fn submit_work(
        &self,
        nonce: &str,
        job_id: &str,
        hash: &str,
        sequence: u64,
    ) -> Result<SubmitResponse, MinerError> {
        self.submissions.lock().push(Submission {
            nonce: nonce.into(),
            job_id: job_id.into(),
            hash: hash.into(),
            sequence,
        });
        match self.behavior {
            SubmitBehavior::Accept => Ok(SubmitResponse {
                result: Some(json!({"status": "OK"})),
                error: None,
            }),
            SubmitBehavior::Refuse => Ok(SubmitResponse {
                result: None,
                error: Some(json!({"code": -1, "message": "Low difficulty share"})),
            }),
            SubmitBehavior::TransportError => {
                Err(MinerError::ConnectionError("broken pipe".into()))
            }
            SubmitBehavior::EmptyResult => Ok(SubmitResponse::default()),
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Init(usize),
    Seed(Vec<u8>),
    Hash { blob: Vec<u8>, thread: usize, difficulty: u64 },
}

/// Engine that replays scripted raw results, then waits for the stop flag
pub struct StubEngine {
    script: Mutex<VecDeque<i64>>,
    events: Mutex<Vec<EngineEvent>>,
    inflight: AtomicUsize,
    seeds_while_hashing: AtomicUsize,
    init_failures: AtomicUsize,
    seed_failures: AtomicUsize,
}

impl StubEngine {
    pub fn new(script: impl IntoIterator<Item = i64>) -> Self {
        StubEngine {
            script: Mutex::new(script.into_iter().collect()),
            events: Mutex::new(Vec::new()),
            inflight: AtomicUsize::new(0),
            seeds_while_hashing: AtomicUsize::new(0),
            init_failures: AtomicUsize::new(0),
            seed_failures: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` calls to `init` fail.
    pub fn fail_inits(self, count: usize) -> Self {
        self.init_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Makes the next `count` calls to `seed` fail.
    pub fn fail_seeds(self, count: usize) -> Self {
        self.seed_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn hash_calls(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, EngineEvent::Hash { .. }))
            .count()
    }

    pub fn seeds(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::Seed(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    pub fn seeds_while_hashing(&self) -> usize {
        self.seeds_while_hashing.load(Ordering::SeqCst)
    }
}

struct Inflight<'a>(&'a AtomicUsize);

impl Drop for Inflight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HashEngine for StubEngine {
    fn init(&self, threads: usize) -> Result<(), MinerError> {
        self.events.lock().push(EngineEvent::Init(threads));
        take_failure(&self.init_failures, "init")
    }

    fn seed(&self, seed: &[u8], _threads: usize) -> Result<(), MinerError> {
        if self.inflight() > 0 {
            self.seeds_while_hashing.fetch_add(1, Ordering::SeqCst);
        }
        self.events.lock().push(EngineEvent::Seed(seed.to_vec()));
        take_failure(&self.seed_failures, "seed")
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
        self.inflight.fetch_add(1, Ordering::SeqCst);
        let _guard = Inflight(&self.inflight);
        self.events.lock().push(EngineEvent::Hash {
            blob: blob.to_vec(),
            thread,
            difficulty,
        });

        let scripted = self.script.lock().pop_front();
        if let Some(raw) = scripted {
            if raw > 0 {
                *hash_out = FOUND_HASH;
                *nonce_out = FOUND_NONCE;
            }
            return raw;
        }
        while !stop.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(1));
        }
        -1
    }
}

/// Consumes one scripted failure, if any are left.
fn take_failure(remaining: &AtomicUsize, call: &str) -> Result<(), MinerError> {
    let failed = remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failed {
        Err(MinerError::EngineError(format!("scripted {} failure", call)))
    } else {
        Ok(())
    }
}

/// Polls `cond` from a plain thread until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Async counterpart of [`wait_for`].
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    cond()
}
