// src/miner/worker.rs
//! Worker pool implementation
//!
//! Workers are started together as one generation bound to a single job
//! snapshot and the pool's stop flag. A generation ends only through
//! [`WorkerPool::stop_and_wait`], which raises the flag and joins every
//! worker before returning.

use crate::miner::engine::{HashEngine, HashOutcome};
use crate::miner::job::MiningJob;
use crate::miner::submitter::{Share, ShareSink};
use crate::stats::StatsTracker;
use crate::utils::error::MinerError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

/// One running worker thread of the current generation
struct WorkerHandle {
    thread: usize,
    join: JoinHandle<()>,
}

/// Decrements the live-worker count when a worker exits, even by panic.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Pool of hashing threads sharing one stop flag
pub struct WorkerPool {
    /// Raised to end the current generation
    stop: Arc<AtomicBool>,
    /// Workers that have not yet exited
    live: Arc<AtomicUsize>,
    workers: Vec<WorkerHandle>,
    generation: u64,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    /// Creates an idle pool.
    pub fn new() -> Self {
        WorkerPool {
            stop: Arc::new(AtomicBool::new(true)),
            live: Arc::new(AtomicUsize::new(0)),
            workers: Vec::new(),
            generation: 0,
        }
    }

    /// Number of workers that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Number of generations started so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts one worker per thread index in `0..threads` on `job`.
    ///
    /// Any previous generation is stopped and joined first, so the stop flag
    /// is only cleared once no worker can still observe it.
    pub fn start<E: HashEngine, S: ShareSink>(
        &mut self,
        job: Arc<MiningJob>,
        threads: usize,
        engine: Arc<E>,
        stats: Arc<StatsTracker>,
        sink: Arc<S>,
    ) -> Result<(), MinerError> {
        self.stop_and_wait();

        self.generation += 1;
        self.stop.store(false, Ordering::Release);

        for thread in 0..threads {
            let job = job.clone();
            let engine = engine.clone();
            let stats = stats.clone();
            let sink = sink.clone();
            let stop = self.stop.clone();

            self.live.fetch_add(1, Ordering::AcqRel);
            let guard = LiveGuard(self.live.clone());
            let spawned = std::thread::Builder::new()
                .name(format!("miner-{}-{}", self.generation, thread))
                .spawn(move || {
                    let _guard = guard;
                    mine(thread, &job, engine.as_ref(), &stop, &stats, sink.as_ref());
                });

            match spawned {
                Ok(join) => self.workers.push(WorkerHandle { thread, join }),
                Err(e) => {
                    self.stop_and_wait();
                    return Err(e.into());
                }
            }
        }

        log::debug!(
            "Started generation {} with {} workers on job {}",
            self.generation,
            threads,
            job.job_id
        );
        Ok(())
    }

    /// Raises the stop flag and blocks until every worker has exited.
    pub fn stop_and_wait(&mut self) {
        self.stop.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            if worker.join.join().is_err() {
                log::error!("Worker thread {} panicked", worker.thread);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_wait();
    }
}

/// Worker loop: hash until stopped, forwarding every find to `sink`.
fn mine<E: HashEngine + ?Sized, S: ShareSink + ?Sized>(
    thread: usize,
    job: &MiningJob,
    engine: &E,
    stop: &AtomicBool,
    stats: &StatsTracker,
    sink: &S,
) {
    let mut hash = [0u8; 32];
    let mut nonce = [0u8; 4];

    loop {
        let raw = engine.hash_until(&job.blob, job.difficulty, thread, &mut hash, &mut nonce, stop);
        let outcome = HashOutcome::decode(raw, hash, nonce);
        stats.tally_hashes(outcome.hashes());

        match outcome {
            HashOutcome::Stopped { .. } => break,
            HashOutcome::Found { nonce, hash, .. } => {
                log::info!("Share found by thread: {} Difficulty: {}", thread, job.difficulty);
                sink.dispatch(Share {
                    job_id: job.job_id.clone(),
                    nonce,
                    hash,
                    difficulty: job.difficulty,
                });
            }
        }
    }
}
