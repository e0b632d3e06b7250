// src/miner/scheduler.rs
//! Mining control loop
//!
//! The scheduler owns one pool session's mining state. It waits on three
//! sources (control commands, the job stream and a re-evaluation timer) and
//! after each event rebuilds the worker generation:
//! stop and join workers, reseed the engine if the seed changed, evaluate
//! the activity state, and dispatch workers only when active.

use crate::miner::activity::ActivityMonitor;
use crate::miner::engine::HashEngine;
use crate::miner::job::{MiningJob, PoolJob};
use crate::miner::submitter::{ShareSubmitter, SubmitPolicy};
use crate::miner::worker::WorkerPool;
use crate::network::PoolConnection;
use crate::stats::StatsTracker;
use crate::types::{ActivityState, Command};
use crossbeam_channel::{Receiver, select};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Interval after which the loop re-evaluates state without any event
pub const REEVALUATE_INTERVAL: Duration = Duration::from_secs(30);

/// Seed most recently applied to the hash engine
///
/// Starts with nothing applied, so the first job always seeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedState {
    applied: Option<Vec<u8>>,
}

impl SeedState {
    /// Whether `seed` differs from the applied one.
    pub fn needs_reseed(&self, seed: &[u8]) -> bool {
        self.applied.as_deref() != Some(seed)
    }

    /// Records `seed` as applied.
    pub fn apply(&mut self, seed: &[u8]) {
        self.applied = Some(seed.to_vec());
    }

    /// The applied seed, if any.
    pub fn applied(&self) -> Option<&[u8]> {
        self.applied.as_deref()
    }
}

/// Everything a scheduler shares with the rest of one pool session
pub struct Session<E: HashEngine, P: PoolConnection> {
    /// Hash engine holding the dataset
    pub engine: Arc<E>,
    /// Live pool connection
    pub pool: Arc<P>,
    /// Shared stats
    pub stats: Arc<StatsTracker>,
    /// Runtime used for submission tasks
    pub runtime: Handle,
    /// Workers per generation
    pub threads: usize,
    /// Wait policy for submissions on a dead connection
    pub submit_policy: SubmitPolicy,
}

enum Event {
    Command(Command),
    CommandsClosed,
    Job(Box<PoolJob>),
    JobsClosed,
    Tick,
}

/// Control loop for one pool session
pub struct Scheduler<E: HashEngine, P: PoolConnection> {
    engine: Arc<E>,
    pool: Arc<P>,
    stats: Arc<StatsTracker>,
    submitter: Arc<ShareSubmitter<P>>,
    workers: WorkerPool,
    threads: usize,
    seed: SeedState,
    activity: ActivityMonitor,
    commands: Receiver<Command>,
    jobs: Receiver<PoolJob>,
    current: Option<Arc<MiningJob>>,
    tick: Duration,
}

impl<E: HashEngine, P: PoolConnection> Scheduler<E, P> {
    /// Creates a scheduler for `session`, continuing from `seed`.
    pub fn new(
        session: Session<E, P>,
        jobs: Receiver<PoolJob>,
        commands: Receiver<Command>,
        seed: SeedState,
    ) -> Self {
        let submitter = Arc::new(ShareSubmitter::new(
            session.pool.clone(),
            session.stats.clone(),
            session.runtime,
            session.submit_policy,
        ));
        Scheduler {
            engine: session.engine,
            pool: session.pool,
            stats: session.stats,
            submitter,
            workers: WorkerPool::new(),
            threads: session.threads,
            seed,
            activity: ActivityMonitor::new(),
            commands,
            jobs,
            current: None,
            tick: REEVALUATE_INTERVAL,
        }
    }

    /// Overrides the re-evaluation interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Runs until the job stream closes or an exit command arrives.
    ///
    /// Returns the seed state so the next session can skip a redundant
    /// reseed.
    pub fn run(mut self) -> SeedState {
        loop {
            let event = select! {
                recv(self.commands) -> msg => msg.map_or(Event::CommandsClosed, Event::Command),
                recv(self.jobs) -> msg => msg.map_or(Event::JobsClosed, |job| Event::Job(Box::new(job))),
                default(self.tick) => Event::Tick,
            };

            match event {
                Event::Command(Command::Exit) => {
                    log::info!("Stopping mining loop");
                    break;
                }
                Event::Command(command) => {
                    self.handle_command(command);
                    if self.current.is_none() {
                        log::warn!("no job to work on");
                        continue;
                    }
                }
                Event::CommandsClosed => {
                    self.commands = crossbeam_channel::never();
                    continue;
                }
                Event::JobsClosed => {
                    log::debug!("Job stream closed");
                    break;
                }
                Event::Job(job) => {
                    if !self.accept_job(&job) {
                        continue;
                    }
                }
                Event::Tick => {}
            }

            self.refresh();
        }

        self.workers.stop_and_wait();
        self.seed
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StateChange => {
                self.workers.stop_and_wait();
                self.stats.reset_recent();
            }
            Command::UpdateStats => {}
            Command::Exit => {}
            Command::Unknown(code) => log::error!("Unexpected poke: {}", code),
        }
    }

    /// Decodes `job` and makes it current. A job that fails to decode is
    /// dropped and the running generation is left alone.
    fn accept_job(&mut self, job: &PoolJob) -> bool {
        match MiningJob::decode(job) {
            Ok(decoded) => {
                let mining = if ActivityState::evaluate(self.pool.is_alive()).is_paused() {
                    "PAUSED"
                } else {
                    "ACTIVE"
                };
                log::info!(
                    "Current job: {}  Difficulty: {}  Mining: {}",
                    decoded.job_id,
                    decoded.difficulty,
                    mining
                );
                self.current = Some(Arc::new(decoded));
                true
            }
            Err(e) => {
                log::warn!("Discarding job {}: {}", job.job_id, e);
                false
            }
        }
    }

    fn refresh(&mut self) {
        self.workers.stop_and_wait();

        let Some(job) = self.current.clone() else {
            return;
        };

        // The dataset may only change while no worker is live.
        let mut seeded = true;
        if self.seed.needs_reseed(&job.seed) {
            log::info!("New seed: {}", hex::encode(&job.seed));
            match self.engine.seed(&job.seed, self.threads) {
                Ok(()) => {
                    self.seed.apply(&job.seed);
                    self.stats.reset_recent();
                }
                Err(e) => {
                    log::error!("Reseeding failed, retrying on the next event: {}", e);
                    seeded = false;
                }
            }
        }

        let state = ActivityState::evaluate(self.pool.is_alive());
        self.activity.observe(state, &self.stats);
        if !seeded || state.is_paused() {
            return;
        }

        log::info!("going to mine! {} threads on job {}", self.threads, job.job_id);
        if let Err(e) = self.workers.start(
            job,
            self.threads,
            self.engine.clone(),
            self.stats.clone(),
            self.submitter.clone(),
        ) {
            log::error!("Failed to start workers: {}", e);
        }
    }
}
