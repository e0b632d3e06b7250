// src/network/session.rs
//! Session supervisor
//!
//! Connects to the configured pool, runs a [`Scheduler`] on the session's
//! job stream, and reconnects whenever the scheduler returns. Connection
//! failures are retried immediately, with an optional fixed delay.

use crate::config::PoolConfig;
use crate::miner::engine::HashEngine;
use crate::miner::scheduler::{REEVALUATE_INTERVAL, Scheduler, SeedState, Session};
use crate::miner::submitter::SubmitPolicy;
use crate::network::{PoolConnection, PoolConnector};
use crate::stats::StatsTracker;
use crate::types::Command;
use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Handle for poking a running supervisor from elsewhere
#[derive(Clone)]
pub struct Controller {
    commands: Sender<Command>,
    shutdown: Arc<AtomicBool>,
}

impl Controller {
    /// Sends a command to the active control loop.
    pub fn poke(&self, command: Command) -> Result<(), MinerError> {
        self.commands.send(command)?;
        Ok(())
    }

    /// Stops reconnecting and tells the active control loop to exit.
    pub fn shutdown(&self) -> Result<(), MinerError> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.poke(Command::Exit)
    }

    /// Whether shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Keeps one pool session running for the life of the miner
pub struct Supervisor<C: PoolConnector, E: HashEngine> {
    connector: C,
    pool: PoolConfig,
    engine: Arc<E>,
    stats: Arc<StatsTracker>,
    threads: usize,
    user_agent: String,
    reconnect_delay: Duration,
    submit_policy: SubmitPolicy,
    tick: Duration,
    commands: Receiver<Command>,
    controller: Controller,
}

impl<C: PoolConnector, E: HashEngine> Supervisor<C, E> {
    /// Creates a supervisor for `pool` with `threads` workers per generation.
    pub fn new(
        connector: C,
        pool: PoolConfig,
        engine: Arc<E>,
        stats: Arc<StatsTracker>,
        threads: usize,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Supervisor {
            connector,
            pool,
            engine,
            stats,
            threads,
            user_agent: default_user_agent(),
            reconnect_delay: Duration::ZERO,
            submit_policy: SubmitPolicy::default(),
            tick: REEVALUATE_INTERVAL,
            commands: rx,
            controller: Controller {
                commands: tx,
                shutdown: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Sets the pause between failed connection attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets how long submissions wait for a dropped connection.
    pub fn with_submit_policy(mut self, policy: SubmitPolicy) -> Self {
        self.submit_policy = policy;
        self
    }

    /// Sets the control loop's re-evaluation interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Handle for sending commands and requesting shutdown.
    pub fn controller(&self) -> Controller {
        self.controller.clone()
    }

    /// Connects, mines, and reconnects until shutdown is requested.
    pub async fn run(&self) -> Result<(), MinerError> {
        let runtime = tokio::runtime::Handle::current();
        let mut seed = SeedState::default();

        while !self.controller.is_shutdown() {
            let (connection, jobs) = match self.connector.connect(&self.pool, &self.user_agent).await {
                Ok(session) => session,
                Err(e) => {
                    log::warn!("Pool connection failed: {}", e);
                    if self.reconnect_delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(self.reconnect_delay).await;
                    }
                    continue;
                }
            };

            let engine = self.engine.clone();
            let threads = self.threads;
            let init = match tokio::task::spawn_blocking(move || engine.init(threads)).await {
                Ok(init) => init,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = init {
                log::error!("Hash engine init failed: {}", e);
                connection.close();
                continue;
            }
            self.stats.reset_recent();

            let session = Session {
                engine: self.engine.clone(),
                pool: connection.clone(),
                stats: self.stats.clone(),
                runtime: runtime.clone(),
                threads: self.threads,
                submit_policy: self.submit_policy,
            };
            let scheduler = Scheduler::new(session, jobs, self.commands.clone(), seed).with_tick(self.tick);
            seed = match tokio::task::spawn_blocking(move || scheduler.run()).await {
                Ok(seed) => seed,
                Err(e) => {
                    // The dataset may be half built; force a reseed next session.
                    log::error!("Mining loop failed: {}", e);
                    SeedState::default()
                }
            };

            connection.close();
            log::info!("Mining session ended");
        }

        Ok(())
    }
}

fn default_user_agent() -> String {
    format!("nevo_miner-rs/{}", env!("CARGO_PKG_VERSION"))
}
