// src/stats/tracker.rs
//! Hash and share accounting shared by workers, submissions and the reporter

use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// Point-in-time copy of the tracker's counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Shares the pool accepted
    pub shares_accepted: u64,
    /// Shares the pool rejected
    pub shares_rejected: u64,
    /// Sum of the target difficulties of accepted shares
    pub pool_hashes: u64,
    /// Hashes computed locally since process start
    pub client_hashes: u64,
    /// Most recently published rolling hashrate (hashes per second)
    pub hashrate: f64,
}

struct Counters {
    last_tally: Instant,
    window_hashes: u64,
    window_resets: u64,
    shares_accepted: u64,
    shares_rejected: u64,
    pool_hashes: u64,
    client_hashes: u64,
    last_hashrate: f64,
}

/// Accumulates hash counts and share outcomes
///
/// Every operation takes the same lock, so any number of workers,
/// submission tasks and readers may call in concurrently.
pub struct StatsTracker {
    counters: RwLock<Counters>,
    print_interval: Duration,
}

impl StatsTracker {
    /// Creates a tracker that publishes a hashrate whenever more than
    /// `print_interval` has passed since the last publication.
    pub fn new(print_interval: Duration) -> Self {
        StatsTracker {
            counters: RwLock::new(Counters {
                last_tally: Instant::now(),
                window_hashes: 0,
                window_resets: 0,
                shares_accepted: 0,
                shares_rejected: 0,
                pool_hashes: 0,
                client_hashes: 0,
                last_hashrate: 0.0,
            }),
            print_interval,
        }
    }

    /// Adds `count` hashes to the totals and publishes a new hashrate when
    /// the reporting window has elapsed.
    pub fn tally_hashes(&self, count: u64) {
        let mut c = self.counters.write();
        c.client_hashes += count;
        c.window_hashes += count;

        let elapsed = c.last_tally.elapsed();
        if elapsed > self.print_interval {
            c.last_hashrate = c.window_hashes as f64 / elapsed.as_secs_f64();
            log::info!("Hashrate is now: {}H/s", format_hashrate(c.last_hashrate));
            c.last_tally = Instant::now();
            c.window_hashes = 0;
        }
    }

    /// Records an accepted share worth `difficulty` pool-side hashes.
    pub fn share_accepted(&self, difficulty: u64) {
        let mut c = self.counters.write();
        c.shares_accepted += 1;
        c.pool_hashes = c.pool_hashes.saturating_add(difficulty);
    }

    /// Records a share the pool refused.
    pub fn share_rejected(&self) {
        self.counters.write().shares_rejected += 1;
    }

    /// Restarts the reporting window, leaving cumulative totals alone.
    ///
    /// Call whenever the hashrate is about to change materially (reseed,
    /// thread count change, reconnect, activity transition), and only
    /// after all workers have stopped.
    pub fn reset_recent(&self) {
        let mut c = self.counters.write();
        c.last_tally = Instant::now();
        c.window_hashes = 0;
        c.window_resets += 1;
    }

    /// Most recently published hashrate.
    pub fn hashrate(&self) -> f64 {
        self.counters.read().last_hashrate
    }

    /// Hashes tallied since the current window started.
    pub fn window_hashes(&self) -> u64 {
        self.counters.read().window_hashes
    }

    /// Number of times the reporting window has been reset.
    pub fn window_resets(&self) -> u64 {
        self.counters.read().window_resets
    }

    /// Copies the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let c = self.counters.read();
        StatsSnapshot {
            shares_accepted: c.shares_accepted,
            shares_rejected: c.shares_rejected,
            pool_hashes: c.pool_hashes,
            client_hashes: c.client_hashes,
            hashrate: c.last_hashrate,
        }
    }
}

/// Formats a hashes-per-second value with a unit prefix.
///
/// Values below one thousand are rounded to whole hashes; larger values are
/// scaled to `k` or `M` with two decimals. The trailing space separates the
/// prefix from a following unit such as `H/s`.
pub fn format_hashrate(rate: f64) -> String {
    if rate >= 1_000_000.0 {
        format!("{:.2} M", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.2} k", rate / 1_000.0)
    } else {
        format!("{:.0} ", rate)
    }
}
