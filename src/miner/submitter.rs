// src/miner/submitter.rs
//! Share submission pipeline
//!
//! Every share found by a worker becomes its own task on the async runtime.
//! Spawning never blocks the worker; the task waits for the connection,
//! submits, and records the outcome.

use crate::network::PoolConnection;
use crate::stats::StatsTracker;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;

/// A qualifying hash found by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    /// Job ID this share belongs to
    pub job_id: String,
    /// Nonce that produced the valid hash
    pub nonce: [u8; 4],
    /// Resulting hash that meets the target
    pub hash: [u8; 32],
    /// Difficulty of the job the share was found for
    pub difficulty: u64,
}

/// A share with its reserved per-connection sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareResult {
    /// The found share
    pub share: Share,
    /// Submission sequence number, unique and increasing per connection
    pub sequence: u64,
}

/// How the pool answered a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Pool credited the share
    Accepted,
    /// Pool refused the share
    Rejected,
    /// The transport failed; the connection was closed
    TransportFailed,
    /// Success without a result payload; the connection was closed
    EmptyResult,
}

/// Wait policy applied while the connection is down
#[derive(Debug, Clone, Copy)]
pub struct SubmitPolicy {
    /// Liveness checks before submitting anyway
    pub attempts: u32,
    /// Pause between checks
    pub interval: Duration,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        SubmitPolicy {
            attempts: 100,
            interval: Duration::from_secs(1),
        }
    }
}

/// Receives shares from workers
///
/// Implementations must return without waiting on I/O.
pub trait ShareSink: Send + Sync + 'static {
    /// Takes ownership of a found share.
    fn dispatch(&self, share: Share);
}

/// Submits shares to one pool connection
pub struct ShareSubmitter<P: PoolConnection> {
    pool: Arc<P>,
    stats: Arc<StatsTracker>,
    runtime: Handle,
    sequence: AtomicU64,
    policy: SubmitPolicy,
}

impl<P: PoolConnection> ShareSubmitter<P> {
    /// First sequence number handed out on a connection
    pub const FIRST_SEQUENCE: u64 = 1;

    /// Creates a submitter whose tasks run on `runtime`.
    pub fn new(pool: Arc<P>, stats: Arc<StatsTracker>, runtime: Handle, policy: SubmitPolicy) -> Self {
        ShareSubmitter {
            pool,
            stats,
            runtime,
            sequence: AtomicU64::new(Self::FIRST_SEQUENCE),
            policy,
        }
    }

    /// Reserves the next sequence number for `share`.
    pub fn reserve(&self, share: Share) -> ShareResult {
        ShareResult {
            share,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl<P: PoolConnection> ShareSink for ShareSubmitter<P> {
    fn dispatch(&self, share: Share) {
        let result = self.reserve(share);
        let pool = self.pool.clone();
        let stats = self.stats.clone();
        let policy = self.policy;
        self.runtime.spawn(async move {
            submit(pool.as_ref(), &stats, policy, result).await;
        });
    }
}

/// Submits one share and records the outcome.
pub async fn submit<P: PoolConnection>(
    pool: &P,
    stats: &StatsTracker,
    policy: SubmitPolicy,
    result: ShareResult,
) -> SubmitOutcome {
    // Give a dropped connection a chance to come back before the share goes stale.
    for _ in 0..policy.attempts {
        if pool.is_alive() {
            break;
        }
        tokio::time::sleep(policy.interval).await;
    }

    let ShareResult { share, sequence } = result;
    let nonce = hex::encode(share.nonce);
    let hash = hex::encode(share.hash);

    let response = match pool.submit_work(&nonce, &share.job_id, &hash, sequence).await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Submit work client failure: {} {}", share.job_id, e);
            pool.close();
            return SubmitOutcome::TransportFailed;
        }
    };

    if let Some(error) = response.error {
        stats.share_rejected();
        log::warn!("Submit work server error: {} {}", share.job_id, error);
        return SubmitOutcome::Rejected;
    }
    if response.result.is_none() {
        log::warn!("Submit work returned no result: {}", share.job_id);
        pool.close();
        return SubmitOutcome::EmptyResult;
    }

    stats.share_accepted(share.difficulty);
    log::info!("Share accepted: job {} difficulty {}", share.job_id, share.difficulty);
    SubmitOutcome::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubPool, SubmitBehavior, wait_until};
    use std::collections::BTreeSet;

    fn share(job: &str) -> Share {
        Share {
            job_id: job.into(),
            nonce: [0xde, 0xad, 0xbe, 0xef],
            hash: [0x11; 32],
            difficulty: 5000,
        }
    }

    fn quick() -> SubmitPolicy {
        SubmitPolicy {
            attempts: 100,
            interval: Duration::from_millis(5),
        }
    }

    fn stats() -> StatsTracker {
        StatsTracker::new(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn accepted_share_credits_difficulty() {
        let pool = StubPool::new(true);
        let stats = stats();
        let outcome = submit(&pool, &stats, quick(), ShareResult { share: share("a"), sequence: 4 }).await;

        assert_eq!(outcome, SubmitOutcome::Accepted);
        assert_eq!(stats.snapshot().shares_accepted, 1);
        assert_eq!(stats.snapshot().pool_hashes, 5000);

        let sent = pool.submissions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].nonce, "deadbeef");
        assert_eq!(sent[0].job_id, "a");
        assert_eq!(sent[0].hash, "11".repeat(32));
        assert_eq!(sent[0].sequence, 4);
    }

    #[tokio::test]
    async fn pool_error_counts_as_rejected() {
        let pool = StubPool::new(true).with_behavior(SubmitBehavior::Refuse);
        let stats = stats();
        let outcome = submit(&pool, &stats, quick(), ShareResult { share: share("a"), sequence: 1 }).await;

        assert_eq!(outcome, SubmitOutcome::Rejected);
        assert_eq!(stats.snapshot().shares_rejected, 1);
        assert_eq!(stats.snapshot().shares_accepted, 0);
        assert_eq!(pool.closes(), 0);
    }

    #[tokio::test]
    async fn transport_failure_closes_without_stats() {
        let pool = StubPool::new(true).with_behavior(SubmitBehavior::TransportError);
        let stats = stats();
        let outcome = submit(&pool, &stats, quick(), ShareResult { share: share("a"), sequence: 1 }).await;

        assert_eq!(outcome, SubmitOutcome::TransportFailed);
        assert_eq!(stats.snapshot(), crate::stats::StatsSnapshot::default());
        assert_eq!(pool.closes(), 1);
    }

    #[tokio::test]
    async fn empty_result_closes_connection() {
        let pool = StubPool::new(true).with_behavior(SubmitBehavior::EmptyResult);
        let stats = stats();
        let outcome = submit(&pool, &stats, quick(), ShareResult { share: share("a"), sequence: 1 }).await;

        assert_eq!(outcome, SubmitOutcome::EmptyResult);
        assert_eq!(stats.snapshot().shares_accepted, 0);
        assert_eq!(pool.closes(), 1);
    }

    #[tokio::test]
    async fn waits_for_connection_then_submits() {
        let pool = Arc::new(StubPool::new(false));
        let stats = stats();
        let revive = {
            let pool = pool.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                pool.set_alive(true);
            })
        };

        let outcome = submit(pool.as_ref(), &stats, quick(), ShareResult { share: share("a"), sequence: 1 }).await;
        revive.await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Accepted);
        assert!(pool.alive_checks() > 1);
    }

    #[tokio::test]
    async fn submits_even_if_connection_never_returns() {
        let pool = StubPool::new(false);
        let stats = stats();
        let policy = SubmitPolicy {
            attempts: 3,
            interval: Duration::from_millis(1),
        };
        submit(&pool, &stats, policy, ShareResult { share: share("a"), sequence: 1 }).await;
        assert_eq!(pool.submissions().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sequence_numbers_are_reserved_at_dispatch() {
        let pool = Arc::new(StubPool::new(true));
        let stats = Arc::new(stats());
        let submitter = Arc::new(ShareSubmitter::new(
            pool.clone(),
            stats.clone(),
            Handle::current(),
            quick(),
        ));

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let submitter = submitter.clone();
                std::thread::spawn(move || {
                    for i in 0..5 {
                        submitter.dispatch(share(&format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let pool_ref = pool.clone();
        assert!(wait_until(Duration::from_secs(5), move || pool_ref.submissions().len() == 20).await);
        let sequences: BTreeSet<u64> = pool.submissions().iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, (1..=20).collect::<BTreeSet<u64>>());
        assert!(wait_until(Duration::from_secs(5), move || stats.snapshot().shares_accepted == 20).await);
    }
}
