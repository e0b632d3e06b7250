// src/main.rs
use clap::Parser;
use nevo_miner_rs::miner::ShareSink;
use nevo_miner_rs::utils::logging::init_bench_logging;
use nevo_miner_rs::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

/// Main entry point for the miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts the mining operation with given configuration options
///
/// # Operations
/// 1. Loads and validates configuration
/// 2. Initializes logging
/// 3. Sets up statistics reporting
/// 4. Runs the session supervisor until Ctrl-C
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    let mut config = config::load(&opts.config)?;
    // Apply CLI overrides
    if opts.verbose {
        config.verbose = true;
    }
    utils::init_logging(config.verbose);
    config.validate()?;

    let threads = match opts.threads {
        Some(0) => return Err(MinerError::ConfigError("thread count must be at least 1".into())),
        Some(threads) => threads,
        None => config.thread_count(),
    };
    let pool = config.primary_pool()?.clone();
    log::info!("Mining on {} with {} threads", pool.url, threads);

    let stats = Arc::new(StatsTracker::new(config.print_interval()));
    stats::StatsReporter::new(stats.clone(), config.print_interval()).start_reporting()?;

    let engine = Arc::new(RandomXEngine::new(true));
    let supervisor = Supervisor::new(PoolClient::new(), pool, engine, stats, threads)
        .with_reconnect_delay(Duration::from_secs(1));
    let controller = supervisor.controller();

    let rt = Runtime::new()?;
    rt.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutting down");
                if let Err(e) = controller.shutdown() {
                    log::error!("Failed to stop mining: {}", e);
                }
            }
        });
        supervisor.run().await
    })
}

/// Discards shares found while benchmarking
struct Discard;

impl ShareSink for Discard {
    fn dispatch(&self, _share: Share) {}
}

/// Runs the RandomX benchmark
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Seeds the engine with a fixed key
/// 3. Runs one worker generation on a synthetic job
/// 4. Reports total hashes and average hashrate
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let engine = Arc::new(RandomXEngine::new(true));
    let stats = Arc::new(StatsTracker::new(Duration::from_secs(5)));
    let key = [0u8; 32];

    log::info!("Preparing RandomX dataset for {} threads", opts.threads);
    engine.init(opts.threads)?;
    engine.seed(&key, opts.threads)?;

    let job = Arc::new(MiningJob {
        job_id: "benchmark".into(),
        blob: vec![0u8; 76],
        target: vec![0u8; 8],
        difficulty: u64::MAX,
        height: None,
        seed: key.to_vec(),
        algorithm: "rx/0".into(),
    });

    log::info!("Starting RandomX benchmark for {} seconds", opts.duration);
    log::logger().flush();

    let start_time = Instant::now();
    let mut workers = WorkerPool::new();
    workers.start(job, opts.threads, engine, stats.clone(), Arc::new(Discard))?;
    std::thread::sleep(Duration::from_secs(opts.duration));
    workers.stop_and_wait();
    let elapsed = start_time.elapsed().as_secs_f64();

    // Report final results
    let total = stats.snapshot().client_hashes;
    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", total);
    log::info!(
        "Average hashrate: {}H/s",
        stats::format_hashrate(total as f64 / elapsed.max(f64::EPSILON))
    );
    log::logger().flush(); // Ensure final results appear

    Ok(())
}

/// Writes the configuration template to the requested path
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let template = config::generate_template();
    std::fs::write(&opts.output, template)?;
    println!("Wrote configuration template to {}", opts.output.display());
    Ok(())
}
