// src/stats/reporter.rs
use crate::stats::tracker::{StatsSnapshot, StatsTracker, format_hashrate};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Components, System};

/// Statistics related to hardware performance
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used on the system (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

/// Periodically logs a summary of the tracker together with hardware readings
pub struct StatsReporter {
    /// Counters shared with workers and submission tasks
    tracker: Arc<StatsTracker>,
    /// System information collector
    system: System,
    /// Hardware component information collector
    components: Components,
    /// Interval at which stats are reported
    report_interval: Duration,
}

impl StatsReporter {
    /// Creates a new StatsReporter with the specified reporting interval
    ///
    /// # Arguments
    /// * `tracker` - The tracker to summarize
    /// * `report_interval` - How often to log statistics
    pub fn new(tracker: Arc<StatsTracker>, report_interval: Duration) -> Self {
        StatsReporter {
            tracker,
            system: System::new_all(),
            components: Components::new_with_refreshed_list(),
            report_interval,
        }
    }

    /// Gets the current mining statistics
    pub fn get_stats(&self) -> StatsSnapshot {
        self.tracker.snapshot()
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    pub fn get_hardware_stats(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }

    /// Renders one summary line.
    pub fn summary_line(mining: &StatsSnapshot, hw: &HardwareStats) -> String {
        format!(
            "Hashrate: {}H/s | Accepted/Rejected: {}/{} | Pool hashes: {} | Client hashes: {} | CPU: {:.1}% | Mem: {} MiB | Temp: {:.1}°C",
            format_hashrate(mining.hashrate),
            mining.shares_accepted,
            mining.shares_rejected,
            mining.pool_hashes,
            mining.client_hashes,
            hw.cpu_usage,
            hw.memory_used / (1024 * 1024),
            hw.temperature
        )
    }

    /// Starts the periodic reporting of statistics
    ///
    /// This spawns a background thread that logs stats at the configured interval.
    pub fn start_reporting(mut self) -> std::io::Result<()> {
        std::thread::Builder::new()
            .name("stats-reporter".into())
            .spawn(move || {
                loop {
                    std::thread::sleep(self.report_interval);
                    let mining_stats = self.get_stats();
                    let hw_stats = self.get_hardware_stats();
                    log::info!("{}", Self::summary_line(&mining_stats, &hw_stats));
                }
            })?;
        Ok(())
    }
}
