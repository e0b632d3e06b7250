// src/config/config.rs
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the mining application
///
/// Only the first entry of `pools` is connected to; the rest are kept so a
/// config file can list fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pools to mine on, in order of preference
    #[serde(default)]
    pub pools: Vec<PoolConfig>,

    /// Seconds between hashrate publications and stats summaries
    /// (default: 60)
    #[serde(default = "default_print_interval")]
    pub print_interval: u64,

    /// Upper bound on worker threads (default: all CPU cores)
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Enables debug logging
    #[serde(default)]
    pub verbose: bool,
}

/// Connection settings for one pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// `host:port` or `stratum+tcp://host:port`
    pub url: String,

    /// Whether the pool expects TLS
    #[serde(default)]
    pub tls: bool,

    /// SHA-256 fingerprint of the pool certificate, as hex
    #[serde(default)]
    pub tls_fingerprint: Option<String>,

    /// Login, usually the wallet address
    pub user: String,

    /// Pool password
    #[serde(default = "default_pass")]
    pub pass: String,
}

fn default_print_interval() -> u64 {
    60
}

fn default_pass() -> String {
    "x".into()
}

const MAX_CONCURRENCY: usize = 65535;

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&config_str)
    }

    /// Parses configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self, MinerError> {
        toml::from_str(text)
            .map_err(|e| MinerError::ConfigError(format!("Invalid config format: {}", e)))
    }

    /// Checks the settings a running miner depends on.
    pub fn validate(&self) -> Result<(), MinerError> {
        let pool = self
            .pools
            .first()
            .ok_or_else(|| MinerError::ConfigError("No pools configured".into()))?;

        for pool in &self.pools {
            if pool.url.trim().is_empty() {
                return Err(MinerError::ConfigError("Pool url must not be empty".into()));
            }
            if let Some(fingerprint) = &pool.tls_fingerprint {
                let valid = fingerprint.len() == 64 && fingerprint.chars().all(|c| c.is_ascii_hexdigit());
                if !valid {
                    return Err(MinerError::ConfigError(format!(
                        "Invalid TLS fingerprint for {}: expected 64 hex characters",
                        pool.url
                    )));
                }
            }
        }

        if self.print_interval == 0 {
            return Err(MinerError::ConfigError("print_interval must be greater than 0".into()));
        }

        if let Some(cap) = self.max_concurrency {
            if !(1..=MAX_CONCURRENCY).contains(&cap) {
                return Err(MinerError::ConfigError(format!(
                    "max_concurrency must be between 1 and {}, got {}",
                    MAX_CONCURRENCY, cap
                )));
            }
        }

        log::debug!("Using pool {} as {}", pool.url, pool.user);
        Ok(())
    }

    /// The pool the miner connects to.
    pub fn primary_pool(&self) -> Result<&PoolConfig, MinerError> {
        self.pools
            .first()
            .ok_or_else(|| MinerError::ConfigError("No pools configured".into()))
    }

    /// Worker threads per generation: all cores, capped by `max_concurrency`.
    pub fn thread_count(&self) -> usize {
        let cores = num_cpus::get();
        match self.max_concurrency {
            Some(cap) => cores.min(cap),
            None => cores,
        }
    }

    /// Print interval as a [`Duration`].
    pub fn print_interval(&self) -> Duration {
        Duration::from_secs(self.print_interval)
    }

    /// Generates a configuration template string
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template() -> String {
        let mut template = String::new();
        template.push_str("# nevo_miner-rs configuration\n\n");
        template.push_str("# Seconds between hashrate and stats reports\n");
        template.push_str("print_interval = 60\n");
        template.push_str("# Cap on worker threads (remove to use every core)\n");
        template.push_str("# max_concurrency = 4\n");
        template.push_str("verbose = false\n\n");
        template.push_str("# Only the first pool is used\n");
        template.push_str("[[pools]]\n");
        template.push_str("url = \"stratum+tcp://pool.example.com:3333\"\n");
        template.push_str("user = \"your_wallet_address\"\n");
        template.push_str("pass = \"x\"\n");
        template.push_str("tls = false\n");
        template.push_str("# tls_fingerprint = \"<64 hex chars>\"\n");

        template
    }
}
