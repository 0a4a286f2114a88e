use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
/// Default soft-404 recurrence threshold (distinct observations of one signature)
pub const DEFAULT_SOFT_404_THRESHOLD: usize = 5;
/// Default redirect follow depth (redirects are recorded, not followed)
pub const DEFAULT_REDIRECT_DEPTH: usize = 0;

/// How the user-agent identity is picked from the pool for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    /// Always use the first identity in the pool
    #[default]
    Fixed,
    /// Cycle through the pool in order
    RoundRobin,
    /// Pick a random identity per request
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of concurrent workers
    pub concurrency: Option<usize>,

    /// Timeout in seconds for each HTTP request
    pub timeout: Option<u64>,

    /// Skip TLS certificate verification
    pub skip_tls_verification: Option<bool>,

    /// Status codes that qualify a result for reporting
    /// (default: all of 1xx/2xx/3xx plus 401 and 403)
    pub accepted_status_codes: Option<Vec<u16>>,

    /// Status codes that are always suppressed
    pub excluded_status_codes: Option<Vec<u16>>,

    /// Suppress responses whose body exceeds this many bytes
    pub max_content_length: Option<u64>,

    /// Maximum probe attempts per candidate (minimum 1)
    pub retry_ceiling: Option<u32>,

    /// Requests-per-second ceiling across all workers
    pub rate_limit_rps: Option<f64>,

    /// User-agent identity pool
    pub user_agents: Option<Vec<String>>,

    /// Identity rotation policy
    pub rotation_policy: Option<RotationPolicy>,

    /// Suppress a (status, length) signature once seen more than this many times
    pub soft_404_threshold: Option<usize>,

    /// How many redirects to follow (0 records the target without following)
    pub redirect_depth: Option<usize>,

    /// Candidate patterns to exclude from the wordlist (regex)
    pub exclude_patterns: Option<Vec<String>>,

    /// Output format (text, json)
    pub output_format: Option<String>,

    /// Enable verbose logging
    pub verbose: Option<bool>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: None, // Will default to CPU core count
            timeout: Some(DEFAULT_TIMEOUT_SECONDS),
            skip_tls_verification: Some(false),
            accepted_status_codes: None,
            excluded_status_codes: None,
            max_content_length: None,
            retry_ceiling: Some(1),
            rate_limit_rps: None,
            user_agents: None,
            rotation_policy: Some(RotationPolicy::Fixed),
            soft_404_threshold: Some(DEFAULT_SOFT_404_THRESHOLD),
            redirect_depth: Some(DEFAULT_REDIRECT_DEPTH),
            exclude_patterns: None,
            output_format: Some("text".to_string()),
            verbose: Some(false),
        }
    }
}

impl ScanConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ScanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to find and load a config file in standard locations
    pub fn load_from_standard_locations() -> Self {
        if let Ok(config) = Self::load_from_file(".dirprobe.toml") {
            return config;
        }

        for i in 1..=3 {
            let path = format!("{}.dirprobe.toml", "../".repeat(i));
            if let Ok(config) = Self::load_from_file(&path) {
                return config;
            }
        }

        Self::default()
    }

    /// Merge this config with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli_config: &CliConfig) {
        if let Some(concurrency) = cli_config.concurrency {
            self.concurrency = Some(concurrency);
        }
        if let Some(timeout) = cli_config.timeout {
            self.timeout = Some(timeout);
        }
        if cli_config.skip_tls_verification {
            self.skip_tls_verification = Some(true);
        }
        if let Some(ref accepted) = cli_config.accepted_status_codes {
            self.accepted_status_codes = Some(accepted.clone());
        }
        if let Some(ref excluded) = cli_config.excluded_status_codes {
            self.excluded_status_codes = Some(excluded.clone());
        }
        if let Some(max_content_length) = cli_config.max_content_length {
            self.max_content_length = Some(max_content_length);
        }
        if let Some(retry_ceiling) = cli_config.retry_ceiling {
            self.retry_ceiling = Some(retry_ceiling);
        }
        if let Some(rate_limit_rps) = cli_config.rate_limit_rps {
            self.rate_limit_rps = Some(rate_limit_rps);
        }
        if let Some(ref user_agents) = cli_config.user_agents {
            self.user_agents = Some(user_agents.clone());
        }
        if let Some(rotation_policy) = cli_config.rotation_policy {
            self.rotation_policy = Some(rotation_policy);
        }
        if let Some(soft_404_threshold) = cli_config.soft_404_threshold {
            self.soft_404_threshold = Some(soft_404_threshold);
        }
        if let Some(redirect_depth) = cli_config.redirect_depth {
            self.redirect_depth = Some(redirect_depth);
        }
        if let Some(ref output_format) = cli_config.output_format {
            self.output_format = Some(output_format.clone());
        }
        if cli_config.verbose {
            self.verbose = Some(true);
        }
    }

    /// Reject configurations the scan cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == Some(0) {
            return Err(crate::error::DirProbeError::Config(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.timeout == Some(0) {
            return Err(crate::error::DirProbeError::Config(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if let Some(rps) = self.rate_limit_rps
            && rps <= 0.0
        {
            return Err(crate::error::DirProbeError::Config(
                "rate limit must be greater than 0 requests per second".to_string(),
            ));
        }
        Ok(())
    }

    /// Compile exclude patterns into regex objects
    pub fn compile_exclude_patterns(&self) -> Result<Vec<Regex>> {
        let mut compiled = Vec::new();
        if let Some(ref patterns) = self.exclude_patterns {
            for pattern in patterns {
                compiled.push(Regex::new(pattern)?);
            }
        }
        Ok(compiled)
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    /// Number of workers, defaulting to the CPU core count
    pub fn worker_count(&self) -> usize {
        self.concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Maximum probe attempts per candidate; a retry ceiling of 0 still probes once
    pub fn max_attempts(&self) -> u32 {
        self.retry_ceiling.unwrap_or(1).max(1)
    }
}

/// Configuration options that can come from CLI
#[derive(Debug, Default)]
pub struct CliConfig {
    pub concurrency: Option<usize>,
    pub timeout: Option<u64>,
    pub skip_tls_verification: bool,
    pub accepted_status_codes: Option<Vec<u16>>,
    pub excluded_status_codes: Option<Vec<u16>>,
    pub max_content_length: Option<u64>,
    pub retry_ceiling: Option<u32>,
    pub rate_limit_rps: Option<f64>,
    pub user_agents: Option<Vec<String>>,
    pub rotation_policy: Option<RotationPolicy>,
    pub soft_404_threshold: Option<usize>,
    pub redirect_depth: Option<usize>,
    pub output_format: Option<String>,
    pub verbose: bool,
    pub no_config: bool,
    pub config_file: Option<String>,
}
