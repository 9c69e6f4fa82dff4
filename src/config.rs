//! Configuration management for catalogresolver
//!
//! Configuration is loaded from `./config/catalogresolver.toml` (or the path
//! given with `--config`). The default template is embedded in the binary and
//! written out by `--init`.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/catalogresolver.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/catalogresolver.toml");

/// Upper bound for parallel resolutions; the remote rate limit makes more
/// workers pointless.
pub const MAX_CONCURRENCY: usize = 16;

/// Bounds for the token bucket rate: one request per ~17 minutes up to 1000/s
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;
pub const MAX_REQUESTS_PER_SECOND: f64 = 1000.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' is out of range: {reason}")]
    OutOfRange { field: String, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub search: SearchConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Store search endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    /// Store region (country code), fixed for the whole run
    pub region: String,
    #[serde(default)]
    pub language: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Request pacing policy
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    /// Wait a fixed delay between consecutive requests
    FixedDelay,
    /// Token bucket with a sustained rate and a burst allowance
    TokenBucket,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_strategy")]
    pub strategy: RateLimitStrategy,
    /// Delay between requests for the fixed delay strategy (0 = unlimited)
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Sustained rate for the token bucket strategy (0 = unlimited)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_strategy() -> RateLimitStrategy {
    RateLimitStrategy::FixedDelay
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_requests_per_second() -> f64 {
    0.5
}

fn default_burst() -> u32 {
    1
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            request_delay_ms: default_request_delay_ms(),
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
        }
    }
}

impl RateLimitConfig {
    /// Average spacing between requests implied by the policy, used for the
    /// start-up time estimate.
    pub fn average_spacing(&self) -> std::time::Duration {
        match self.strategy {
            RateLimitStrategy::FixedDelay => std::time::Duration::from_millis(self.request_delay_ms),
            RateLimitStrategy::TokenBucket if self.requests_per_second > 0.0 => {
                std::time::Duration::from_secs_f64(1.0 / self.requests_per_second)
            }
            RateLimitStrategy::TokenBucket => std::time::Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Write a checkpoint every N processed queries (0 = never)
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    /// Number of queries resolved in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_checkpoint_interval() -> usize {
    50
}

fn default_concurrency() -> usize {
    1
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: default_checkpoint_interval(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_input() -> PathBuf {
    PathBuf::from("GameList.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output_dir: default_output_dir(),
        }
    }
}

/// Report and checkpoint file names, relative to the output directory
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_resolved_file")]
    pub resolved: String,
    #[serde(default = "default_not_found_file")]
    pub not_found: String,
    #[serde(default = "default_ambiguous_file")]
    pub ambiguous: String,
    #[serde(default = "default_errors_file")]
    pub errors: String,
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint: String,
    #[serde(default)]
    pub resolved_csv: Option<String>,
}

fn default_resolved_file() -> String {
    "results.txt".to_string()
}

fn default_not_found_file() -> String {
    "not_found.txt".to_string()
}

fn default_ambiguous_file() -> String {
    "multiple.json".to_string()
}

fn default_errors_file() -> String {
    "errors.txt".to_string()
}

fn default_checkpoint_file() -> String {
    "checkpoint.json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            resolved: default_resolved_file(),
            not_found: default_not_found_file(),
            ambiguous: default_ambiguous_file(),
            errors: default_errors_file(),
            checkpoint: default_checkpoint_file(),
            resolved_csv: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("search.endpoint", &self.search.endpoint),
            ("search.region", &self.search.region),
            ("search.user_agent", &self.search.user_agent),
            ("output.resolved", &self.output.resolved),
            ("output.not_found", &self.output.not_found),
            ("output.ambiguous", &self.output.ambiguous),
            ("output.errors", &self.output.errors),
            ("output.checkpoint", &self.output.checkpoint),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: field.to_string(),
                });
            }
        }

        if !self.search.endpoint.starts_with("https://") && !self.search.endpoint.starts_with("http://") {
            return Err(ConfigError::InvalidUrl {
                field: "search.endpoint".to_string(),
                url: self.search.endpoint.clone(),
            });
        }

        if self.search.request_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "search.request_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.run.concurrency == 0 || self.run.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::OutOfRange {
                field: "run.concurrency".to_string(),
                reason: format!("must be between 1 and {}", MAX_CONCURRENCY),
            });
        }

        if self.rate_limit.strategy == RateLimitStrategy::TokenBucket {
            let rate = self.rate_limit.requests_per_second;
            if !(MIN_REQUESTS_PER_SECOND..=MAX_REQUESTS_PER_SECOND).contains(&rate) {
                return Err(ConfigError::OutOfRange {
                    field: "rate_limit.requests_per_second".to_string(),
                    reason: format!(
                        "must be between {} and {} for the token_bucket strategy",
                        MIN_REQUESTS_PER_SECOND, MAX_REQUESTS_PER_SECOND
                    ),
                });
            }
            if self.rate_limit.burst == 0 {
                return Err(ConfigError::OutOfRange {
                    field: "rate_limit.burst".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Settings that change search results. A checkpoint written under
    /// different settings cannot be resumed.
    pub fn settings_fingerprint(&self) -> String {
        format!(
            "{}|{}|{}",
            self.search.endpoint,
            self.search.region,
            self.search.language.as_deref().unwrap_or("")
        )
    }

    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config_at(path)?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}
