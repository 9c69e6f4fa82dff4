use clap::Parser;
use std::path::PathBuf;

use crate::checkpoint::ResumeMode;
use crate::config::{AppConfig, RateLimitStrategy, CONFIG_PATH, MAX_CONCURRENCY};

#[derive(Parser, Debug)]
#[command(name = "catalogresolver")]
#[command(about = "Resolves a list of application names against a store catalog and reports prices")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/catalogresolver.toml
    #[arg(long)]
    pub init: bool,

    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = CONFIG_PATH)]
    pub config: PathBuf,

    /// Name list to resolve: .txt (one name per line), .csv or .json (overrides config)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Directory for reports and the checkpoint (overrides config)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Store region / country code, e.g. "ua" or "us" (overrides config)
    #[arg(long)]
    pub region: Option<String>,

    /// Fixed delay between requests in milliseconds, 0 = unlimited
    /// (overrides config and selects the fixed delay strategy)
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Write a checkpoint every N processed names, 0 = only at the end (overrides config)
    #[arg(long, value_name = "N")]
    pub checkpoint_interval: Option<usize>,

    /// Number of names resolved in parallel (overrides config)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Auto-resume from checkpoint if one exists (skip resume prompt)
    #[arg(long, conflicts_with = "no_resume")]
    pub resume: bool,

    /// Start fresh, ignore any existing checkpoint
    #[arg(long, conflicts_with = "resume")]
    pub no_resume: bool,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Export execution logs to a file (specify file path)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err("Region cannot be empty".to_string());
            }
        }

        if let Some(jobs) = self.jobs {
            if jobs == 0 {
                return Err("Jobs must be greater than 0".to_string());
            }
            if jobs > MAX_CONCURRENCY {
                return Err(format!(
                    "Jobs cannot exceed {} to avoid overwhelming the store API",
                    MAX_CONCURRENCY
                ));
            }
        }

        Ok(())
    }

    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(input) = &self.input {
            config.paths.input = input.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.paths.output_dir = output_dir.clone();
        }
        if let Some(region) = &self.region {
            config.search.region = region.trim().to_lowercase();
        }
        if let Some(delay_ms) = self.delay_ms {
            config.rate_limit.strategy = RateLimitStrategy::FixedDelay;
            config.rate_limit.request_delay_ms = delay_ms;
        }
        if let Some(interval) = self.checkpoint_interval {
            config.run.checkpoint_interval = interval;
        }
        if let Some(jobs) = self.jobs {
            config.run.concurrency = jobs;
        }
    }

    /// Get the resume mode based on CLI flags
    pub fn get_resume_mode(&self) -> ResumeMode {
        if self.resume {
            ResumeMode::AutoResume
        } else if self.no_resume {
            ResumeMode::Fresh
        } else {
            ResumeMode::Prompt
        }
    }
}
