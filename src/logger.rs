use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;

use crate::outcome::RunSummary;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Only progress bar and final summary
    Summary = 1,  // Run milestones (default)
    Detailed = 2, // Per-name results and warnings
    Debug = 3,    // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    run_metadata: Arc<Mutex<RunMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<PathBuf>,
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    region: String,
    queries_processed: usize,
    queries_skipped: usize,
    counts: RunSummary,
    checkpoint_writes: usize,
    checkpoint_failures: usize,
    output_dir: String,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            run_metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: Some(log_file_path.into()),
            ..Self::new(verbosity)
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    /// Errors are shown at every verbosity level
    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Local::now().format("%H:%M:%S%.3f"), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Print above the progress bar when one is active
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub async fn start_progress(&self, total_steps: u64) {
        let pb = ProgressBar::new(total_steps);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA {eta} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        if self.verbosity == VerbosityLevel::Silent {
            pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }

        *self.progress_bar.write().await = Some(pb);

        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.start_time = Some(Instant::now());
        }
    }

    pub async fn update_progress(&self, message: &str) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_message(message.to_string());
        }
    }

    pub async fn advance_progress(&self, steps: u64) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.inc(steps);
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        if let Some(pb) = self.progress_bar.write().await.take() {
            pb.finish_and_clear();
        }

        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.end_time = Some(Instant::now());
        }

        self.info(final_message);
    }

    pub fn record_region(&self, region: &str) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.region = region.to_uppercase();
        }
    }

    pub fn record_output_dir(&self, path: &Path) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.output_dir = path.display().to_string();
        }
    }

    pub fn record_skipped(&self, count: usize) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.queries_skipped = count;
        }
    }

    pub fn record_query_processed(&self) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.queries_processed += 1;
        }
    }

    pub fn record_counts(&self, counts: RunSummary) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.counts = counts;
        }
    }

    pub fn record_checkpoint_stats(&self, writes: usize, failures: usize) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.checkpoint_writes = writes;
            metadata.checkpoint_failures = failures;
        }
    }

    pub fn queries_processed(&self) -> usize {
        self.run_metadata.lock().map(|m| m.queries_processed).unwrap_or(0)
    }

    pub fn print_final_summary(&self) {
        let metadata = match self.run_metadata.lock() {
            Ok(metadata) => metadata.clone(),
            Err(_) => return,
        };

        print!("\x1b[2K\r");
        let _ = io::stdout().flush();

        println!("\n=== RUN SUMMARY ===");
        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            println!("Run Duration: {:.2}s", end.duration_since(start).as_secs_f64());
        }
        if !metadata.region.is_empty() {
            println!("Store Region: {}", metadata.region);
        }
        println!("Names Processed: {}", metadata.queries_processed);
        if metadata.queries_skipped > 0 {
            println!("Names Restored From Checkpoint: {}", metadata.queries_skipped);
        }
        println!("Resolved: {}", metadata.counts.resolved);
        println!("Multiple Results: {}", metadata.counts.ambiguous);
        println!(
            "Not Found: {} (found truncated: {})",
            metadata.counts.not_found, metadata.counts.found_truncated
        );
        println!("Errors: {}", metadata.counts.errored);
        println!("Checkpoint Writes: {}", metadata.checkpoint_writes);
        if metadata.checkpoint_failures > 0 {
            println!("Checkpoint Failures: {}", metadata.checkpoint_failures);
        }
        if !metadata.output_dir.is_empty() {
            println!("Reports Written To: {}", metadata.output_dir);
        }
        println!("===================\n");
    }

    pub fn log_run_start(&self, query_count: usize, throttle: &str, estimate_secs: f64) {
        self.info(&format!("Names to resolve: {}", query_count));
        self.info(&format!("Request pacing: {}", throttle));
        self.info(&format!("Estimated duration: {}", format_duration(estimate_secs)));
    }

    pub fn log_checkpoint(&self, processed: usize, counts: &RunSummary) {
        self.info(&format!("Checkpoint after {} names. {}", processed, counts));
    }

    pub fn log_checkpoint_failed(&self, processed: usize) {
        self.warn(&format!("Checkpoint after {} names could not be written", processed));
    }

    pub fn log_query_result(&self, query: &str, outcome: &str) {
        self.debug(&format!("{}: {}", query, outcome));
    }

    /// Write all buffered console lines to the log file, if one was requested
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(log_file_path) = &self.log_file_path else {
            return Ok(());
        };
        let buffer = match self.log_buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(_) => return Ok(()),
        };

        if let Some(parent) = log_file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;
        for log_entry in &buffer {
            writeln!(file, "{}", log_entry)?;
        }
        file.flush()
    }

    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }

    pub fn get_log_count(&self) -> usize {
        self.log_buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

/// Human readable duration, e.g. "1h 02m 05s"
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
