// checkpoint.rs - Crash-safe snapshots of a resolution run
//
// Long runs write the four result buckets to a checkpoint file every N
// processed queries. The file is replaced atomically, so a crash or Ctrl+C
// loses at most one interval of work. On restart the run can resume from the
// checkpoint and skip queries that were already resolved.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::outcome::{ResolutionOutcome, ResolutionState, RunSummary};

/// Default checkpoint file name inside the output directory
pub const CHECKPOINT_FILENAME: &str = "checkpoint.json";

/// Current checkpoint format version - bump when making breaking changes
pub const CHECKPOINT_VERSION: u32 = 1;

/// Resolution checkpoint: the result buckets plus what is needed to resume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version for compatibility checking
    pub version: u32,

    /// UTC timestamp when the run started
    pub created_at: DateTime<Utc>,

    /// UTC timestamp of the last save
    pub updated_at: DateTime<Utc>,

    /// Store region used for every search of the run
    pub region: String,

    /// Search settings hash to verify same settings on resume
    pub settings_hash: String,

    /// Original queries whose outcomes are recorded in the buckets
    pub completed_queries: BTreeSet<String>,

    /// The four result buckets, serialized as top-level arrays
    #[serde(flatten)]
    pub state: ResolutionState,
}

impl Checkpoint {
    /// Create an empty checkpoint for a new run
    pub fn new(region: String, settings_hash: String) -> Self {
        let now = Utc::now();
        Self {
            version: CHECKPOINT_VERSION,
            created_at: now,
            updated_at: now,
            region,
            settings_hash,
            completed_queries: BTreeSet::new(),
            state: ResolutionState::new(),
        }
    }

    /// Get the checkpoint file path for a given output directory
    pub fn get_checkpoint_path(output_dir: &Path) -> PathBuf {
        output_dir.join(CHECKPOINT_FILENAME)
    }

    /// Check if a checkpoint file exists at the given path
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Load a checkpoint from the given path.
    /// Returns an error if the checkpoint version is incompatible.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint: {}", path.display()))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            anyhow::bail!(
                "Incompatible checkpoint version: file has version {} but current version is {}. \
                 Delete the checkpoint file to start fresh.",
                checkpoint.version,
                CHECKPOINT_VERSION
            );
        }
        Ok(checkpoint)
    }

    /// Save the checkpoint using an atomic write
    /// (write to a staging file, then rename over the checkpoint)
    pub fn save(&self, path: &Path) -> Result<()> {
        let temp_path = staging_path(path);
        let content = serde_json::to_string_pretty(self).context("Failed to serialize checkpoint")?;

        // Flush the staging file to disk before it replaces the checkpoint
        {
            let mut file = std::fs::File::create(&temp_path)
                .with_context(|| format!("Failed to create {}", temp_path.display()))?;
            std::io::Write::write_all(&mut file, content.as_bytes())?;
            file.sync_all()?;
        }

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to replace checkpoint {}", path.display()))?;

        Ok(())
    }

    /// Delete the checkpoint file
    pub fn delete(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Check if this checkpoint is compatible with the given settings
    pub fn is_compatible(&self, region: &str, settings_hash: &str) -> bool {
        self.region == region && self.settings_hash == settings_hash
    }

    /// Record all outcomes of one query and mark the query as completed
    pub fn record(&mut self, original_query: &str, outcomes: Vec<ResolutionOutcome>) {
        self.state.record_all(outcomes);
        self.completed_queries.insert(original_query.to_string());
    }

    /// Check if a query has been completed
    pub fn is_completed(&self, query: &str) -> bool {
        self.completed_queries.contains(query)
    }

    /// Get summary statistics for the checkpoint
    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            region: self.region.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_count: self.completed_queries.len(),
            counts: self.state.summary(),
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| CHECKPOINT_FILENAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Summary of checkpoint state for display
#[derive(Debug, Clone)]
pub struct CheckpointSummary {
    pub region: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_count: usize,
    pub counts: RunSummary,
}

impl std::fmt::Display for CheckpointSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Checkpoint for region '{}' - {} names processed, {} resolved, {} not found, {} errors (saved {})",
            self.region.to_uppercase(),
            self.completed_count,
            self.counts.resolved,
            self.counts.not_found,
            self.counts.errored,
            self.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Generate a settings hash for checkpoint compatibility checking
pub fn generate_settings_hash(fingerprint: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    fingerprint.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Writes the checkpoint every `interval` processed queries
#[derive(Debug)]
pub struct Checkpointer {
    path: PathBuf,
    interval: usize,
    writes: usize,
    failures: usize,
}

impl Checkpointer {
    /// An interval of 0 disables checkpointing entirely: nothing is ever
    /// written to `path`.
    pub fn new(path: PathBuf, interval: usize) -> Self {
        Self {
            path,
            interval,
            writes: 0,
            failures: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.interval > 0
    }

    /// Successful checkpoint writes so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Failed checkpoint writes so far
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// True when `processed_count` is a positive multiple of the interval
    pub fn is_due(&self, processed_count: usize) -> bool {
        self.interval > 0 && processed_count > 0 && processed_count % self.interval == 0
    }

    /// Write the checkpoint if one is due. Returns whether a checkpoint was
    /// written. Write failures are logged and counted, never propagated.
    pub fn maybe_checkpoint(&mut self, processed_count: usize, checkpoint: &mut Checkpoint) -> bool {
        if !self.is_due(processed_count) {
            return false;
        }
        self.write(checkpoint)
    }

    /// Write the checkpoint outside the cadence (end of run, interruption).
    /// Does nothing when checkpointing is disabled.
    pub fn write(&mut self, checkpoint: &mut Checkpoint) -> bool {
        if !self.is_enabled() {
            return false;
        }
        checkpoint.updated_at = Utc::now();
        match checkpoint.save(&self.path) {
            Ok(()) => {
                self.writes += 1;
                debug!(
                    "Checkpoint saved to {}: {} names completed",
                    self.path.display(),
                    checkpoint.completed_queries.len()
                );
                true
            }
            Err(e) => {
                self.failures += 1;
                warn!("Failed to save checkpoint to {}: {:#}", self.path.display(), e);
                false
            }
        }
    }
}

/// Resume mode options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ResumeMode {
    /// Prompt user if checkpoint exists
    #[default]
    Prompt,
    /// Auto-resume if checkpoint exists
    AutoResume,
    /// Start fresh, ignore any existing checkpoint
    Fresh,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogItem;
    use crate::outcome::{ErroredEntry, NotFoundEntry, ResolvedEntry};
    use tempfile::TempDir;

    fn populated_checkpoint() -> Checkpoint {
        let mut checkpoint = Checkpoint::new("ua".to_string(), "abc123".to_string());
        checkpoint.record(
            "half life 2 deluxe edition",
            vec![
                ResolutionOutcome::Resolved(ResolvedEntry {
                    item: CatalogItem::new("Half-Life 2", 220, 999),
                    original_query: "half life 2 deluxe edition".to_string(),
                    matched_query: "half life 2".to_string(),
                    was_truncated: true,
                }),
                ResolutionOutcome::NotFound(NotFoundEntry {
                    original_query: "half life 2 deluxe edition".to_string(),
                    attempted_as: Some("half life 2".to_string()),
                }),
            ],
        );
        checkpoint.record(
            "brokengame",
            vec![ResolutionOutcome::Errored(ErroredEntry {
                query: "brokengame".to_string(),
                original_query: "brokengame".to_string(),
                request_context: "https://store.example/api?term=brokengame&cc=ua".to_string(),
                error_detail: "unexpected HTTP status 500".to_string(),
            })],
        );
        checkpoint
    }

    #[test]
    fn test_checkpoint_creation() {
        let checkpoint = Checkpoint::new("ua".to_string(), "abc123".to_string());

        assert_eq!(checkpoint.version, CHECKPOINT_VERSION);
        assert_eq!(checkpoint.region, "ua");
        assert!(checkpoint.completed_queries.is_empty());
        assert!(checkpoint.state.is_empty());
    }

    #[test]
    fn test_checkpoint_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = Checkpoint::get_checkpoint_path(temp_dir.path());

        let checkpoint = populated_checkpoint();
        checkpoint.save(&path).unwrap();
        assert!(Checkpoint::exists(&path));

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded, checkpoint);
        assert_eq!(loaded.state.resolved.len(), 1);
        assert_eq!(loaded.state.not_found.len(), 1);
        assert_eq!(loaded.state.errored.len(), 1);
        assert!(loaded.is_completed("brokengame"));
    }

    #[test]
    fn test_checkpoint_file_has_four_named_arrays() {
        let temp_dir = TempDir::new().unwrap();
        let path = Checkpoint::get_checkpoint_path(temp_dir.path());
        populated_checkpoint().save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["resolved"].as_array().unwrap().len(), 1);
        assert_eq!(value["ambiguous"].as_array().unwrap().len(), 0);
        assert_eq!(value["not_found"].as_array().unwrap().len(), 1);
        assert_eq!(value["errored"].as_array().unwrap().len(), 1);
        assert_eq!(value["not_found"][0]["attempted_as"], "half life 2");
    }

    #[test]
    fn test_save_leaves_no_staging_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Checkpoint::get_checkpoint_path(temp_dir.path());
        populated_checkpoint().save(&path).unwrap();

        assert!(!staging_path(&path).exists());
        assert_eq!(staging_path(&path), temp_dir.path().join("checkpoint.json.tmp"));
    }

    #[test]
    fn test_failed_save_keeps_previous_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let path = Checkpoint::get_checkpoint_path(temp_dir.path());

        let first = Checkpoint::new("ua".to_string(), "abc123".to_string());
        first.save(&path).unwrap();

        // A directory in place of the staging file makes the write fail
        std::fs::create_dir(staging_path(&path)).unwrap();
        assert!(populated_checkpoint().save(&path).is_err());

        let loaded = Checkpoint::load(&path).unwrap();
        assert!(loaded.state.is_empty());
    }

    #[test]
    fn test_incompatible_version_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = Checkpoint::get_checkpoint_path(temp_dir.path());

        let mut checkpoint = Checkpoint::new("ua".to_string(), "abc123".to_string());
        checkpoint.version = CHECKPOINT_VERSION + 1;
        checkpoint.save(&path).unwrap();

        let err = Checkpoint::load(&path).unwrap_err();
        assert!(err.to_string().contains("Incompatible checkpoint version"));
    }

    #[test]
    fn test_checkpoint_delete() {
        let temp_dir = TempDir::new().unwrap();
        let path = Checkpoint::get_checkpoint_path(temp_dir.path());

        Checkpoint::new("ua".to_string(), "abc123".to_string()).save(&path).unwrap();
        assert!(Checkpoint::exists(&path));

        Checkpoint::delete(&path).unwrap();
        assert!(!Checkpoint::exists(&path));
        // Deleting twice is fine
        Checkpoint::delete(&path).unwrap();
    }

    #[test]
    fn test_checkpoint_compatibility() {
        let checkpoint = Checkpoint::new("ua".to_string(), "abc123".to_string());

        assert!(checkpoint.is_compatible("ua", "abc123"));
        assert!(!checkpoint.is_compatible("us", "abc123"));
        assert!(!checkpoint.is_compatible("ua", "xyz789"));
    }

    #[test]
    fn test_settings_hash() {
        let hash1 = generate_settings_hash("https://store.example|ua|");
        let hash2 = generate_settings_hash("https://store.example|ua|");
        let hash3 = generate_settings_hash("https://store.example|us|");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }

    #[test]
    fn test_checkpoint_summary() {
        let summary = populated_checkpoint().summary();

        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.counts.resolved, 1);
        assert_eq!(summary.counts.found_truncated, 1);
        assert_eq!(summary.counts.errored, 1);
        assert!(summary.to_string().starts_with("Checkpoint for region 'UA' - 2 names processed"));
    }

    #[test]
    fn test_checkpointer_cadence() {
        let temp_dir = TempDir::new().unwrap();
        let path = Checkpoint::get_checkpoint_path(temp_dir.path());
        let mut checkpointer = Checkpointer::new(path.clone(), 50);
        let mut checkpoint = Checkpoint::new("ua".to_string(), "abc123".to_string());

        for processed in 1..=49 {
            assert!(!checkpointer.maybe_checkpoint(processed, &mut checkpoint));
        }
        assert!(!path.exists());

        checkpoint.record(
            "portal",
            vec![ResolutionOutcome::Resolved(ResolvedEntry {
                item: CatalogItem::new("Portal", 400, 499),
                original_query: "portal".to_string(),
                matched_query: "portal".to_string(),
                was_truncated: false,
            })],
        );
        assert!(checkpointer.maybe_checkpoint(50, &mut checkpoint));
        assert_eq!(checkpointer.writes(), 1);
        let saved = Checkpoint::load(&path).unwrap();
        assert_eq!(saved.state, checkpoint.state);
        assert_eq!(saved.completed_queries, checkpoint.completed_queries);

        assert!(!checkpointer.maybe_checkpoint(51, &mut checkpoint));
        assert!(checkpointer.maybe_checkpoint(100, &mut checkpoint));
        assert_eq!(checkpointer.writes(), 2);
    }

    #[test]
    fn test_checkpointer_disabled_and_zero_count() {
        let temp_dir = TempDir::new().unwrap();
        let path = Checkpoint::get_checkpoint_path(temp_dir.path());
        let mut checkpoint = Checkpoint::new("ua".to_string(), "abc123".to_string());

        let mut disabled = Checkpointer::new(path.clone(), 0);
        assert!(!disabled.is_enabled());
        for processed in 0..200 {
            assert!(!disabled.maybe_checkpoint(processed, &mut checkpoint));
        }
        assert!(!disabled.write(&mut checkpoint));
        assert_eq!(disabled.writes(), 0);
        assert_eq!(disabled.failures(), 0);

        let mut checkpointer = Checkpointer::new(path.clone(), 10);
        assert!(!checkpointer.maybe_checkpoint(0, &mut checkpoint));
        assert_eq!(checkpointer.writes(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_checkpointer_failure_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("checkpoint.json");
        let mut checkpointer = Checkpointer::new(path, 1);
        let mut checkpoint = populated_checkpoint();

        assert!(!checkpointer.maybe_checkpoint(1, &mut checkpoint));
        assert_eq!(checkpointer.failures(), 1);
        assert_eq!(checkpointer.writes(), 0);
        // State is untouched by the failed write
        assert_eq!(checkpoint.state.resolved.len(), 1);
    }

    #[test]
    fn test_resume_mode_default() {
        assert_eq!(ResumeMode::default(), ResumeMode::Prompt);
    }
}
