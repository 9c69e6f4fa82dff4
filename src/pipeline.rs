//! Run driver
//!
//! Resolves every pending query through a bounded pool of in-flight
//! resolutions. A single aggregator loop owns the checkpoint: it records each
//! finished resolution, writes the checkpoint on cadence, and stops taking new
//! queries once the interrupt flag is raised.

use futures::stream::{self, StreamExt};
use std::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::checkpoint::{Checkpoint, Checkpointer};
use crate::logger::RunLogger;
use crate::outcome::ResolutionOutcome;
use crate::resolver::{Resolution, Resolver};

/// How often the aggregator re-checks the interrupt flag while resolutions
/// are in flight
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

/// State handed back once the run stops
#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    pub checkpoint: Checkpoint,
    /// Queries resolved during this run
    pub processed: usize,
    /// Queries skipped because the checkpoint already had them
    pub skipped: usize,
    pub checkpoint_writes: usize,
    pub checkpoint_failures: usize,
}

pub struct ResolutionRun {
    resolver: Arc<Resolver>,
    checkpointer: Checkpointer,
    concurrency: usize,
    interrupted: Arc<AtomicBool>,
    logger: Option<RunLogger>,
}

impl ResolutionRun {
    pub fn new(resolver: Arc<Resolver>, checkpointer: Checkpointer, concurrency: usize) -> Self {
        Self {
            resolver,
            checkpointer,
            concurrency: concurrency.max(1),
            interrupted: Arc::new(AtomicBool::new(false)),
            logger: None,
        }
    }

    /// Share an interrupt flag, typically set from a Ctrl+C handler
    pub fn with_interrupt_flag(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    pub fn with_logger(mut self, logger: RunLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Queries not yet recorded in the checkpoint, in input order
    pub fn pending_queries(queries: &[String], checkpoint: &Checkpoint) -> Vec<String> {
        queries
            .iter()
            .filter(|q| !checkpoint.is_completed(q))
            .cloned()
            .collect()
    }

    /// Resolve all pending queries, appending to `checkpoint`.
    ///
    /// The checkpoint is written every `interval` queries resolved in this run
    /// and once more when the run stops with results not yet saved, whether it
    /// completed or was interrupted. A disabled checkpointer never writes.
    /// Resolutions still in flight at interruption are dropped and will be
    /// retried on resume.
    pub async fn run(mut self, queries: &[String], mut checkpoint: Checkpoint) -> RunReport {
        let pending = Self::pending_queries(queries, &checkpoint);
        let skipped = queries.len() - pending.len();
        if skipped > 0 {
            info!("Skipping {} names already recorded in the checkpoint", skipped);
        }

        if let Some(logger) = &self.logger {
            logger.record_skipped(skipped);
            logger.start_progress(pending.len() as u64).await;
        }

        let interrupted = Arc::clone(&self.interrupted);
        let resolver = Arc::clone(&self.resolver);
        let mut resolutions = stream::iter(pending)
            .take_while(move |_| future::ready(!interrupted.load(Ordering::SeqCst)))
            .map(move |query| {
                let resolver = Arc::clone(&resolver);
                async move { resolver.resolve(&query).await }
            })
            .buffer_unordered(self.concurrency);

        let mut processed = 0usize;
        let mut unsaved = false;
        let status = loop {
            if self.is_interrupted() {
                break RunStatus::Interrupted;
            }

            let next = tokio::select! {
                next = resolutions.next() => next,
                _ = wait_for_interrupt(&self.interrupted) => break RunStatus::Interrupted,
            };

            let Some(resolution) = next else {
                break if self.is_interrupted() {
                    RunStatus::Interrupted
                } else {
                    RunStatus::Completed
                };
            };

            processed += 1;
            self.log_resolution(&resolution).await;
            checkpoint.record(&resolution.original_query, resolution.outcomes);
            unsaved = true;

            if self.checkpointer.is_due(processed) {
                let written = self.checkpointer.maybe_checkpoint(processed, &mut checkpoint);
                unsaved = !written;
                if let Some(logger) = &self.logger {
                    if written {
                        logger.log_checkpoint(processed, &checkpoint.state.summary());
                    } else {
                        logger.log_checkpoint_failed(processed);
                    }
                }
            }
        };
        drop(resolutions);

        if unsaved {
            self.checkpointer.write(&mut checkpoint);
        }

        let summary = checkpoint.state.summary();
        if let Some(logger) = &self.logger {
            logger.record_counts(summary);
            logger.record_checkpoint_stats(self.checkpointer.writes(), self.checkpointer.failures());
            let message = match status {
                RunStatus::Completed => format!("Resolution complete. {}", summary),
                RunStatus::Interrupted => format!("Resolution interrupted after {} names. {}", processed, summary),
            };
            logger.finish_progress(&message).await;
        }

        RunReport {
            status,
            checkpoint,
            processed,
            skipped,
            checkpoint_writes: self.checkpointer.writes(),
            checkpoint_failures: self.checkpointer.failures(),
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    async fn log_resolution(&self, resolution: &Resolution) {
        debug!(
            "Resolved '{}' with {} request(s) into {} entries",
            resolution.original_query,
            resolution.attempts,
            resolution.outcomes.len()
        );

        let Some(logger) = &self.logger else {
            return;
        };
        logger.record_query_processed();
        logger.log_query_result(&resolution.original_query, &describe_outcomes(&resolution.outcomes));
        logger.update_progress(&resolution.original_query).await;
        logger.advance_progress(1).await;
    }
}

async fn wait_for_interrupt(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}

fn describe_outcomes(outcomes: &[ResolutionOutcome]) -> String {
    outcomes
        .iter()
        .map(|outcome| match outcome {
            ResolutionOutcome::Resolved(e) if e.was_truncated => {
                format!("resolved as '{}' ({})", e.matched_query, e.item.name)
            }
            ResolutionOutcome::Resolved(e) => format!("resolved ({})", e.item.name),
            ResolutionOutcome::Ambiguous(e) => format!("{} results", e.total_count),
            ResolutionOutcome::NotFound(e) => match &e.attempted_as {
                Some(_) => "not found under original name".to_string(),
                None => "not found".to_string(),
            },
            ResolutionOutcome::Errored(e) => format!("error: {}", e.error_detail),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
