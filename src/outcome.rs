//! Resolution outcomes and the run-wide result buckets.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::CatalogItem;

/// A query that matched a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub item: CatalogItem,
    /// The user-facing query the run started from
    pub original_query: String,
    /// The query that produced the match (differs from `original_query`
    /// after truncation)
    pub matched_query: String,
    pub was_truncated: bool,
}

/// A query whose search returned more than one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousEntry {
    pub matched_query: String,
    pub total_count: u64,
    pub primary: CatalogItem,
    pub secondary: Vec<CatalogItem>,
    pub original_query: String,
}

/// A query that was not found under its original name.
///
/// `attempted_as` is set when a truncated form of the query matched, and
/// records that truncated form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundEntry {
    pub original_query: String,
    pub attempted_as: Option<String>,
}

/// A query whose search request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErroredEntry {
    /// The query being searched when the request failed
    pub query: String,
    pub original_query: String,
    pub request_context: String,
    pub error_detail: String,
}

/// One bookkeeping entry produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved(ResolvedEntry),
    Ambiguous(AmbiguousEntry),
    NotFound(NotFoundEntry),
    Errored(ErroredEntry),
}

impl ResolutionOutcome {
    pub fn original_query(&self) -> &str {
        match self {
            ResolutionOutcome::Resolved(e) => &e.original_query,
            ResolutionOutcome::Ambiguous(e) => &e.original_query,
            ResolutionOutcome::NotFound(e) => &e.original_query,
            ResolutionOutcome::Errored(e) => &e.original_query,
        }
    }
}

/// The four result buckets accumulated over a run.
///
/// Buckets are append-only. A single query may contribute to several buckets:
/// an ambiguous match is also recorded as resolved, and a match found after
/// truncation is also recorded as not found under the original name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionState {
    #[serde(default)]
    pub resolved: Vec<ResolvedEntry>,
    #[serde(default)]
    pub ambiguous: Vec<AmbiguousEntry>,
    #[serde(default)]
    pub not_found: Vec<NotFoundEntry>,
    #[serde(default)]
    pub errored: Vec<ErroredEntry>,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome to its bucket.
    pub fn record(&mut self, outcome: ResolutionOutcome) {
        match outcome {
            ResolutionOutcome::Resolved(entry) => self.resolved.push(entry),
            ResolutionOutcome::Ambiguous(entry) => self.ambiguous.push(entry),
            ResolutionOutcome::NotFound(entry) => self.not_found.push(entry),
            ResolutionOutcome::Errored(entry) => self.errored.push(entry),
        }
    }

    pub fn record_all(&mut self, outcomes: impl IntoIterator<Item = ResolutionOutcome>) {
        for outcome in outcomes {
            self.record(outcome);
        }
    }

    /// Total number of entries across all buckets.
    pub fn len(&self) -> usize {
        self.resolved.len() + self.ambiguous.len() + self.not_found.len() + self.errored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Original queries that have at least one entry in any bucket.
    pub fn original_queries(&self) -> HashSet<&str> {
        self.resolved
            .iter()
            .map(|e| e.original_query.as_str())
            .chain(self.ambiguous.iter().map(|e| e.original_query.as_str()))
            .chain(self.not_found.iter().map(|e| e.original_query.as_str()))
            .chain(self.errored.iter().map(|e| e.original_query.as_str()))
            .collect()
    }

    /// Resolved entries sorted by price, most expensive first. Ties keep
    /// their recording order.
    pub fn resolved_by_price(&self) -> Vec<&ResolvedEntry> {
        let mut entries: Vec<&ResolvedEntry> = self.resolved.iter().collect();
        entries.sort_by(|a, b| b.item.price_minor_units.cmp(&a.item.price_minor_units));
        entries
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            resolved: self.resolved.len(),
            ambiguous: self.ambiguous.len(),
            not_found: self.not_found.len(),
            found_truncated: self.not_found.iter().filter(|e| e.attempted_as.is_some()).count(),
            errored: self.errored.len(),
        }
    }
}

/// Bucket counters for progress and summary output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub resolved: usize,
    pub ambiguous: usize,
    pub not_found: usize,
    pub found_truncated: usize,
    pub errored: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Successful results: {} (Multiple: {}) / Errors: {} / Not found: {} (Found truncated: {})",
            self.resolved, self.ambiguous, self.errored, self.not_found, self.found_truncated
        )
    }
}
