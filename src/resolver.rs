//! Name resolution with truncation fallback
//!
//! A query is searched as-is first. When the store reports no matches, the
//! last word is dropped and the shorter query is searched, until something
//! matches or no words are left. Every request passes the shared throttle.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{SearchClient, SearchResponse};
use crate::normalizer::truncate_last_token;
use crate::outcome::{
    AmbiguousEntry, ErroredEntry, NotFoundEntry, ResolutionOutcome, ResolvedEntry,
};
use crate::rate_limit::Throttle;

/// Everything one query contributed to the result buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub original_query: String,
    /// Entries in recording order
    pub outcomes: Vec<ResolutionOutcome>,
    /// Search requests issued for this query
    pub attempts: usize,
}

pub struct Resolver {
    client: Arc<dyn SearchClient>,
    throttle: Arc<dyn Throttle>,
    region: String,
}

impl Resolver {
    pub fn new(client: Arc<dyn SearchClient>, throttle: Arc<dyn Throttle>, region: impl Into<String>) -> Self {
        Self {
            client,
            throttle,
            region: region.into(),
        }
    }

    /// Resolve a normalized query.
    ///
    /// Issues at most one request per token of `query`. Transport and decode
    /// failures end the chain immediately with an `Errored` entry.
    pub async fn resolve(&self, query: &str) -> Resolution {
        let original_query = query.to_string();

        if query.trim().is_empty() {
            warn!("Skipping search for empty query");
            return Resolution {
                outcomes: vec![ResolutionOutcome::NotFound(NotFoundEntry {
                    original_query: original_query.clone(),
                    attempted_as: None,
                })],
                original_query,
                attempts: 0,
            };
        }

        let mut current = original_query.clone();
        let mut attempts = 0;

        loop {
            self.throttle.acquire().await;
            attempts += 1;

            let result = self.client.search(&current, &self.region).await;
            self.throttle.release().await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    warn!("Search for '{}' failed: {} ({})", current, e, e.request_context());
                    let outcome = ResolutionOutcome::Errored(ErroredEntry {
                        query: current,
                        original_query: original_query.clone(),
                        request_context: e.request_context().to_string(),
                        error_detail: e.to_string(),
                    });
                    return Resolution {
                        original_query,
                        outcomes: vec![outcome],
                        attempts,
                    };
                }
            };

            if response.total == 0 || response.items.is_empty() {
                match truncate_last_token(&current) {
                    Some(truncated) => {
                        debug!("Truncating '{}' to '{}'", current, truncated);
                        current = truncated;
                        continue;
                    }
                    None => {
                        debug!("No match for '{}'", original_query);
                        return Resolution {
                            outcomes: vec![ResolutionOutcome::NotFound(NotFoundEntry {
                                original_query: original_query.clone(),
                                attempted_as: None,
                            })],
                            original_query,
                            attempts,
                        };
                    }
                }
            }

            let outcomes = classify_match(&original_query, &current, response);
            return Resolution {
                original_query,
                outcomes,
                attempts,
            };
        }
    }
}

/// Bookkeeping entries for a search that returned at least one item.
///
/// The first item is the canonical match. More than one reported match adds
/// an `Ambiguous` entry before the `Resolved` one, and a match under a
/// truncated query adds a `NotFound` entry recording the truncated form.
fn classify_match(original_query: &str, matched_query: &str, response: SearchResponse) -> Vec<ResolutionOutcome> {
    let was_truncated = original_query != matched_query;
    let total = response.total;
    let mut items = response.items.into_iter();
    let primary = match items.next() {
        Some(item) => item,
        None => return Vec::new(),
    };

    let mut outcomes = Vec::with_capacity(3);

    if total > 1 {
        outcomes.push(ResolutionOutcome::Ambiguous(AmbiguousEntry {
            matched_query: matched_query.to_string(),
            total_count: total,
            primary: primary.clone(),
            secondary: items.collect(),
            original_query: original_query.to_string(),
        }));
    }

    outcomes.push(ResolutionOutcome::Resolved(ResolvedEntry {
        item: primary,
        original_query: original_query.to_string(),
        matched_query: matched_query.to_string(),
        was_truncated,
    }));

    if was_truncated {
        outcomes.push(ResolutionOutcome::NotFound(NotFoundEntry {
            original_query: original_query.to_string(),
            attempted_as: Some(matched_query.to_string()),
        }));
    }

    outcomes
}
