//! Store catalog search
//!
//! The resolver only needs "search(query, region) -> ranked items". This module
//! defines that boundary (`SearchClient`), the structured response types, and
//! `StoreSearchClient`, the HTTP implementation for the store search endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::SearchConfig;

/// A single catalog entry returned by the store search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub id: u64,
    /// Undiscounted price in minor currency units (cents). Zero for free or
    /// unpriced items.
    pub price_minor_units: u64,
}

impl CatalogItem {
    pub fn new(name: impl Into<String>, id: u64, price_minor_units: u64) -> Self {
        Self {
            name: name.into(),
            id,
            price_minor_units,
        }
    }

    /// Price formatted in major units with two decimals, e.g. `9.99`.
    pub fn display_price(&self) -> String {
        format!("{}.{:02}", self.price_minor_units / 100, self.price_minor_units % 100)
    }
}

/// Result set for one search request, ranked by relevance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResponse {
    /// Number of matches the store reports. May exceed `items.len()`.
    pub total: u64,
    pub items: Vec<CatalogItem>,
}

impl SearchResponse {
    pub fn new(total: u64, items: Vec<CatalogItem>) -> Self {
        Self { total, items }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Failure of a single search request. Every variant carries the request
/// context (the full request URL) so errored queries can be reported with it.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("request failed: {source}")]
    Transport {
        request_context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status}")]
    Status { request_context: String, status: u16 },

    #[error("malformed response body: {message}")]
    Decode {
        request_context: String,
        message: String,
    },
}

impl SearchError {
    pub fn request_context(&self) -> &str {
        match self {
            SearchError::Transport { request_context, .. }
            | SearchError::Status { request_context, .. }
            | SearchError::Decode { request_context, .. } => request_context,
        }
    }
}

/// Catalog search boundary used by the resolver.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, region: &str) -> Result<SearchResponse, SearchError>;
}

// Wire format of the store search endpoint.
#[derive(Debug, Deserialize)]
struct StoreSearchDto {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    items: Vec<StoreItemDto>,
}

#[derive(Debug, Deserialize)]
struct StoreItemDto {
    name: String,
    id: u64,
    #[serde(default)]
    price: Option<StorePriceDto>,
}

#[derive(Debug, Deserialize)]
struct StorePriceDto {
    #[serde(default)]
    initial: u64,
}

impl From<StoreItemDto> for CatalogItem {
    fn from(dto: StoreItemDto) -> Self {
        CatalogItem {
            name: dto.name,
            id: dto.id,
            price_minor_units: dto.price.map(|p| p.initial).unwrap_or(0),
        }
    }
}

/// Parse a store search response body.
pub fn parse_search_body(body: &str) -> Result<SearchResponse, String> {
    let dto: StoreSearchDto = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if dto.total > 0 && dto.items.is_empty() {
        return Err(format!("response reports {} matches but contains no items", dto.total));
    }
    Ok(SearchResponse {
        total: dto.total,
        items: dto.items.into_iter().map(CatalogItem::from).collect(),
    })
}

/// HTTP client for the store search endpoint
/// (`GET <endpoint>?term=<query>&cc=<region>`).
#[derive(Debug, Clone)]
pub struct StoreSearchClient {
    client: reqwest::Client,
    endpoint: String,
    language: Option<String>,
}

impl StoreSearchClient {
    pub fn new(endpoint: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client for store search")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            language: None,
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let mut client = Self::new(
            config.endpoint.clone(),
            &config.user_agent,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        client.language = config.language.clone();
        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchClient for StoreSearchClient {
    async fn search(&self, query: &str, region: &str) -> Result<SearchResponse, SearchError> {
        let mut params = vec![("term", query), ("cc", region)];
        if let Some(language) = &self.language {
            params.push(("l", language.as_str()));
        }

        let request = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .build()
            .map_err(|source| SearchError::Transport {
                request_context: format!("{}?term={}&cc={}", self.endpoint, query, region),
                source,
            })?;
        let request_context = request.url().to_string();
        debug!("GET {}", request_context);

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|source| SearchError::Transport {
                request_context: request_context.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                request_context,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| SearchError::Transport {
            request_context: request_context.clone(),
            source,
        })?;

        parse_search_body(&body).map_err(|message| SearchError::Decode {
            request_context,
            message,
        })
    }
}
