//! Name list loading
//!
//! Supports:
//! - Plain text files with one application name per line (default)
//! - CSV files with a "name" column, or names in the first column
//! - JSON files with an array of names or objects with a "name" field
//!
//! Names are normalized on load and deduplicated by their normalized query,
//! keeping the order of first appearance.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::normalizer::normalize;

/// Input format for name list files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    /// One name per line
    Text,
    /// CSV file
    Csv,
    /// JSON file
    Json,
}

impl InputFormat {
    /// Detect format from file extension. Unknown extensions are read as text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("csv") => Self::Csv,
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Read a name list and return the deduplicated normalized queries.
pub fn load_queries(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let names = match InputFormat::from_path(path) {
        InputFormat::Text => parse_text_names(&content),
        InputFormat::Csv => parse_csv_names(&content)?,
        InputFormat::Json => parse_json_names(&content)?,
    };
    debug!("Read {} names from {}", names.len(), path.display());

    Ok(dedup_queries(names.iter().map(String::as_str)))
}

/// Normalize names and drop repeated queries, keeping first occurrences.
pub fn dedup_queries<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();
    for name in names {
        let query = normalize(name);
        if seen.insert(query.clone()) {
            queries.push(query);
        }
    }
    queries
}

/// One raw name per non-blank line
pub fn parse_text_names(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse names from CSV content
///
/// Supports two formats:
/// 1. CSV with a "name" column header
/// 2. Anything else: the first column of every row
pub fn parse_csv_names(content: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let first = match records.next() {
        Some(record) => record.context("Failed to parse CSV record")?,
        None => return Ok(Vec::new()),
    };

    let header_idx = first.iter().position(|h| h.trim().eq_ignore_ascii_case("name"));
    let (column, mut names) = match header_idx {
        Some(idx) => (idx, Vec::new()),
        None => (0, first.get(0).map(|s| vec![s.to_string()]).unwrap_or_default()),
    };

    for result in records {
        let record = result.context("Failed to parse CSV record")?;
        if let Some(name) = record.get(column) {
            names.push(name.to_string());
        }
    }

    Ok(names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect())
}

/// Parse names from JSON content
///
/// Supports three formats:
/// 1. Array of name strings: ["Portal", "Half-Life 2"]
/// 2. Array of objects with "name" field: [{"name": "Portal"}]
/// 3. Object with "names" array: {"names": ["Portal", "Half-Life 2"]}
pub fn parse_json_names(content: &str) -> Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(content).context("Failed to parse JSON content")?;

    let entries = match &value {
        serde_json::Value::Array(arr) => parse_json_array(arr),
        serde_json::Value::Object(obj) => match obj.get("names") {
            Some(serde_json::Value::Array(arr)) => parse_json_array(arr),
            Some(_) => bail!("'names' field must be an array"),
            None => bail!("JSON object must have a 'names' array field"),
        },
        _ => bail!("JSON must be an array of names or an object with a 'names' field"),
    };

    Ok(entries)
}

fn parse_json_array(arr: &[serde_json::Value]) -> Vec<String> {
    arr.iter()
        .filter_map(|item| match item {
            serde_json::Value::String(name) => Some(name.as_str()),
            serde_json::Value::Object(obj) => obj.get("name").and_then(|v| v.as_str()),
            _ => None,
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
