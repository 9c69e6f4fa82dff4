//! Run reports
//!
//! Renders the four result buckets to the report files (and to stdout) once
//! a run has completed.

use anyhow::{Context, Result};
use csv::Writer;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::OutputConfig;
use crate::outcome::{AmbiguousEntry, ErroredEntry, NotFoundEntry, ResolutionState, ResolvedEntry};

/// Paths of the report files written at the end of a run
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub resolved: PathBuf,
    pub not_found: PathBuf,
    pub ambiguous: PathBuf,
    pub errors: PathBuf,
    pub resolved_csv: Option<PathBuf>,
}

impl ReportPaths {
    pub fn new(output_dir: &Path, output: &OutputConfig) -> Self {
        Self {
            resolved: output_dir.join(&output.resolved),
            not_found: output_dir.join(&output.not_found),
            ambiguous: output_dir.join(&output.ambiguous),
            errors: output_dir.join(&output.errors),
            resolved_csv: output.resolved_csv.as_ref().map(|name| output_dir.join(name)),
        }
    }
}

pub fn format_resolved_line(entry: &ResolvedEntry) -> String {
    format!(
        "{} ({}) - {} (Original appname: {})",
        entry.item.name,
        entry.item.id,
        entry.item.display_price(),
        entry.original_query
    )
}

pub fn format_not_found_line(entry: &NotFoundEntry) -> String {
    match &entry.attempted_as {
        Some(found_as) => format!("{} (Found as: {})", entry.original_query, found_as),
        None => format!("{} (Not found)", entry.original_query),
    }
}

/// The failing request is listed under the name from the input. When the
/// failure happened on a truncated query, that query is listed as well.
pub fn format_error_block(entry: &ErroredEntry) -> String {
    let mut block = format!("App Name: {}\n", entry.original_query);
    if entry.query != entry.original_query {
        block.push_str(&format!("Searched as: {}\n", entry.query));
    }
    block.push_str(&format!(
        "Request URL: {}\nException: {}\n",
        entry.request_context, entry.error_detail
    ));
    block
}

pub fn format_ambiguous_line(entry: &AmbiguousEntry) -> String {
    if entry.original_query != entry.matched_query {
        format!(
            "{}: {} results (Original appname: {})",
            entry.matched_query, entry.total_count, entry.original_query
        )
    } else {
        format!("{}: {} results", entry.matched_query, entry.total_count)
    }
}

/// Resolved items sorted by price (most expensive first), one per line
pub fn export_resolved(state: &ResolutionState, output_path: &Path) -> Result<()> {
    debug!("Exporting {} resolved entries to {}", state.resolved.len(), output_path.display());

    let mut file = create_report(output_path)?;
    for entry in state.resolved_by_price() {
        writeln!(file, "{}", format_resolved_line(entry))?;
    }
    file.flush()?;

    info!("Exported {} resolved entries to {}", state.resolved.len(), output_path.display());
    Ok(())
}

/// Names not found under their original spelling
pub fn export_not_found(state: &ResolutionState, output_path: &Path) -> Result<()> {
    let mut file = create_report(output_path)?;
    for entry in &state.not_found {
        writeln!(file, "{}", format_not_found_line(entry))?;
    }
    file.flush()?;

    info!("Exported {} not found entries to {}", state.not_found.len(), output_path.display());
    Ok(())
}

/// Ambiguous matches as a pretty-printed JSON array
pub fn export_ambiguous(state: &ResolutionState, output_path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(&state.ambiguous)?;

    let mut file = create_report(output_path)?;
    file.write_all(json_string.as_bytes())?;
    file.flush()?;

    info!("Exported {} ambiguous entries to {}", state.ambiguous.len(), output_path.display());
    Ok(())
}

/// Failed requests with their request URL and error detail
pub fn export_errors(state: &ResolutionState, output_path: &Path) -> Result<()> {
    let mut file = create_report(output_path)?;
    for entry in &state.errored {
        writeln!(file, "{}", format_error_block(entry))?;
    }
    file.flush()?;

    info!("Exported {} errors to {}", state.errored.len(), output_path.display());
    Ok(())
}

/// Resolved items as CSV, in the same order as the text report
pub fn export_resolved_csv(state: &ResolutionState, output_path: &Path) -> Result<()> {
    let file = create_report(output_path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record([
        "Name",
        "Id",
        "Price",
        "Price (minor units)",
        "Original Query",
        "Matched Query",
        "Truncated",
    ])?;

    for entry in state.resolved_by_price() {
        wtr.write_record([
            entry.item.name.clone(),
            entry.item.id.to_string(),
            entry.item.display_price(),
            entry.item.price_minor_units.to_string(),
            entry.original_query.clone(),
            entry.matched_query.clone(),
            if entry.was_truncated { "yes" } else { "no" }.to_string(),
        ])?;
    }

    wtr.flush()?;
    info!("Exported {} resolved entries to CSV: {}", state.resolved.len(), output_path.display());
    Ok(())
}

/// Write every report for the final state
pub fn export_all(state: &ResolutionState, paths: &ReportPaths) -> Result<()> {
    export_errors(state, &paths.errors)?;
    export_not_found(state, &paths.not_found)?;
    export_ambiguous(state, &paths.ambiguous)?;
    export_resolved(state, &paths.resolved)?;
    if let Some(csv_path) = &paths.resolved_csv {
        export_resolved_csv(state, csv_path)?;
    }
    Ok(())
}

fn create_report(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create report: {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Print the report contents to stdout, mirroring the files
pub fn print_reports(state: &ResolutionState, paths: &ReportPaths, region: &str) {
    if !state.errored.is_empty() {
        println!("\nErrors (written to {}):", paths.errors.display());
        for entry in &state.errored {
            println!("{}", format_error_block(entry));
        }
    }

    if !state.not_found.is_empty() {
        println!("\nApps not found (written to {}):", paths.not_found.display());
        for entry in &state.not_found {
            println!("{}", format_not_found_line(entry));
        }
    }

    if !state.ambiguous.is_empty() {
        println!("\nMultiple results found for apps (JSON written to {}):", paths.ambiguous.display());
        for entry in &state.ambiguous {
            println!("{}", format_ambiguous_line(entry));
        }
    }

    println!(
        "\nApps sorted by price in {} store (written to {}):",
        region.to_uppercase(),
        paths.resolved.display()
    );
    for entry in state.resolved_by_price() {
        println!("{}", format_resolved_line(entry));
    }
}
