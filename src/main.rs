use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;

use catalogresolver::checkpoint::{generate_settings_hash, Checkpoint, Checkpointer, ResumeMode};
use catalogresolver::cli::Cli;
use catalogresolver::config::{self, AppConfig};
use catalogresolver::export::{self, ReportPaths};
use catalogresolver::input::load_queries;
use catalogresolver::logger::{RunLogger, VerbosityLevel};
use catalogresolver::pipeline::{ResolutionRun, RunStatus};
use catalogresolver::rate_limit::throttle_from_config;
use catalogresolver::resolver::Resolver;
use catalogresolver::StoreSearchClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.init {
        match AppConfig::create_default_config_at(&cli.config) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run catalogresolver again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut app_config = match AppConfig::load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => match AppConfig::prompt_create_config(&path) {
            Ok(Some(created_path)) => {
                println!("✅ Created default configuration file at: {}", created_path.display());
                println!("   Edit this file to customize settings, then run catalogresolver again.");
                std::process::exit(0);
            }
            Ok(None) => {
                eprintln!("❌ Configuration file not found at: {}", path.display());
                eprintln!("   Run with --init to create a default configuration file.");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = cli.validate() {
        eprintln!("❌ Invalid arguments: {}", e);
        std::process::exit(1);
    }
    cli.apply_overrides(&mut app_config);
    if let Err(e) = app_config.validate() {
        eprintln!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    init_tracing(cli.verbose);

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    let logger = match &cli.log_file {
        Some(log_file_path) => RunLogger::with_log_file(verbosity, log_file_path),
        None => RunLogger::new(verbosity),
    };

    // First Ctrl+C asks the run to stop and checkpoint; a second one exits immediately
    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            eprintln!("\n⚠️  Force exiting (checkpoint may be incomplete).");
            std::process::exit(130);
        }
        eprintln!("\n⚠️  Interrupt received. Saving checkpoint and exiting...");
    })
    .unwrap_or_else(|e| {
        eprintln!(
            "⚠️  Warning: Failed to set Ctrl-C handler: {}. Interrupt signals may not be handled gracefully.",
            e
        );
    });

    let queries = match load_queries(&app_config.paths.input) {
        Ok(queries) => queries,
        Err(e) => {
            logger.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let throttle = throttle_from_config(&app_config.rate_limit);
    let spacing = app_config.rate_limit.average_spacing();
    logger.log_run_start(
        queries.len(),
        &throttle.describe(),
        spacing.as_secs_f64() * queries.len() as f64,
    );

    let output_dir = app_config.paths.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    let checkpointer = Checkpointer::new(
        output_dir.join(&app_config.output.checkpoint),
        app_config.run.checkpoint_interval,
    );

    let region = app_config.search.region.clone();
    let settings_hash = generate_settings_hash(&app_config.settings_fingerprint());
    let checkpoint = if checkpointer.is_enabled() {
        load_or_create_checkpoint(checkpointer.path(), cli.get_resume_mode(), &region, &settings_hash, &logger)?
    } else {
        logger.info("Checkpointing disabled (checkpoint_interval = 0); every name will be searched.");
        Checkpoint::new(region.clone(), settings_hash.clone())
    };
    let checkpoint_path = checkpointer.path().to_path_buf();
    let checkpointing = checkpointer.is_enabled();

    let client = StoreSearchClient::from_config(&app_config.search)?;
    logger.debug(&format!("Searching {} in region {}", client.endpoint(), region.to_uppercase()));
    let resolver = Resolver::new(Arc::new(client), throttle, region.clone());

    logger.record_region(&region);
    let report = ResolutionRun::new(Arc::new(resolver), checkpointer, app_config.run.concurrency)
        .with_interrupt_flag(Arc::clone(&interrupted))
        .with_logger(logger.clone())
        .run(&queries, checkpoint)
        .await;

    if report.status == RunStatus::Interrupted {
        logger.warn("Run interrupted by user.");
        if checkpointing {
            eprintln!(
                "Progress has been saved to {}. Re-run to resume.",
                checkpoint_path.display()
            );
        } else {
            eprintln!("Checkpointing is disabled; progress was not saved.");
        }
        export_logs(&logger, &cli);
        std::process::exit(130);
    }

    let paths = ReportPaths::new(&output_dir, &app_config.output);
    export::export_all(&report.checkpoint.state, &paths)?;
    logger.record_output_dir(&output_dir);

    export::print_reports(&report.checkpoint.state, &paths, &region);
    println!("\n{}", report.checkpoint.state.summary());

    logger.print_final_summary();
    export_logs(&logger, &cli);

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_or_create_checkpoint(
    path: &Path,
    resume_mode: ResumeMode,
    region: &str,
    settings_hash: &str,
    logger: &RunLogger,
) -> Result<Checkpoint> {
    let fresh = || Checkpoint::new(region.to_string(), settings_hash.to_string());

    if !Checkpoint::exists(path) {
        return Ok(fresh());
    }

    let existing = match Checkpoint::load(path) {
        Ok(existing) => existing,
        Err(e) => {
            logger.warn(&format!("Failed to load existing checkpoint: {:#}. Starting fresh.", e));
            Checkpoint::delete(path)?;
            return Ok(fresh());
        }
    };

    let summary = existing.summary();
    let is_compatible = existing.is_compatible(region, settings_hash);

    match resume_mode {
        ResumeMode::Fresh => {
            println!("🔄 Starting fresh (--no-resume specified).");
            Checkpoint::delete(path)?;
            Ok(fresh())
        }
        _ if !is_compatible => {
            println!("⚠️  Existing checkpoint is incompatible (different region or search settings).");
            println!("   {}", summary);
            println!("   Starting fresh.");
            Checkpoint::delete(path)?;
            Ok(fresh())
        }
        ResumeMode::AutoResume => {
            println!("📋 Resuming from checkpoint:");
            println!("   {}", summary);
            Ok(existing)
        }
        ResumeMode::Prompt if !io::stdin().is_terminal() => {
            println!("📋 Auto-resuming from compatible checkpoint (non-interactive mode)");
            println!("   {}", summary);
            Ok(existing)
        }
        ResumeMode::Prompt => {
            println!();
            println!("Checkpoint found:");
            println!("   {}", summary);
            println!("   Created: {}", existing.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            print!("Resume from checkpoint? [Y/n]: ");
            io::stdout().flush()?;

            let mut answer = String::new();
            io::stdin().read_line(&mut answer)?;
            let answer = answer.trim().to_lowercase();

            if answer.is_empty() || answer == "y" || answer == "yes" {
                println!("✅ Resuming from checkpoint...");
                Ok(existing)
            } else {
                println!("🔄 Starting fresh...");
                Checkpoint::delete(path)?;
                Ok(fresh())
            }
        }
    }
}

fn export_logs(logger: &RunLogger, cli: &Cli) {
    if !logger.is_log_export_enabled() {
        return;
    }
    match logger.export_logs() {
        Ok(()) => {
            if let Some(log_file) = &cli.log_file {
                println!("📄 Execution logs exported to: {}", log_file.display());
                println!("   Total log entries: {}", logger.get_log_count());
            }
        }
        Err(e) => eprintln!("⚠️ Warning: Failed to export logs: {}", e),
    }
}
