// Fiscal Normalizer CLI
//
// Usage:
//   fiscal-normalizer import --csv <file> --db <file> [--delimiter ';']
//   fiscal-normalizer normalize --db <file> [--config <toml>] [--json]
//   fiscal-normalizer counts --db <file>

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fiscal_normalizer::{
    insert_expenses, load_csv, table_counts, NormalizerConfig, Pipeline,
    RunReport, SqliteStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "fiscal-normalizer",
    version,
    about = "Normalizes parliamentary expense records into a relational model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a raw expense CSV into the source table
    Import {
        /// Path to the CSV export
        #[arg(long)]
        csv: PathBuf,
        /// Path to SQLite database file
        #[arg(long)]
        db: PathBuf,
        /// Field delimiter of the export
        #[arg(long, default_value_t = ';')]
        delimiter: char,
    },
    /// Run the five normalization stages
    Normalize {
        /// Path to SQLite database file
        #[arg(long)]
        db: PathBuf,
        /// Optional TOML config
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show row counts per table
    Counts {
        /// Path to SQLite database file
        #[arg(long)]
        db: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fiscal_normalizer=info"));

    // stdout is reserved for reports
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import { csv, db, delimiter } => run_import(csv, db, delimiter),
        Commands::Normalize { db, config, json } => run_normalize(db, config, json),
        Commands::Counts { db } => run_counts(db),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_import(csv_path: PathBuf, db_path: PathBuf, delimiter: char) -> Result<()> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {:?}", delimiter);
    }

    info!("📂 Loading {}", csv_path.display());
    let records = load_csv(&csv_path, delimiter as u8)
        .with_context(|| format!("Failed to load CSV {}", csv_path.display()))?;
    info!("Loaded {} records from CSV", records.len());

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let inserted = insert_expenses(store.connection(), &records)
        .context("Failed to insert expense records")?;

    println!("✓ Imported {} new records", inserted);
    println!("✓ Duplicates skipped: {}", records.len() - inserted);
    Ok(())
}

fn run_normalize(db_path: PathBuf, config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = match config_path {
        Some(path) => NormalizerConfig::load(&path)?,
        None => NormalizerConfig::default(),
    };

    let mut store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let report = Pipeline::new(&mut store, config)
        .run()
        .context("Normalization aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run_counts(db_path: PathBuf) -> Result<()> {
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    for (table, count) in table_counts(store.connection())? {
        println!("{:<20} {:>10}", table, count);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for stage in &report.stages {
        println!(
            "{:<18} read {:>8}  persisted {:>8}  excluded {:>6}  skipped {:>6}  ({} ms)",
            stage.stage.as_str(), stage.read, stage.persisted, stage.excluded, stage.skipped, stage.elapsed_ms
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for skipped in &report.skipped_records {
        println!("⚠️  record {} skipped: {}", skipped.index, skipped.reason);
    }
    println!("✅ Normalization finished in {} ms", report.elapsed_ms);
}
