//! assist CLI - Process entry point for the industrial-assist database.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use assist_core::{AssistConfig, AssistError, SchemaVersion};
use assist_store::{
    applied_versions, current_version, initialize, latest_version, ConnectionProvider, DbHandle,
    MIGRATIONS,
};

/// assist - Open, configure and migrate the industrial-assist database
#[derive(Parser)]
#[command(name = "assist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database path (default: per-user application data directory)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Configuration file (default: user config dir, then ./industrial-assist.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the database and apply pending migrations
    Init {
        /// Exit successfully even when initialization fails (run without persistence)
        #[arg(long)]
        allow_degraded: bool,
    },

    /// Show the schema version without migrating
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// List the migration catalog
    Migrations,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    path: PathBuf,
    exists: bool,
    current_version: SchemaVersion,
    latest_version: SchemaVersion,
    applied: Vec<SchemaVersion>,
    pending: Vec<SchemaVersion>,
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(cli: &Cli) -> Result<AssistConfig, AssistError> {
    let mut config = match &cli.config {
        Some(path) => AssistConfig::load(path)?,
        None => AssistConfig::load_default()?,
    };
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Init { allow_degraded } => {
            if !init_database(&config) {
                if allow_degraded {
                    warn!("Continuing without persistence");
                } else {
                    std::process::exit(1);
                }
            }
        }
        Commands::Status { json } => {
            let report = status(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&report);
            }
        }
        Commands::Migrations => {
            list_migrations();
        }
    }

    Ok(())
}

/// Run the startup sequence; false tells the caller persistence is unavailable.
fn init_database(config: &AssistConfig) -> bool {
    let provider = ConnectionProvider::new();
    match initialize(&provider, &config.database) {
        Ok(ready) => {
            if ready.report.is_noop() {
                println!(
                    "Database at {} is current (version {})",
                    ready.handle.path().display(),
                    ready.report.to
                );
            } else {
                println!(
                    "Migrated {} from version {} to {}",
                    ready.handle.path().display(),
                    ready.report.from,
                    ready.report.to
                );
            }
            true
        }
        Err(e) => {
            error!(code = e.error_code(), retryable = e.is_retryable(), "{}", e);
            eprintln!("Error: {}", e);
            false
        }
    }
}

/// Read the schema state without touching the file.
///
/// A missing database is reported as version 0; nothing is created,
/// configured or migrated.
fn status(config: &AssistConfig) -> Result<StatusReport, AssistError> {
    let path = &config.database.path;
    if !path.exists() {
        return Ok(StatusReport {
            path: path.clone(),
            exists: false,
            current_version: 0,
            latest_version: latest_version(MIGRATIONS),
            applied: Vec::new(),
            pending: MIGRATIONS.iter().map(|m| m.version).collect(),
        });
    }

    let handle = DbHandle::open_read_only(path)?;
    let (current, applied) = handle.with_conn(|conn| {
        let current = current_version(conn)?;
        let applied = applied_versions(conn)?
            .into_iter()
            .map(|record| record.version)
            .collect::<Vec<_>>();
        Ok((current, applied))
    })?;

    let pending = MIGRATIONS
        .iter()
        .map(|m| m.version)
        .filter(|v| !applied.contains(v))
        .collect();

    Ok(StatusReport {
        path: handle.path().to_path_buf(),
        exists: true,
        current_version: current,
        latest_version: latest_version(MIGRATIONS),
        applied,
        pending,
    })
}

fn print_status(report: &StatusReport) {
    println!("Database:        {}", report.path.display());
    if !report.exists {
        println!("Not created yet; run `assist init`");
    }
    println!("Current version: {}", report.current_version);
    println!("Latest version:  {}", report.latest_version);
    if report.current_version > report.latest_version {
        println!("Database was written by a newer release");
    } else if report.pending.is_empty() {
        println!("Up to date");
    } else {
        println!(
            "Pending:         {}",
            report
                .pending
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

fn list_migrations() {
    for migration in MIGRATIONS {
        println!(
            "{:>3}  {:<24} {} statement(s)",
            migration.version,
            migration.name,
            migration.statement_count()
        );
    }
}
