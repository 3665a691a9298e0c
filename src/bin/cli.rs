//! Glucose CLI
//!
//! Command-line interface for batch operations against the record store:
//! - Load a directory of CSV exports
//! - Export readings as CSV
//! - Show storage statistics
//! - Generate a config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glucose::config::{generate_default_config, Config};
use glucose::export::LevelCsvWriter;
use glucose::ingest::{BadTimestampPolicy, CsvIngestor};
use glucose::query::ListParams;
use glucose::storage::{LevelStore, StorageError};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "glucose-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Load, inspect and export glucose readings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides the config)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load every CSV export in a directory, one user per file
    LoadData {
        /// Directory of exports (default: ingest.data_dir from the config)
        #[arg(short, long)]
        data_path: Option<PathBuf>,
        /// Files processed concurrently
        #[arg(short, long)]
        workers: Option<usize>,
        /// Skip rows with unparseable timestamps instead of failing the file
        #[arg(long)]
        skip_bad_rows: bool,
    },

    /// Export readings as CSV, ordered by timestamp
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only this user's readings
        #[arg(short, long)]
        user_id: Option<String>,
        /// Inclusive lower bound (ISO 8601, epoch ms, "now-7d", ...)
        #[arg(long)]
        start: Option<String>,
        /// Inclusive upper bound
        #[arg(long)]
        stop: Option<String>,
        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<String>,
    },

    /// Show record counts and covered time span
    Stats,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_ref());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default()?,
    };
    if let Some(database) = cli.database {
        config.storage.database_path = database;
    }

    glucose::logging::init(&config.logging);

    let store = LevelStore::open(&config.storage).with_context(|| {
        format!(
            "failed to open database {}",
            config.storage.database_path.display()
        )
    })?;
    let store = Arc::new(store);

    match cli.command {
        Commands::LoadData {
            data_path,
            workers,
            skip_bad_rows,
        } => {
            let Some(dir) = data_path.or_else(|| config.ingest.data_dir.clone()) else {
                bail!("no data directory given: pass --data-path or set ingest.data_dir");
            };

            let mut ingest_config = config.ingest.clone();
            if let Some(workers) = workers {
                ingest_config.workers = workers;
            }
            if skip_bad_rows {
                ingest_config.on_bad_timestamp = BadTimestampPolicy::SkipRow;
            }

            let ingestor = Arc::new(CsvIngestor::new(ingest_config));
            let report = ingestor
                .ingest_dir(store, &dir)
                .await
                .with_context(|| format!("failed to load {}", dir.display()))?;

            for error in report.errors() {
                eprintln!("Error processing {}: {}", error.file, error.message);
            }
            println!(
                "Successfully processed {} CSV files",
                report.files_processed()
            );
            tracing::info!("{}", report);
        }

        Commands::Export {
            output,
            user_id,
            start,
            stop,
            limit,
        } => {
            let filter = ListParams {
                user_id,
                start,
                stop,
                limit,
            }
            .to_filter();

            let target = output.clone();
            let rows = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
                let out: Box<dyn Write> = match &target {
                    Some(path) => Box::new(File::create(path).with_context(|| {
                        format!("failed to create {}", path.display())
                    })?),
                    None => Box::new(io::stdout().lock()),
                };

                let mut writer = LevelCsvWriter::new(BufWriter::new(out))?;
                store.scan(&filter, |level| {
                    writer
                        .write(&level)
                        .map_err(|e| StorageError::Io(e.into()))
                })?;
                let rows = writer.rows();
                writer.finish()?.flush()?;
                Ok(rows)
            })
            .await??;

            if let Some(path) = output {
                eprintln!("Exported {} readings to {:?}", rows, path);
            }
        }

        Commands::Stats => {
            let stats = store.stats()?;
            println!("Database:  {:?}", config.storage.database_path);
            println!("Records:   {}", stats.total_records);
            println!("Users:     {}", stats.users);
            if let (Some(earliest), Some(latest)) = (stats.earliest, stats.latest) {
                println!("Earliest:  {}", earliest.to_rfc3339());
                println!("Latest:    {}", latest.to_rfc3339());
            }
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn write_default_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let config = generate_default_config();

    match output {
        Some(path) => {
            // Create parent directory if needed
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &config)?;
            println!("Config written to {:?}", path);
        }
        None => {
            print!("{}", config);
        }
    }

    Ok(())
}
