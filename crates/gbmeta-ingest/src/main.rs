//! gbmeta - GenBank metadata loader

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gbmeta_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use gbmeta_ingest::config::SourceKind;
use gbmeta_ingest::loader::TableLoader;
use gbmeta_ingest::orchestrator::Orchestrator;
use gbmeta_ingest::IngestConfig;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "gbmeta")]
#[command(author, version, about = "Extract GenBank record metadata into load-ready tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write daily rolling log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch new or changed division files and append their rows to the master files
    Prepare {
        /// Where division files come from
        #[arg(long, value_parser = parse_source)]
        source: Option<SourceKind>,

        /// Directory of division files (implies --source local)
        #[arg(long)]
        local_dir: Option<PathBuf>,

        /// Directory for master files and the ledger
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Upper bound on the number of workers
        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Replace the database tables with the master files
    Load {
        /// Directory holding the master files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// PostgreSQL connection URL (default: DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,

        /// Release label, for the log only
        #[arg(long)]
        release: Option<String>,
    },
}

fn parse_source(s: &str) -> Result<SourceKind, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let mut log_config = LogConfig::default().with_level(log_level);
    if let Some(dir) = &cli.log_dir {
        log_config = log_config.with_output(LogOutput::Both).with_log_dir(dir);
    }

    // Environment variables take precedence
    let log_config = log_config.clone().apply_env().unwrap_or(log_config);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    if let Err(e) = execute(cli.command).await {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute(command: Command) -> Result<()> {
    let mut config = IngestConfig::from_env()?;

    match command {
        Command::Prepare {
            source,
            local_dir,
            output_dir,
            max_workers,
        } => {
            if let Some(dir) = local_dir {
                config = config.with_local_dir(dir);
            }
            if let Some(source) = source {
                config = config.with_source(source);
            }
            if let Some(dir) = output_dir {
                config = config.with_output_dir(dir);
            }
            if let Some(n) = max_workers {
                config = config.with_max_workers(n);
            }
            prepare(config).await
        },
        Command::Load {
            output_dir,
            database_url,
            release,
        } => {
            if let Some(dir) = output_dir {
                config = config.with_output_dir(dir);
            }
            if let Some(url) = database_url {
                config = config.with_database_url(url);
            }
            load(config, release).await
        },
    }
}

async fn prepare(config: IngestConfig) -> Result<()> {
    config.validate()?;
    let provider = config.provider()?;
    info!("Preparing master files in {} from {}", config.output_dir.display(), provider.name());

    let summary = tokio::task::spawn_blocking(move || {
        Orchestrator::new(config).run(provider.as_ref())
    })
    .await
    .context("Prepare task failed")??;

    println!("{}", summary);
    for failed in &summary.failed {
        println!("  failed: {} ({})", failed.filename, failed.error);
    }
    Ok(())
}

async fn load(config: IngestConfig, release: Option<String>) -> Result<()> {
    config.validate_for_load()?;
    let started = Instant::now();
    match &release {
        Some(release) => info!("Loading release {} from {}", release, config.output_dir.display()),
        None => info!("Loading master files from {}", config.output_dir.display()),
    }

    let loader = TableLoader::connect(&config.database_url).await?;
    loader.migrate().await?;
    let loads = loader.load_all(&config.output_dir).await?;

    let total: u64 = loads.iter().map(|l| l.rows).sum();
    for l in &loads {
        println!("{:<12} {:>12}", gbmeta_ingest::table::TableKind::name(l.table), l.rows);
    }
    println!("{} rows loaded in {:.2}s", total, started.elapsed().as_secs_f64());
    Ok(())
}
