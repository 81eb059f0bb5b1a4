//! pgshift - chunked MySQL to PostgreSQL migration

use anyhow::{Context, Result};
use clap::Parser;
use pgshift_common::logging::{init_logging, LogConfig, LogLevel};
use pgshift_engine::{
    db, MigrationConfig, MySqlCatalog, Orchestrator, PgLedger, PgTarget, RunContext,
    TracingErrorSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pgshift")]
#[command(author, version, about = "Chunked MySQL to PostgreSQL migration")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "PGSHIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Create the ledger, migrate table schemas and plan data chunks
    Prepare {
        /// Source tables to prepare (all selected tables when omitted)
        #[arg(short, long)]
        table: Vec<String>,
    },

    /// Show ledger progress
    Status {
        /// Source table (whole run when omitted)
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Drop the provenance column of a fully loaded table
    Finalize {
        /// Source table
        #[arg(short, long)]
        table: String,
    },

    /// Drop the ledger table
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("pgshift")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let config = MigrationConfig::load(cli.config.as_deref())?;
    let ctx = Arc::new(RunContext::from_config(&config).context("Failed to build run context")?);

    let source_pool = db::connect_source(&config.source)
        .await
        .context("Failed to connect to source database")?;
    let target_pool = db::connect_target(&config.target)
        .await
        .context("Failed to connect to target database")?;
    db::health_check(&source_pool, &target_pool).await?;

    let orchestrator = Orchestrator::new(
        ctx.clone(),
        Arc::new(MySqlCatalog::new(source_pool, &config.source.database)),
        Arc::new(PgTarget::new(target_pool.clone())),
        Arc::new(PgLedger::for_context(target_pool, &ctx)),
        Arc::new(TracingErrorSink),
    )
    .with_max_concurrent_tables(config.max_concurrent_tables);

    match cli.command {
        Command::Prepare { table } => {
            let tables = if table.is_empty() {
                orchestrator
                    .source_tables()
                    .await?
                    .into_iter()
                    .filter(|t| config.selects_table(t))
                    .collect()
            } else {
                table
            };

            info!(tables = tables.len(), "Preparing tables");
            let report = orchestrator.prepare(&tables).await?;

            for (table, error) in &report.failed {
                warn!(table = %table, error = %error, "Table was not prepared");
            }

            info!(
                prepared = report.prepared.len(),
                failed = report.failed.len(),
                chunks = report.chunks_planned(),
                "Preparation complete"
            );

            if !report.is_success() {
                anyhow::bail!("{} table(s) failed to prepare", report.failed.len());
            }
        },
        Command::Status { table } => {
            let progress = orchestrator.progress(table.as_deref()).await?;
            println!(
                "{}: {} chunk(s), {} started, {} not started ({:.1}%)",
                table.as_deref().unwrap_or("all tables"),
                progress.total,
                progress.started,
                progress.not_started(),
                progress.completion_percentage()
            );
        },
        Command::Finalize { table } => {
            orchestrator.finalize_table(&table).await?;
            info!(table = %table, "Table finalized");
        },
        Command::Cleanup => {
            orchestrator.cleanup().await?;
            info!("Ledger dropped");
        },
    }

    Ok(())
}
