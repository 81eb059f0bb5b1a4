//! pgshift Engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Chunked MySQL to PostgreSQL migration.
//!
//! # Components
//!
//! - **Type translation** ([`type_map`]): MySQL column types to PostgreSQL types
//! - **Schema migration** ([`schema`]): target tables with a hidden provenance column
//! - **Chunk planning** ([`planner`]): row windows persisted in the [`ledger`]
//! - **Consistency** ([`consistency`]): idempotent chunk loading across restarts
//!
//! The row-copy loop is not part of this crate. A loader reads ledger entries,
//! calls [`ConsistencyEnforcer::enforce`] before each chunk, runs
//! [`select_list::chunk_read_sql`] against the source and writes the rows
//! tagged with the entry id.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pgshift_engine::{
//!     db, ledger::PgLedger, source::MySqlCatalog, target::PgTarget, MigrationConfig,
//!     Orchestrator, RunContext, TracingErrorSink,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MigrationConfig::load(None)?;
//!     let ctx = Arc::new(RunContext::from_config(&config)?);
//!     let source = db::connect_source(&config.source).await?;
//!     let target = db::connect_target(&config.target).await?;
//!
//!     let orchestrator = Orchestrator::new(
//!         ctx.clone(),
//!         Arc::new(MySqlCatalog::new(source, &config.source.database)),
//!         Arc::new(PgTarget::new(target.clone())),
//!         Arc::new(PgLedger::for_context(target, &ctx)),
//!         Arc::new(TracingErrorSink),
//!     );
//!
//!     let report = orchestrator.prepare(&["orders".to_string()]).await?;
//!     println!("{} chunks planned", report.chunks_planned());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod consistency;
pub mod context;
pub mod db;
pub mod error;
pub mod ledger;
pub mod naming;
pub mod orchestrator;
pub mod planner;
pub mod schema;
pub mod select_list;
pub mod sink;
pub mod source;
pub mod target;
pub mod type_map;
pub mod types;

pub use config::MigrationConfig;
pub use consistency::ConsistencyEnforcer;
pub use context::RunContext;
pub use error::{MigrationError, MigrationResult};
pub use ledger::{Ledger, PgLedger};
pub use orchestrator::{Orchestrator, PrepareReport};
pub use planner::{compute_chunk_windows, ChunkPlanner, ChunkWindow};
pub use schema::SchemaMigrator;
pub use sink::{ErrorSink, TracingErrorSink};
pub use source::{MySqlCatalog, SourceCatalog};
pub use target::{PgTarget, TargetDatabase};
pub use type_map::{translate, TypeRule, TypeRuleTable};
pub use types::{
    ChunkPlan, ColumnDescriptor, LedgerEntry, LedgerProgress, TableDescriptor, TableStats,
};
