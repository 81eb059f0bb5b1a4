//! Run orchestration
//!
//! Prepares tables for loading (target schema plus ledger entries), finalizes
//! completed tables and reports ledger progress. Failures scoped to one table
//! are logged and collected; the other tables keep going.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::config::DEFAULT_MAX_CONCURRENT_TABLES;
use crate::consistency::ConsistencyEnforcer;
use crate::context::RunContext;
use crate::error::{MigrationError, MigrationResult};
use crate::ledger::Ledger;
use crate::planner::ChunkPlanner;
use crate::schema::SchemaMigrator;
use crate::sink::ErrorSink;
use crate::source::SourceCatalog;
use crate::target::TargetDatabase;
use crate::types::{ChunkPlan, LedgerProgress};

/// Outcome of [`Orchestrator::prepare`]
#[derive(Debug, Default)]
pub struct PrepareReport {
    /// Source tables prepared, with the number of chunks planned in this run
    pub prepared: Vec<(String, usize)>,
    pub failed: Vec<(String, MigrationError)>,
}

impl PrepareReport {
    pub fn chunks_planned(&self) -> usize {
        self.prepared.iter().map(|(_, chunks)| chunks).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Orchestrator {
    ctx: Arc<RunContext>,
    source: Arc<dyn SourceCatalog>,
    ledger: Arc<dyn Ledger>,
    errors: Arc<dyn ErrorSink>,
    schema: SchemaMigrator,
    planner: ChunkPlanner,
    enforcer: ConsistencyEnforcer,
    max_concurrent_tables: usize,
}

impl Orchestrator {
    pub fn new(
        ctx: Arc<RunContext>,
        source: Arc<dyn SourceCatalog>,
        target: Arc<dyn TargetDatabase>,
        ledger: Arc<dyn Ledger>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            schema: SchemaMigrator::new(ctx.clone(), source.clone(), target.clone(), errors.clone()),
            planner: ChunkPlanner::new(ctx.clone(), source.clone(), ledger.clone(), errors.clone()),
            enforcer: ConsistencyEnforcer::new(ctx.clone(), ledger.clone(), target),
            ctx,
            source,
            ledger,
            errors,
            max_concurrent_tables: DEFAULT_MAX_CONCURRENT_TABLES,
        }
    }

    pub fn with_max_concurrent_tables(mut self, max: usize) -> Self {
        self.max_concurrent_tables = max.max(1);
        self
    }

    /// Enforcer for loaders driving chunks of this run
    pub fn enforcer(&self) -> &ConsistencyEnforcer {
        &self.enforcer
    }

    /// All base tables of the source database
    pub async fn source_tables(&self) -> MigrationResult<Vec<String>> {
        self.source
            .tables()
            .await
            .map_err(|e| MigrationError::introspection(&self.ctx.source_database, e))
    }

    /// Create the ledger, then migrate the schema of and plan every table
    ///
    /// Tables that already have chunks in the ledger keep their target schema;
    /// only the windows an earlier run failed to persist are planned.
    #[instrument(skip(self, tables), fields(tables = tables.len()))]
    pub async fn prepare(&self, tables: &[String]) -> MigrationResult<PrepareReport> {
        self.ledger.create().await?;
        let planned = self.ledger.planned_tables().await?;

        if !planned.is_empty() {
            info!(tables = planned.len(), "Resuming run, some tables are already planned");
        }

        let results: Vec<(String, MigrationResult<usize>)> = stream::iter(tables.iter())
            .map(|table| {
                let planned = &planned;
                async move { (table.clone(), self.prepare_table(table, planned).await) }
            })
            .buffer_unordered(self.max_concurrent_tables)
            .collect()
            .await;

        let mut report = PrepareReport::default();
        for (table, result) in results {
            match result {
                Ok(chunks) => report.prepared.push((table, chunks)),
                Err(e) => {
                    error!(table = %table, error = %e, "Failed to prepare table");
                    self.errors
                        .record_error(&format!("Failed to prepare table `{}`: {}", table, e), None);
                    report.failed.push((table, e));
                },
            }
        }

        info!(
            prepared = report.prepared.len(),
            failed = report.failed.len(),
            chunks = report.chunks_planned(),
            "Preparation finished"
        );

        Ok(report)
    }

    async fn prepare_table(&self, source_table: &str, planned: &HashSet<String>) -> MigrationResult<usize> {
        let target_table = self.ctx.target_table_name(source_table);

        if !planned.contains(&target_table) {
            let table = self.schema.migrate_schema(source_table).await?;
            return self.planner.plan_chunks(&table, &[]).await;
        }

        let existing: Vec<ChunkPlan> = self
            .ledger
            .entries(Some(&target_table))
            .await?
            .into_iter()
            .map(|entry| entry.plan)
            .collect();

        let table = self.schema.describe_table(source_table).await?;
        self.planner.plan_chunks(&table, &existing).await
    }

    /// Drop the provenance column of a table whose chunks are all loaded
    ///
    /// Fails with [`MigrationError::ChunksOutstanding`] and leaves the column
    /// in place while any chunk of the table is not confirmed as loaded. A
    /// ledger or probe failure during the check is returned as is and nothing
    /// is dropped.
    #[instrument(skip(self))]
    pub async fn finalize_table(&self, source_table: &str) -> MigrationResult<()> {
        let table = self.ctx.describe(source_table, Vec::new());
        let entries = self.ledger.entries(Some(&table.target_name)).await?;

        let mut outstanding = 0;
        for entry in &entries {
            if !self.enforcer.confirm_loaded(entry).await? {
                outstanding += 1;
            }
        }

        if outstanding > 0 {
            warn!(table = %table.target_name, outstanding, "Table has chunks that are not loaded yet");
            return Err(MigrationError::ChunksOutstanding {
                table: table.target_name,
                outstanding,
            });
        }

        self.enforcer.drop_provenance_column(&table).await?;
        info!(table = %table.target_name, chunks = entries.len(), "Table finalized");
        Ok(())
    }

    /// Ledger progress for one source table, or the whole run
    pub async fn progress(&self, source_table: Option<&str>) -> MigrationResult<LedgerProgress> {
        let target_table = source_table.map(|t| self.ctx.target_table_name(t));
        self.ledger.progress(target_table.as_deref()).await
    }

    /// Drop the ledger table
    pub async fn cleanup(&self) -> MigrationResult<()> {
        self.ledger.drop_table().await
    }
}
