//! Idempotent chunk loading
//!
//! A loader calls [`ConsistencyEnforcer::enforce`] before writing a chunk. A
//! chunk moves from not started to started when a loader picks it up; a
//! started chunk is either loaded (rows tagged with its id exist in the
//! target) or was interrupted before any row was committed.
//!
//! Probe failures never surface as errors from [`ConsistencyEnforcer::enforce`].
//! A failed `is_started` read counts as "not started", so the chunk is
//! reloaded. A failed existence probe counts as "loaded", so the chunk is
//! skipped rather than risk duplicating rows. Finalization uses the strict
//! [`ConsistencyEnforcer::confirm_loaded`] instead.

use std::sync::Arc;
use tracing::instrument;

use crate::context::RunContext;
use crate::error::{MigrationError, MigrationResult};
use crate::ledger::Ledger;
use crate::naming::{provenance_column_name, qualified_pg, quote_pg_ident};
use crate::target::TargetDatabase;
use crate::types::{LedgerEntry, TableDescriptor};

pub struct ConsistencyEnforcer {
    ctx: Arc<RunContext>,
    ledger: Arc<dyn Ledger>,
    target: Arc<dyn TargetDatabase>,
}

impl ConsistencyEnforcer {
    pub fn new(ctx: Arc<RunContext>, ledger: Arc<dyn Ledger>, target: Arc<dyn TargetDatabase>) -> Self {
        Self { ctx, ledger, target }
    }

    async fn probe_chunk_rows(&self, entry: &LedgerEntry) -> Result<bool, sqlx::Error> {
        let provenance_column = provenance_column_name(&self.ctx.schema, &entry.plan.source_table_name);

        self.target
            .chunk_rows_exist(&self.ctx.schema, &entry.plan.table_name, &provenance_column, entry.id)
            .await
    }

    /// Whether the rows of this chunk are already in the target
    pub async fn has_been_loaded(&self, entry: &LedgerEntry) -> bool {
        let started = match self.ledger.is_started(entry.id).await {
            Ok(started) => started,
            Err(e) => {
                tracing::warn!(chunk_id = entry.id, error = %e, "Could not read chunk state, assuming not started");
                false
            },
        };

        if !started {
            return false;
        }

        match self.probe_chunk_rows(entry).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(
                    chunk_id = entry.id,
                    table = %entry.plan.table_name,
                    error = %e,
                    "Could not probe target for chunk rows, assuming loaded"
                );
                true
            },
        }
    }

    /// Whether the chunk is started and its rows are in the target
    ///
    /// Unlike [`Self::has_been_loaded`] nothing is assumed: a failed ledger
    /// read or existence probe is returned as an error.
    pub async fn confirm_loaded(&self, entry: &LedgerEntry) -> MigrationResult<bool> {
        if !self.ledger.is_started(entry.id).await? {
            return Ok(false);
        }

        Ok(self.probe_chunk_rows(entry).await?)
    }

    /// Decide whether a chunk should be loaded and mark it as started
    ///
    /// Returns `false` when the chunk's rows are already in the target;
    /// nothing is written in that case. Otherwise the entry is marked as
    /// started and `true` is returned. No lock is taken: two loaders racing on
    /// the same chunk can both get `true`.
    #[instrument(skip(self, entry), fields(chunk_id = entry.id, table = %entry.plan.table_name))]
    pub async fn enforce(&self, entry: &LedgerEntry) -> MigrationResult<bool> {
        if self.has_been_loaded(entry).await {
            tracing::debug!("Chunk already loaded, skipping");
            return Ok(false);
        }

        self.ledger.mark_started(entry.id).await?;
        Ok(true)
    }

    /// Drop the provenance column of a completed table
    ///
    /// The caller must make sure no chunk of the table can still be retried:
    /// once the column is gone, existence probes for the table fail and every
    /// started chunk would be reported as loaded.
    /// [`crate::orchestrator::Orchestrator::finalize_table`] confirms every
    /// chunk with [`Self::confirm_loaded`] before calling.
    #[instrument(skip(self, table), fields(table = %table.target_name))]
    pub async fn drop_provenance_column(&self, table: &TableDescriptor) -> MigrationResult<()> {
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            qualified_pg(&table.schema_name, &table.target_name),
            quote_pg_ident(&table.provenance_column_name)
        );

        self.target
            .execute(&sql)
            .await
            .map_err(|e| MigrationError::schema(&table.target_name, e))?;

        tracing::info!(column = %table.provenance_column_name, "Provenance column dropped");
        Ok(())
    }
}
