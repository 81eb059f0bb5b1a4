//! Target table creation
//!
//! Every migrated table gets a hidden `BIGINT` provenance column next to its
//! translated columns. Loaders tag each row with the id of the ledger entry
//! that wrote it, which is what makes chunk reloads idempotent.

use std::sync::Arc;
use tracing::instrument;

use crate::context::RunContext;
use crate::error::{MigrationError, MigrationResult};
use crate::naming::{qualified_pg, quote_pg_ident};
use crate::sink::ErrorSink;
use crate::source::SourceCatalog;
use crate::target::TargetDatabase;
use crate::type_map::translate;
use crate::types::TableDescriptor;

/// `CREATE TABLE IF NOT EXISTS` statement for a described table
///
/// Fails with [`MigrationError::UnknownType`] when any column has no type rule.
pub fn create_table_sql(ctx: &RunContext, table: &TableDescriptor) -> MigrationResult<String> {
    let mut definitions = Vec::with_capacity(table.columns.len() + 1);

    for column in &table.columns {
        let name = ctx.renames.column_name(&table.source_name, &column.name);
        let data_type = translate(&ctx.type_rules, &column.raw_source_type)?;
        definitions.push(format!("{} {}", quote_pg_ident(&name), data_type));
    }

    definitions.push(format!("{} BIGINT", quote_pg_ident(&table.provenance_column_name)));

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {}({})",
        qualified_pg(&table.schema_name, &table.target_name),
        definitions.join(",")
    ))
}

/// Statement adding the provenance column to an existing target table
pub fn add_provenance_column_sql(table: &TableDescriptor) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} BIGINT",
        qualified_pg(&table.schema_name, &table.target_name),
        quote_pg_ident(&table.provenance_column_name)
    )
}

pub struct SchemaMigrator {
    ctx: Arc<RunContext>,
    source: Arc<dyn SourceCatalog>,
    target: Arc<dyn TargetDatabase>,
    errors: Arc<dyn ErrorSink>,
}

impl SchemaMigrator {
    pub fn new(
        ctx: Arc<RunContext>,
        source: Arc<dyn SourceCatalog>,
        target: Arc<dyn TargetDatabase>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            ctx,
            source,
            target,
            errors,
        }
    }

    /// Introspect a source table without touching the target
    pub async fn describe_table(&self, source_table: &str) -> MigrationResult<TableDescriptor> {
        let columns = self
            .source
            .columns(source_table)
            .await
            .map_err(|e| MigrationError::introspection(source_table, e))?;

        Ok(self.ctx.describe(source_table, columns))
    }

    /// Create the target table for `source_table` and return its descriptor
    ///
    /// For data-only tables the target already exists and only the provenance
    /// column is added. A failure of that `ALTER` is recorded and logged but
    /// does not fail the table, since the column may be left over from an
    /// earlier run.
    #[instrument(skip(self), fields(schema = %self.ctx.schema))]
    pub async fn migrate_schema(&self, source_table: &str) -> MigrationResult<TableDescriptor> {
        let table = self.describe_table(source_table).await?;

        if self.ctx.migrates_only_data(source_table) {
            let sql = add_provenance_column_sql(&table);

            if let Err(e) = self.target.execute(&sql).await {
                self.errors.record_error(
                    &format!("Failed to add provenance column to \"{}\": {}", table.target_name, e),
                    Some(&sql),
                );
                tracing::warn!(
                    table = %table.target_name,
                    column = %table.provenance_column_name,
                    error = %e,
                    "Could not add provenance column to data-only table"
                );
            }

            return Ok(table);
        }

        let sql = create_table_sql(&self.ctx, &table)?;

        if let Err(e) = self.target.execute(&sql).await {
            self.errors.record_error(&e.to_string(), Some(&sql));
            return Err(MigrationError::schema(&table.target_name, e));
        }

        tracing::info!(
            table = %table.target_name,
            columns = table.columns.len(),
            "Target table created"
        );

        Ok(table)
    }
}
