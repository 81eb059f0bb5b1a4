//! Durable chunk ledger (the data pool)
//!
//! One row per planned chunk in `"<schema>"."data_pool_<schema><db>"`. Rows
//! are written once by the planner and never deleted during a run; the only
//! mutation is the `is_started` flag going from `false` to `true`.

use async_trait::async_trait;
use pgshift_common::ShiftError;
use sqlx::postgres::PgPool;
use std::collections::HashSet;

use crate::context::RunContext;
use crate::error::{MigrationError, MigrationResult};
use crate::naming::qualified_pg;
use crate::types::{ChunkPlan, LedgerEntry, LedgerProgress};

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create the ledger table if it does not exist yet
    async fn create(&self) -> MigrationResult<()>;

    /// Persist one chunk plan, returning its id
    async fn insert(&self, plan: &ChunkPlan) -> MigrationResult<i64>;

    async fn is_started(&self, id: i64) -> MigrationResult<bool>;

    async fn mark_started(&self, id: i64) -> MigrationResult<()>;

    /// Entries ordered by id, optionally limited to one target table
    async fn entries(&self, table: Option<&str>) -> MigrationResult<Vec<LedgerEntry>>;

    /// Target tables that already have chunks in the ledger
    async fn planned_tables(&self) -> MigrationResult<HashSet<String>>;

    async fn progress(&self, table: Option<&str>) -> MigrationResult<LedgerProgress>;

    /// Drop the ledger table once the run is complete
    async fn drop_table(&self) -> MigrationResult<()>;
}

/// [`Ledger`] stored in the PostgreSQL target
pub struct PgLedger {
    pool: PgPool,
    table: String,
}

impl PgLedger {
    pub fn new(pool: PgPool, schema: &str, table_name: &str) -> Self {
        Self {
            pool,
            table: qualified_pg(schema, table_name),
        }
    }

    pub fn for_context(pool: PgPool, ctx: &RunContext) -> Self {
        Self::new(pool, &ctx.schema, &ctx.ledger_table_name())
    }
}

fn decode_entry(
    (id, is_started, json, size_in_mb): (i64, bool, String, Option<f64>),
) -> MigrationResult<LedgerEntry> {
    let plan: ChunkPlan =
        serde_json::from_str(&json).map_err(|source| MigrationError::CorruptPlan { id, source })?;

    Ok(LedgerEntry {
        id,
        is_started,
        size_in_mb: size_in_mb.unwrap_or(plan.size_in_mb),
        plan,
    })
}

#[async_trait]
impl Ledger for PgLedger {
    async fn create(&self) -> MigrationResult<()> {
        let sql = format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                "id" BIGSERIAL PRIMARY KEY,
                "is_started" BOOLEAN NOT NULL DEFAULT FALSE,
                "json" TEXT NOT NULL,
                "size_in_mb" NUMERIC
            )"#,
            self.table
        );

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(MigrationError::Ledger)?;

        tracing::debug!(ledger = %self.table, "Ledger table ready");
        Ok(())
    }

    async fn insert(&self, plan: &ChunkPlan) -> MigrationResult<i64> {
        let json = serde_json::to_string(plan).map_err(ShiftError::from)?;
        let sql = format!(
            r#"INSERT INTO {} ("is_started", "json", "size_in_mb") VALUES (FALSE, $1, $2) RETURNING "id""#,
            self.table
        );

        sqlx::query_scalar(&sql)
            .bind(json)
            .bind(plan.size_in_mb)
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::Ledger)
    }

    async fn is_started(&self, id: i64) -> MigrationResult<bool> {
        let sql = format!(r#"SELECT "is_started" FROM {} WHERE "id" = $1"#, self.table);

        sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::Ledger)
    }

    async fn mark_started(&self, id: i64) -> MigrationResult<()> {
        let sql = format!(r#"UPDATE {} SET "is_started" = TRUE WHERE "id" = $1"#, self.table);

        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(MigrationError::Ledger)?;

        Ok(())
    }

    async fn entries(&self, table: Option<&str>) -> MigrationResult<Vec<LedgerEntry>> {
        let sql = format!(
            r#"
            SELECT "id", "is_started", "json", "size_in_mb"::float8
            FROM {}
            WHERE ($1::text IS NULL OR "json"::json->>'table_name' = $1)
            ORDER BY "id"
            "#,
            self.table
        );

        let rows: Vec<(i64, bool, String, Option<f64>)> = sqlx::query_as(&sql)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(MigrationError::Ledger)?;

        rows.into_iter().map(decode_entry).collect()
    }

    async fn planned_tables(&self) -> MigrationResult<HashSet<String>> {
        let sql = format!(
            r#"SELECT DISTINCT "json"::json->>'table_name' FROM {}"#,
            self.table
        );

        let rows: Vec<Option<String>> = sqlx::query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(MigrationError::Ledger)?;

        Ok(rows.into_iter().flatten().collect())
    }

    async fn progress(&self, table: Option<&str>) -> MigrationResult<LedgerProgress> {
        let sql = format!(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE "is_started")
            FROM {}
            WHERE ($1::text IS NULL OR "json"::json->>'table_name' = $1)
            "#,
            self.table
        );

        let (total, started): (i64, i64) = sqlx::query_as(&sql)
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::Ledger)?;

        Ok(LedgerProgress { total, started })
    }

    async fn drop_table(&self) -> MigrationResult<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", self.table);

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(MigrationError::Ledger)?;

        tracing::info!(ledger = %self.table, "Ledger table dropped");
        Ok(())
    }
}
