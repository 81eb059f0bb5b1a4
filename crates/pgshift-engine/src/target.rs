//! Target database access

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::naming::{qualified_pg, quote_pg_ident};

/// Operations the engine runs against the PostgreSQL target
#[async_trait]
pub trait TargetDatabase: Send + Sync {
    /// Run a statement without bind parameters (DDL)
    async fn execute(&self, sql: &str) -> Result<(), sqlx::Error>;

    /// Whether any row of `schema.table` is tagged with `chunk_id` in the
    /// provenance column
    async fn chunk_rows_exist(
        &self,
        schema: &str,
        table: &str,
        provenance_column: &str,
        chunk_id: i64,
    ) -> Result<bool, sqlx::Error>;
}

/// [`TargetDatabase`] backed by a PostgreSQL pool
pub struct PgTarget {
    pool: PgPool,
}

impl PgTarget {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetDatabase for PgTarget {
    async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::query(sql).execute(&self.pool).await.map(|_| ())
    }

    async fn chunk_rows_exist(
        &self,
        schema: &str,
        table: &str,
        provenance_column: &str,
        chunk_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
            qualified_pg(schema, table),
            quote_pg_ident(provenance_column)
        );

        sqlx::query_scalar(&sql)
            .bind(chunk_id)
            .fetch_one(&self.pool)
            .await
    }
}
