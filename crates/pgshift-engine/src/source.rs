//! Source database introspection

use async_trait::async_trait;
use sqlx::mysql::MySqlPool;

use crate::naming::quote_mysql_ident;
use crate::types::{ColumnDescriptor, TableStats};

/// Read-only view of the source database's catalog
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Columns of a table in ordinal order
    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, sqlx::Error>;

    /// On-disk size in MB and exact row count
    ///
    /// Implementations should read both on the same session so that the two
    /// numbers are as close as the source allows.
    async fn stats(&self, table: &str) -> Result<TableStats, sqlx::Error>;

    /// Base tables of the source database
    async fn tables(&self) -> Result<Vec<String>, sqlx::Error>;
}

/// [`SourceCatalog`] backed by a MySQL pool
pub struct MySqlCatalog {
    pool: MySqlPool,
    database: String,
}

impl MySqlCatalog {
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }
}

#[async_trait]
impl SourceCatalog for MySqlCatalog {
    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, sqlx::Error> {
        // CAST AS CHAR: information_schema returns some of these as binary
        // strings depending on server version.
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR),
                   CAST(column_key AS CHAR), CAST(extra AS CHAR)
            FROM information_schema.columns
            WHERE table_schema = ? AND table_name = ?
            ORDER BY ordinal_position
            "#,
        )
        .bind(&self.database)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(rows
            .into_iter()
            .map(|(name, raw_source_type, key, extra)| ColumnDescriptor {
                name,
                raw_source_type,
                is_primary_key: key == "PRI",
                is_auto_increment: extra.contains("auto_increment"),
            })
            .collect())
    }

    async fn stats(&self, table: &str) -> Result<TableStats, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;

        let size: String = sqlx::query_scalar(
            r#"
            SELECT CAST(COALESCE(data_length, 0) / 1024 / 1024 AS CHAR)
            FROM information_schema.tables
            WHERE table_schema = ? AND table_name = ?
            "#,
        )
        .bind(&self.database)
        .bind(table)
        .fetch_one(&mut *conn)
        .await?;

        let size_in_mb: f64 = size
            .trim()
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let rows_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {}", quote_mysql_ident(table)))
                .fetch_one(&mut *conn)
                .await?;

        Ok(TableStats {
            size_in_mb,
            rows_count: u64::try_from(rows_count).unwrap_or_default(),
        })
    }

    async fn tables(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT CAST(table_name AS CHAR)
            FROM information_schema.tables
            WHERE table_schema = ? AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
    }
}
