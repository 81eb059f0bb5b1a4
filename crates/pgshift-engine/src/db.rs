//! Connection pools for the source and target databases

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::{SourceConfig, TargetConfig};
use crate::error::MigrationResult;

/// Connect to the MySQL source
///
/// Pool acquire timeouts are the only timeouts in the engine; a timed-out
/// query is handled like any other query failure.
pub async fn connect_source(config: &SourceConfig) -> MigrationResult<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await?;

    tracing::info!(
        database = %config.database,
        max_connections = config.max_connections,
        "Source connection pool created"
    );

    Ok(pool)
}

/// Connect to the PostgreSQL target
pub async fn connect_target(config: &TargetConfig) -> MigrationResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await?;

    tracing::info!(
        schema = %config.schema,
        max_connections = config.max_connections,
        "Target connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(source: &MySqlPool, target: &PgPool) -> MigrationResult<()> {
    sqlx::query("SELECT 1").execute(source).await?;
    sqlx::query("SELECT 1").execute(target).await?;
    Ok(())
}
