//! Migration configuration
//!
//! Loaded from an optional file (format picked from the extension) layered
//! under `PGSHIFT__*` environment variables, e.g.
//!
//! ```text
//! PGSHIFT__SOURCE__URL=mysql://root@localhost/shop
//! PGSHIFT__SOURCE__DATABASE=shop
//! PGSHIFT__TARGET__URL=postgresql://postgres@localhost/shop
//! PGSHIFT__DATA_CHUNK_SIZE_MB=25
//! PGSHIFT__DATA_ONLY_TABLES=audit_log,sessions
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::naming::RenameRules;

// ============================================================================
// Defaults
// ============================================================================

/// Default target chunk size in megabytes.
pub const DEFAULT_DATA_CHUNK_SIZE_MB: f64 = 10.0;

/// Default number of tables prepared at the same time.
pub const DEFAULT_MAX_CONCURRENT_TABLES: usize = 4;

/// Default maximum connections per pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default pool acquire timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default target schema.
pub const DEFAULT_TARGET_SCHEMA: &str = "public";

fn default_chunk_size() -> f64 {
    DEFAULT_DATA_CHUNK_SIZE_MB
}

fn default_max_concurrent_tables() -> usize {
    DEFAULT_MAX_CONCURRENT_TABLES
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_schema() -> String {
    DEFAULT_TARGET_SCHEMA.to_string()
}

/// MySQL source connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    /// Database (MySQL schema) being migrated
    pub database: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// PostgreSQL target connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub source: SourceConfig,
    pub target: TargetConfig,

    /// Target size of one chunk in megabytes
    #[serde(default = "default_chunk_size")]
    pub data_chunk_size_mb: f64,

    #[serde(default = "default_max_concurrent_tables")]
    pub max_concurrent_tables: usize,

    /// Source tables whose target schema already exists; only the provenance
    /// column is added to them
    #[serde(default)]
    pub data_only_tables: Vec<String>,

    /// When non-empty, only these source tables are migrated
    #[serde(default)]
    pub include_tables: Vec<String>,

    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Custom type rule file replacing the built-in rules
    #[serde(default)]
    pub data_types_map: Option<PathBuf>,

    #[serde(default)]
    pub renames: RenameRules,
}

impl MigrationConfig {
    /// Load configuration from `.env`, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("PGSHIFT")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("data_only_tables")
                    .with_list_parse_key("include_tables")
                    .with_list_parse_key("exclude_tables"),
            )
            .build()
            .context("Failed to read migration configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("Invalid migration configuration")?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.is_empty() {
            anyhow::bail!("Source database URL cannot be empty");
        }

        if self.source.database.is_empty() {
            anyhow::bail!("Source database name cannot be empty");
        }

        if self.target.url.is_empty() {
            anyhow::bail!("Target database URL cannot be empty");
        }

        if self.target.schema.is_empty() {
            anyhow::bail!("Target schema cannot be empty");
        }

        if !(self.data_chunk_size_mb.is_finite() && self.data_chunk_size_mb > 0.0) {
            anyhow::bail!(
                "data_chunk_size_mb must be a positive number, got {}",
                self.data_chunk_size_mb
            );
        }

        if self.source.max_connections == 0 || self.target.max_connections == 0 {
            anyhow::bail!("max_connections must be greater than 0");
        }

        if self.max_concurrent_tables == 0 {
            anyhow::bail!("max_concurrent_tables must be greater than 0");
        }

        Ok(())
    }

    /// Whether a source table takes part in this run
    pub fn selects_table(&self, table: &str) -> bool {
        let included = self.include_tables.is_empty() || self.include_tables.iter().any(|t| t == table);
        included && !self.exclude_tables.iter().any(|t| t == table)
    }
}
