//! Engine error types
//!
//! Planning and schema errors are scoped to one table: the orchestrator logs
//! them and moves on. Consistency probes on the load path never produce an
//! error; they collapse into a conservative boolean inside the enforcer. Only
//! finalization surfaces probe failures.

use pgshift_common::ShiftError;
use thiserror::Error;

/// Result type alias for engine operations
pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

#[derive(Error, Debug)]
pub enum MigrationError {
    /// Source columns, size or row count could not be read
    #[error("Failed to introspect source table `{table}`: {source}")]
    Introspection {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// No type rule matches a source column type
    #[error("No type rule for source type '{data_type}'")]
    UnknownType { data_type: String },

    /// Target DDL failed
    #[error("Schema migration failed for table \"{table}\": {source}")]
    Schema {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// A ledger row could not be written or read
    #[error("Ledger operation failed: {0}")]
    Ledger(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger entry {id} holds an unreadable chunk plan: {source}")]
    CorruptPlan {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    /// Refused to drop a provenance column while chunks may still be retried
    #[error("Table \"{table}\" still has {outstanding} chunk(s) not confirmed as loaded")]
    ChunksOutstanding { table: String, outstanding: usize },

    #[error(transparent)]
    Common(#[from] ShiftError),
}

impl MigrationError {
    pub fn unknown_type(data_type: impl Into<String>) -> Self {
        Self::UnknownType {
            data_type: data_type.into(),
        }
    }

    pub fn introspection(table: &str, source: sqlx::Error) -> Self {
        Self::Introspection {
            table: table.to_string(),
            source,
        }
    }

    pub fn schema(table: &str, source: sqlx::Error) -> Self {
        Self::Schema {
            table: table.to_string(),
            source,
        }
    }
}
