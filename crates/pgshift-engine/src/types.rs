//! Core types for chunked migration

use serde::{Deserialize, Serialize};

use crate::naming::provenance_column_name;

/// One source column as reported by introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Full MySQL column type, e.g. `int(11) unsigned`
    pub raw_source_type: String,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
}

/// A table being migrated, with its source columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Original table name in the source database
    pub source_name: String,
    /// Table name in the target schema after renaming rules
    pub target_name: String,
    pub schema_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub provenance_column_name: String,
}

impl TableDescriptor {
    pub fn new(
        source_name: impl Into<String>,
        target_name: impl Into<String>,
        schema_name: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        let source_name = source_name.into();
        let schema_name = schema_name.into();
        let provenance_column_name = provenance_column_name(&schema_name, &source_name);

        Self {
            source_name,
            target_name: target_name.into(),
            schema_name,
            columns,
            provenance_column_name,
        }
    }

    /// The auto-increment primary key, if the table has one
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.is_primary_key && c.is_auto_increment)
    }
}

/// Size and row count of a source table, read on one session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableStats {
    pub size_in_mb: f64,
    pub rows_count: u64,
}

/// A unit of load work: the row window `[offset, offset + rows_in_chunk)`
///
/// Stored as JSON in the ledger. The final window of a table may ask for more
/// rows than remain; readers clamp it (see [`crate::select_list::chunk_read_sql`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPlan {
    /// Target (renamed) table name
    pub table_name: String,
    /// Source table the rows are read from
    pub source_table_name: String,
    pub select_field_list: String,
    pub offset: u64,
    pub rows_in_chunk: u64,
    pub total_rows_count: u64,
    /// Auto-increment primary key used to order reads, when present
    #[serde(default)]
    pub primary_key: Option<String>,
    pub size_in_mb: f64,
}

impl ChunkPlan {
    /// Rows this chunk will actually read
    pub fn effective_rows(&self) -> u64 {
        self.rows_in_chunk
            .min(self.total_rows_count.saturating_sub(self.offset))
    }
}

/// A persisted ledger row (maps to the `data_pool_*` table)
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: i64,
    pub is_started: bool,
    pub plan: ChunkPlan,
    pub size_in_mb: f64,
}

/// Ledger progress snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerProgress {
    pub total: i64,
    pub started: i64,
}

impl LedgerProgress {
    pub fn not_started(&self) -> i64 {
        self.total - self.started
    }

    /// Share of chunks a loader has picked up
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.started as f64 / self.total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, pk: bool, auto: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            raw_source_type: "int(11)".to_string(),
            is_primary_key: pk,
            is_auto_increment: auto,
        }
    }

    #[test]
    fn test_primary_key_requires_auto_increment() {
        let table = TableDescriptor::new(
            "orders",
            "orders",
            "public",
            vec![column("code", true, false), column("id", true, true)],
        );
        assert_eq!(table.primary_key().map(|c| c.name.as_str()), Some("id"));

        let natural = TableDescriptor::new("tags", "tags", "public", vec![column("code", true, false)]);
        assert!(natural.primary_key().is_none());
    }

    #[test]
    fn test_provenance_column_uses_source_name() {
        let table = TableDescriptor::new("tbl_users", "users", "app", Vec::new());
        assert_eq!(table.provenance_column_name, "app_tbl_users_data_chunk_id_temp");
    }

    #[test]
    fn test_effective_rows_clamps_last_window() {
        let plan = ChunkPlan {
            table_name: "t".to_string(),
            source_table_name: "t".to_string(),
            select_field_list: "`id`".to_string(),
            offset: 800,
            rows_in_chunk: 400,
            total_rows_count: 1000,
            primary_key: None,
            size_in_mb: 100.0,
        };
        assert_eq!(plan.effective_rows(), 200);
    }

    #[test]
    fn test_progress_percentage() {
        let progress = LedgerProgress { total: 4, started: 1 };
        assert_eq!(progress.not_started(), 3);
        assert!((progress.completion_percentage() - 25.0).abs() < f64::EPSILON);
        assert_eq!(LedgerProgress::default().completion_percentage(), 0.0);
    }
}
