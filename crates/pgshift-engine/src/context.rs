//! Per-run migration context
//!
//! Built once from configuration and shared (behind an `Arc`) by the schema
//! migrator, chunk planner and consistency enforcer. It holds only immutable
//! run settings; table descriptors are created per table and handed from one
//! stage to the next.

use std::collections::HashSet;

use crate::config::MigrationConfig;
use crate::error::MigrationResult;
use crate::naming::{ledger_table_name, RenameRules};
use crate::type_map::TypeRuleTable;
use crate::types::{ColumnDescriptor, TableDescriptor};

#[derive(Debug, Clone)]
pub struct RunContext {
    /// Target PostgreSQL schema
    pub schema: String,
    /// Source MySQL database name
    pub source_database: String,
    pub chunk_size_mb: f64,
    pub type_rules: TypeRuleTable,
    pub renames: RenameRules,
    data_only_tables: HashSet<String>,
}

impl RunContext {
    pub fn new(
        schema: impl Into<String>,
        source_database: impl Into<String>,
        chunk_size_mb: f64,
        type_rules: TypeRuleTable,
    ) -> Self {
        Self {
            schema: schema.into(),
            source_database: source_database.into(),
            chunk_size_mb,
            type_rules,
            renames: RenameRules::default(),
            data_only_tables: HashSet::new(),
        }
    }

    pub fn with_renames(mut self, renames: RenameRules) -> Self {
        self.renames = renames;
        self
    }

    pub fn with_data_only_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_only_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_config(config: &MigrationConfig) -> MigrationResult<Self> {
        let type_rules = match config.data_types_map {
            Some(ref path) => TypeRuleTable::from_file(path)?,
            None => TypeRuleTable::builtin()?,
        };

        Ok(Self::new(
            config.target.schema.clone(),
            config.source.database.clone(),
            config.data_chunk_size_mb,
            type_rules,
        )
        .with_renames(config.renames.clone())
        .with_data_only_tables(config.data_only_tables.iter().cloned()))
    }

    /// Whether the target table for this source table already exists
    pub fn migrates_only_data(&self, source_table: &str) -> bool {
        self.data_only_tables.contains(source_table)
    }

    pub fn target_table_name(&self, source_table: &str) -> String {
        self.renames.table_name(source_table)
    }

    pub fn ledger_table_name(&self) -> String {
        ledger_table_name(&self.schema, &self.source_database)
    }

    /// Build the descriptor of a source table from its introspected columns
    pub fn describe(&self, source_table: &str, columns: Vec<ColumnDescriptor>) -> TableDescriptor {
        TableDescriptor::new(
            source_table,
            self.target_table_name(source_table),
            self.schema.clone(),
            columns,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{NamePair, TableRename};

    #[test]
    fn test_describe_applies_renames() {
        let ctx = RunContext::new("app", "shop", 10.0, TypeRuleTable::default()).with_renames(
            RenameRules {
                tables: vec![TableRename {
                    name: NamePair {
                        original: "tbl_orders".to_string(),
                        new: "orders".to_string(),
                    },
                    columns: Vec::new(),
                }],
            },
        );

        let table = ctx.describe("tbl_orders", Vec::new());
        assert_eq!(table.target_name, "orders");
        assert_eq!(table.provenance_column_name, "app_tbl_orders_data_chunk_id_temp");
        assert_eq!(ctx.ledger_table_name(), "data_pool_appshop");
    }

    #[test]
    fn test_data_only_tables() {
        let ctx = RunContext::new("public", "shop", 10.0, TypeRuleTable::default())
            .with_data_only_tables(["audit_log"]);
        assert!(ctx.migrates_only_data("audit_log"));
        assert!(!ctx.migrates_only_data("orders"));
    }
}
