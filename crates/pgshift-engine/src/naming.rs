//! Identifier quoting, derived names and user renaming rules

use serde::{Deserialize, Serialize};

/// Quote a PostgreSQL identifier
pub fn quote_pg_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a MySQL identifier
pub fn quote_mysql_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `"schema"."table"`
pub fn qualified_pg(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_pg_ident(schema), quote_pg_ident(table))
}

/// Name of the hidden column recording which chunk wrote each row.
///
/// Built from the original (source) table name so it stays unique inside the
/// target schema even when tables are renamed.
pub fn provenance_column_name(schema: &str, source_table: &str) -> String {
    format!("{}_{}_data_chunk_id_temp", schema, source_table)
}

/// Name of the chunk ledger ("data pool") table for one database migration
pub fn ledger_table_name(schema: &str, source_database: &str) -> String {
    format!("data_pool_{}{}", schema, source_database)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePair {
    pub original: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRename {
    pub name: NamePair,
    #[serde(default)]
    pub columns: Vec<NamePair>,
}

/// Table and column renaming rules applied on the target side
///
/// Anything without a rule keeps its source name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRules {
    #[serde(default)]
    pub tables: Vec<TableRename>,
}

impl RenameRules {
    /// Target name for a source table
    pub fn table_name(&self, original: &str) -> String {
        self.tables
            .iter()
            .find(|t| t.name.original == original)
            .map_or_else(|| original.to_string(), |t| t.name.new.clone())
    }

    /// Target name for a column of a source table
    pub fn column_name(&self, original_table: &str, original_column: &str) -> String {
        self.tables
            .iter()
            .find(|t| t.name.original == original_table)
            .and_then(|t| t.columns.iter().find(|c| c.original == original_column))
            .map_or_else(|| original_column.to_string(), |c| c.new.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RenameRules {
        RenameRules {
            tables: vec![TableRename {
                name: NamePair {
                    original: "tbl_users".to_string(),
                    new: "users".to_string(),
                },
                columns: vec![NamePair {
                    original: "usr_email".to_string(),
                    new: "email".to_string(),
                }],
            }],
        }
    }

    #[test]
    fn test_quoting_escapes_delimiters() {
        assert_eq!(quote_pg_ident("order"), "\"order\"");
        assert_eq!(quote_pg_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_mysql_ident("we`ird"), "`we``ird`");
        assert_eq!(qualified_pg("public", "users"), "\"public\".\"users\"");
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(
            provenance_column_name("public", "tbl_users"),
            "public_tbl_users_data_chunk_id_temp"
        );
        assert_eq!(ledger_table_name("public", "shop"), "data_pool_publicshop");
    }

    #[test]
    fn test_table_renames_fall_back_to_source_name() {
        let rules = rules();
        assert_eq!(rules.table_name("tbl_users"), "users");
        assert_eq!(rules.table_name("orders"), "orders");
    }

    #[test]
    fn test_column_renames_are_scoped_to_table() {
        let rules = rules();
        assert_eq!(rules.column_name("tbl_users", "usr_email"), "email");
        assert_eq!(rules.column_name("tbl_users", "id"), "id");
        assert_eq!(rules.column_name("orders", "usr_email"), "usr_email");
    }
}
