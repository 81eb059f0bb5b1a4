//! Source-side read expressions for chunk loading
//!
//! Some MySQL values have no direct text form PostgreSQL `COPY` accepts, so
//! the read query converts them on the source side: spatial values to WKB
//! hex, binary values to hex, bit strings to binary digits, and MySQL zero
//! dates to `-INFINITY`.

use crate::naming::quote_mysql_ident;
use crate::types::{ChunkPlan, ColumnDescriptor};

const SPATIAL_TYPES: &[&str] = &[
    "geometry",
    "point",
    "linestring",
    "polygon",
    "multipoint",
    "multilinestring",
    "multipolygon",
    "geometrycollection",
];

const BINARY_TYPES: &[&str] = &["binary", "varbinary", "tinyblob", "blob", "mediumblob", "longblob"];

fn base_type(raw_source_type: &str) -> String {
    let first = raw_source_type.split_whitespace().next().unwrap_or_default();
    first
        .split('(')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn read_expression(column: &ColumnDescriptor) -> String {
    let name = quote_mysql_ident(&column.name);
    let base = base_type(&column.raw_source_type);

    match base.as_str() {
        t if SPATIAL_TYPES.contains(&t) => format!("HEX(ST_AsWKB({name})) AS {name}"),
        t if BINARY_TYPES.contains(&t) => format!("HEX({name}) AS {name}"),
        "bit" => format!("BIN({name}) AS {name}"),
        "date" | "datetime" | "timestamp" => format!(
            "IF({name} IN('0000-00-00', '0000-00-00 00:00:00'), '-INFINITY', CAST({name} AS CHAR)) AS {name}"
        ),
        _ => name,
    }
}

/// Comma separated select list for all columns of a source table
pub fn select_field_list(columns: &[ColumnDescriptor]) -> String {
    columns
        .iter()
        .map(read_expression)
        .collect::<Vec<_>>()
        .join(",")
}

/// Query reading one chunk from the source table
///
/// The limit is clamped to the rows that remain after `offset`. Reads are
/// ordered by the auto-increment primary key when the plan carries one;
/// without it the window is taken over MySQL's natural row order, which is
/// only stable while the source table is not written to.
pub fn chunk_read_sql(plan: &ChunkPlan) -> String {
    let order_by = plan
        .primary_key
        .as_deref()
        .map(|pk| format!(" ORDER BY {}", quote_mysql_ident(pk)))
        .unwrap_or_default();

    format!(
        "SELECT {} FROM {}{} LIMIT {} OFFSET {}",
        plan.select_field_list,
        quote_mysql_ident(&plan.source_table_name),
        order_by,
        plan.effective_rows(),
        plan.offset
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            raw_source_type: data_type.to_string(),
            is_primary_key: false,
            is_auto_increment: false,
        }
    }

    #[test]
    fn test_select_list_converts_special_types() {
        let list = select_field_list(&[
            column("id", "int(11) unsigned"),
            column("shape", "POLYGON"),
            column("digest", "varbinary(32)"),
            column("flags", "bit(8)"),
            column("born", "date"),
        ]);

        let parts: Vec<&str> = list.split(',').collect();
        assert_eq!(parts[0], "`id`");
        assert_eq!(parts[1], "HEX(ST_AsWKB(`shape`)) AS `shape`");
        assert_eq!(parts[2], "HEX(`digest`) AS `digest`");
        assert_eq!(parts[3], "BIN(`flags`) AS `flags`");
        assert!(list.contains("'-INFINITY', CAST(`born` AS CHAR)) AS `born`"));
    }

    fn plan(offset: u64, primary_key: Option<&str>) -> ChunkPlan {
        ChunkPlan {
            table_name: "orders".to_string(),
            source_table_name: "tbl_orders".to_string(),
            select_field_list: "`id`,`total`".to_string(),
            offset,
            rows_in_chunk: 400,
            total_rows_count: 1000,
            primary_key: primary_key.map(str::to_string),
            size_in_mb: 100.0,
        }
    }

    #[test]
    fn test_read_sql_orders_by_primary_key() {
        assert_eq!(
            chunk_read_sql(&plan(400, Some("id"))),
            "SELECT `id`,`total` FROM `tbl_orders` ORDER BY `id` LIMIT 400 OFFSET 400"
        );
    }

    #[test]
    fn test_read_sql_clamps_last_window_without_ordering() {
        assert_eq!(
            chunk_read_sql(&plan(800, None)),
            "SELECT `id`,`total` FROM `tbl_orders` LIMIT 200 OFFSET 800"
        );
    }
}
