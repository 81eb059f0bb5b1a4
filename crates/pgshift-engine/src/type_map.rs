//! MySQL to PostgreSQL column type translation
//!
//! Translation is driven by a rule table keyed by the lowercase MySQL base
//! type. Each rule names a default PostgreSQL type, an optional wider type used
//! for `unsigned`/`zerofill` columns, and whether the MySQL length argument
//! should be dropped because the PostgreSQL type is fixed width.
//!
//! The built-in table lives in `data/data_types_map.json`; a customised copy
//! can be supplied through the `data_types_map` configuration key.

use pgshift_common::ShiftError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{MigrationError, MigrationResult};

const BUILTIN_RULES: &str = include_str!("../data/data_types_map.json");

/// Target for enum and set columns, whatever their declared members
const ENUM_TARGET_TYPE: &str = "character varying(255)";

/// Mapping rule for one MySQL base type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRule {
    #[serde(rename = "type")]
    pub target_type: String,
    /// Wider type for unsigned/zerofill columns; empty means "same as `type`"
    #[serde(default)]
    pub increased_size: String,
    /// MySQL declares a length but the PostgreSQL type takes none
    #[serde(default, alias = "mySqlVarLenPgSqlFixedLen")]
    pub mysql_var_len_pg_sql_fixed_len: bool,
}

impl TypeRule {
    fn pick(&self, increased: bool) -> &str {
        if increased && !self.increased_size.is_empty() {
            &self.increased_size
        } else {
            &self.target_type
        }
    }
}

/// Rule table keyed by lowercase MySQL base type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRuleTable {
    rules: HashMap<String, TypeRule>,
}

impl TypeRuleTable {
    pub fn builtin() -> MigrationResult<Self> {
        Self::from_json(BUILTIN_RULES)
    }

    pub fn from_json(json: &str) -> MigrationResult<Self> {
        serde_json::from_str(json).map_err(|e| ShiftError::from(e).into())
    }

    pub fn from_file(path: &Path) -> MigrationResult<Self> {
        let json = std::fs::read_to_string(path).map_err(ShiftError::from)?;
        Self::from_json(&json)
    }

    pub fn insert(&mut self, mysql_type: impl Into<String>, rule: TypeRule) {
        self.rules.insert(mysql_type.into().to_lowercase(), rule);
    }

    pub fn rule(&self, mysql_type: &str) -> MigrationResult<&TypeRule> {
        self.rules
            .get(mysql_type)
            .ok_or_else(|| MigrationError::unknown_type(mysql_type))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Translate a MySQL column type (as shown by `SHOW COLUMNS`) to PostgreSQL
///
/// ```
/// use pgshift_engine::type_map::{translate, TypeRuleTable};
///
/// let rules = TypeRuleTable::builtin().unwrap();
/// assert_eq!(translate(&rules, "varchar(64)").unwrap(), "character varying(64)");
/// assert_eq!(translate(&rules, "int(10) unsigned").unwrap(), "bigint");
/// ```
pub fn translate(rules: &TypeRuleTable, source_type: &str) -> MigrationResult<String> {
    let mut tokens = source_type.split_whitespace();
    let base = tokens.next().unwrap_or_default().to_lowercase();
    let increased = tokens.any(|t| {
        t.eq_ignore_ascii_case("unsigned") || t.eq_ignore_ascii_case("zerofill")
    });

    let translated = match base.split_once('(') {
        None => rules.rule(&base)?.pick(increased).to_string(),
        Some((name, rest)) => {
            // Re-wrap the argument ourselves so the result is always closed.
            let argument = rest.rfind(')').map_or(rest, |end| &rest[..end]);

            match name {
                "enum" | "set" => ENUM_TARGET_TYPE.to_string(),
                "decimal" | "numeric" => {
                    format!("{}({})", rules.rule(name)?.target_type, argument)
                },
                _ => {
                    let rule = rules.rule(name)?;
                    if rule.mysql_var_len_pg_sql_fixed_len {
                        rule.pick(increased).to_string()
                    } else {
                        format!("{}({})", rule.pick(increased), argument)
                    }
                },
            }
        },
    };

    // Zero-length character types are invalid in PostgreSQL.
    Ok(match translated.as_str() {
        "character(0)" => "character(1)".to_string(),
        "character varying(0)" => "character varying(1)".to_string(),
        _ => translated,
    })
}
