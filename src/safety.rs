//! Read-only guard for model-written SQL.
//!
//! Checks run in a fixed order and the first failure is reported:
//! 1. the statement must start with `SELECT`;
//! 2. it must not contain a mutating or administrative keyword;
//! 3. it must read `FROM` the known table;
//! 4. a `LIMIT` is appended when none is present.
//!
//! This is a word-level blocklist, not a parser. Keywords inside string
//! literals or comments are still matched, comments and alternate encodings
//! are not normalized, and a `;` followed by a keyword-free statement is not
//! detected here. Execution on a read-only connection is what actually
//! prevents writes.

use regex::Regex;
use thiserror::Error;

use crate::schema;

/// Row ceiling appended to statements that carry no `LIMIT`.
pub const DEFAULT_ROW_CEILING: u32 = 5000;

const BLOCKED_KEYWORDS: [&str; 14] = [
    "insert", "update", "delete", "drop", "alter", "create", "replace", "pragma", "attach",
    "detach", "vacuum", "begin", "commit", "rollback",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsafeQuery {
    #[error("Only SELECT statements are allowed.")]
    NotSelect,

    #[error("Statement contains a disallowed keyword.")]
    DisallowedKeyword { keyword: String },

    #[error("Query must read from the {table} table.")]
    WrongTable { table: String },
}

/// Compiled rule set for one table.
#[derive(Debug, Clone)]
pub struct SqlGuard {
    table: String,
    row_ceiling: u32,
    select_prefix: Regex,
    blocked: Regex,
    from_table: Regex,
    has_limit: Regex,
}

impl Default for SqlGuard {
    fn default() -> Self {
        Self::new(schema::TABLE, DEFAULT_ROW_CEILING)
    }
}

impl SqlGuard {
    pub fn new(table: impl Into<String>, row_ceiling: u32) -> Self {
        let table = table.into();
        let blocked = format!(r"(?i)\b({})\b", BLOCKED_KEYWORDS.join("|"));
        let from_table = format!(r"(?i)\bfrom\s+{}\b", regex::escape(&table));
        Self {
            select_prefix: Regex::new(r"(?i)^\s*select\b").expect("select pattern"),
            blocked: Regex::new(&blocked).expect("keyword pattern"),
            from_table: Regex::new(&from_table).expect("table pattern"),
            has_limit: Regex::new(r"(?i)\blimit\b").expect("limit pattern"),
            table,
            row_ceiling,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn row_ceiling(&self) -> u32 {
        self.row_ceiling
    }

    /// Validates `sql` and returns the statement to execute.
    pub fn enforce(&self, sql: &str) -> Result<String, UnsafeQuery> {
        if !self.select_prefix.is_match(sql) {
            return Err(UnsafeQuery::NotSelect);
        }
        if let Some(found) = self.blocked.find(sql) {
            return Err(UnsafeQuery::DisallowedKeyword {
                keyword: found.as_str().to_ascii_lowercase(),
            });
        }
        if !self.from_table.is_match(sql) {
            return Err(UnsafeQuery::WrongTable {
                table: self.table.clone(),
            });
        }
        if self.has_limit.is_match(sql) {
            return Ok(sql.to_string());
        }
        Ok(format!("{} LIMIT {}", sql.trim(), self.row_ceiling))
    }
}
