//! SQLite access for the disbursements table.
//!
//! Listing and metadata requests borrow one pooled connection for their
//! lifetime. Free-form reads from the model path open a dedicated connection
//! in SQLite read-only mode, so any write is refused by the engine itself.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, Connection, Executor, Row, Sqlite, Statement as _, TypeInfo, ValueRef};

use crate::error::{EngineError, Result};
use crate::query::{ListingQuery, SqlValue};
use crate::schema;

pub type JsonRow = Map<String, Value>;

/// One page of listing results.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListingPage {
    pub rows: Vec<JsonRow>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Filter choices for the front end.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Meta {
    #[serde(rename = "fiscalYears")]
    pub fiscal_years: Vec<Value>,
    pub organizations: Vec<Value>,
}

/// Column names and rows of a free-form read.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<JsonRow>,
}

pub struct DisbursementStore {
    pool: SqlitePool,
    options: SqliteConnectOptions,
}

impl DisbursementStore {
    /// Opens an existing database file. A missing file is an error; the
    /// service never creates the table.
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options.clone())
            .await
            .map_err(|err| {
                EngineError::storage(&format!("failed opening `{}`", path.display()), err)
            })?;
        tracing::info!(path = %path.display(), max_connections, "opened disbursements database");
        Ok(Self { pool, options })
    }

    /// Runs the count and page statements of `query` on one connection.
    pub async fn list(&self, query: &ListingQuery) -> Result<ListingPage> {
        let (count, data) = query.statements();
        tracing::debug!(sql = count.sql(), params = ?count.params(), "listing count");
        tracing::debug!(sql = data.sql(), params = ?data.params(), "listing page");

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| EngineError::storage("failed acquiring connection", err))?;

        let total: i64 = bind_params(sqlx::query(count.sql()), count.params())
            .fetch_one(&mut *conn)
            .await
            .and_then(|row| row.try_get::<i64, _>(0usize))
            .map_err(|err| EngineError::storage("failed counting disbursements", err))?;

        let rows = bind_params(sqlx::query(data.sql()), data.params())
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| EngineError::storage("failed loading disbursements", err))?;

        Ok(ListingPage {
            rows: rows.iter().map(row_to_json).collect(),
            total,
            limit: query.page.limit(),
            offset: query.page.offset(),
        })
    }

    /// Distinct fiscal years (newest first) and organizations (case-insensitive order).
    pub async fn meta(&self) -> Result<Meta> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| EngineError::storage("failed acquiring connection", err))?;

        let years = sqlx::query(&format!(
            "SELECT DISTINCT FiscalYear FROM {} ORDER BY FiscalYear DESC",
            schema::TABLE
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| EngineError::storage("failed loading fiscal years", err))?;

        let orgs = sqlx::query(&format!(
            "SELECT DISTINCT Organization FROM {} ORDER BY Organization COLLATE NOCASE",
            schema::TABLE
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| EngineError::storage("failed loading organizations", err))?;

        Ok(Meta {
            fiscal_years: years.iter().map(|row| cell_to_json(row, 0)).collect(),
            organizations: orgs.iter().map(|row| cell_to_json(row, 0)).collect(),
        })
    }

    /// Executes one already-validated statement on a fresh read-only
    /// connection. The connection is closed before returning, on success or
    /// failure. Input holding more than one statement is refused before any
    /// of it runs.
    pub async fn run_readonly(&self, sql: &str) -> Result<QueryOutput> {
        ensure_single_statement(sql)?;
        let options = self.options.clone().read_only(true);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|err| EngineError::storage("failed opening read-only connection", err))?;

        let output = fetch_with_columns(&mut conn, sql).await;
        if let Err(err) = conn.close().await {
            tracing::warn!(error = %err, "failed closing read-only connection");
        }
        output
    }
}

/// Fails when anything other than whitespace, comments or `;` follows the
/// first statement separator. Separators inside literals and quoted
/// identifiers are not counted.
fn ensure_single_statement(sql: &str) -> Result<()> {
    let tokens = Tokenizer::new(&SQLiteDialect {}, sql)
        .tokenize()
        .map_err(|err| EngineError::storage("query failed", err))?;
    let mut separated = false;
    for token in tokens {
        match token {
            Token::SemiColon => separated = true,
            Token::Whitespace(_) | Token::EOF => {}
            _ if separated => {
                return Err(EngineError::Storage(
                    "only one statement can be executed at a time".into(),
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

async fn fetch_with_columns(conn: &mut SqliteConnection, sql: &str) -> Result<QueryOutput> {
    let statement = (&mut *conn)
        .prepare(sql)
        .await
        .map_err(|err| EngineError::storage("query failed", err))?;
    let columns = statement
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();
    let rows = statement
        .query()
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| EngineError::storage("query failed", err))?;
    Ok(QueryOutput {
        columns,
        rows: rows.iter().map(row_to_json).collect(),
    })
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Text(text) => query.bind(text.as_str()),
            SqlValue::Integer(value) => query.bind(*value),
        };
    }
    query
}

fn row_to_json(row: &SqliteRow) -> JsonRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| (column.name().to_string(), cell_to_json(row, index)))
        .collect()
}

/// Converts by the value's runtime storage class rather than the declared
/// column type; expressions such as `SUM(Amount)` have no declared type.
fn cell_to_json(row: &SqliteRow, index: usize) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_info = raw.type_info();
    match type_info.name() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "NUMERIC" => row
            .try_get::<f64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seeded() -> (TempDir, DisbursementStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.db");
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::query(schema::CREATE_TABLE)
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO disbursements (Organization, FiscalYear, VendorName, Amount, TransactionDate) \
             VALUES ('Office A', 2023, 'Acme', 10.5, '2023-02-01'), \
                    ('office b', 2022, NULL, 3, '2022-05-01')",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();
        let store = DisbursementStore::open(&path, 2).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = DisbursementStore::open(dir.path().join("absent.db"), 1)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Storage(_)));
    }

    #[tokio::test]
    async fn converts_by_storage_class() {
        let (_dir, store) = seeded().await;
        let out = store
            .run_readonly(
                "SELECT VendorName, FiscalYear, Amount, SUM(Amount) AS total_amount \
                 FROM disbursements WHERE Organization = 'Office A'",
            )
            .await
            .unwrap();
        assert_eq!(
            out.columns,
            vec!["VendorName", "FiscalYear", "Amount", "total_amount"]
        );
        let row = &out.rows[0];
        assert_eq!(row["VendorName"], Value::from("Acme"));
        assert_eq!(row["FiscalYear"], Value::from(2023));
        assert_eq!(row["Amount"], Value::from(10.5));
        assert_eq!(row["total_amount"], Value::from(10.5));
    }

    #[tokio::test]
    async fn columns_reported_without_rows() {
        let (_dir, store) = seeded().await;
        let out = store
            .run_readonly("SELECT VendorName FROM disbursements WHERE 1 = 0")
            .await
            .unwrap();
        assert_eq!(out.columns, vec!["VendorName"]);
        assert!(out.rows.is_empty());
    }

    #[test]
    fn single_statement_accepts_trailing_separators_and_literals() {
        for sql in [
            "SELECT Amount FROM disbursements",
            "SELECT Amount FROM disbursements;",
            "SELECT Amount FROM disbursements ;  ; -- done\n",
            "SELECT Amount FROM disbursements WHERE Description = 'a; SELECT 1' LIMIT 5",
            "SELECT \"odd;name\" FROM disbursements /* ; SELECT 2 */",
        ] {
            assert!(ensure_single_statement(sql).is_ok(), "{sql}");
        }
    }

    #[test]
    fn single_statement_rejects_stacked_statements() {
        for sql in [
            "SELECT Amount FROM disbursements; SELECT name FROM sqlite_master",
            "SELECT Amount FROM disbursements LIMIT 1;SELECT 1 LIMIT 5000",
            "SELECT Amount FROM disbursements; -- x\n SELECT 1",
        ] {
            let err = ensure_single_statement(sql).unwrap_err();
            assert!(err.to_string().contains("one statement"), "{sql}");
        }
    }

    #[tokio::test]
    async fn stacked_statements_do_not_run() {
        let (_dir, store) = seeded().await;
        let err = store
            .run_readonly("SELECT Organization FROM disbursements LIMIT 1; SELECT name FROM sqlite_master")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
    }

    #[tokio::test]
    async fn null_cells_become_null() {
        let (_dir, store) = seeded().await;
        let out = store
            .run_readonly("SELECT VendorName FROM disbursements WHERE FiscalYear = 2022")
            .await
            .unwrap();
        assert_eq!(out.rows[0]["VendorName"], Value::Null);
    }
}
