//! The `run_sql` tool offered to the language model.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::safety::SqlGuard;
use crate::store::{DisbursementStore, JsonRow};
use crate::tool::Tool;

pub const RUN_SQL: &str = "run_sql";

/// What the model (and the API caller) sees after a `run_sql` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlToolPayload {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<JsonRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rowcount: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SqlToolPayload {
    /// Failure payload; `sql` is the statement as the model wrote it.
    pub fn failed(sql: impl Into<String>, error: impl ToString) -> Self {
        Self {
            ok: false,
            sql: Some(sql.into()),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

pub struct RunSqlTool {
    store: Arc<DisbursementStore>,
    guard: SqlGuard,
}

impl RunSqlTool {
    pub fn new(store: Arc<DisbursementStore>, guard: SqlGuard) -> Self {
        Self { store, guard }
    }

    /// Validates and executes `sql`. Never fails: problems are reported in
    /// the payload so the model can explain them.
    pub async fn execute(&self, sql: &str) -> SqlToolPayload {
        let safe_sql = match self.guard.enforce(sql) {
            Ok(safe_sql) => safe_sql,
            Err(reason) => {
                tracing::warn!(%reason, sql, "rejected model-written SQL");
                return SqlToolPayload::failed(sql, reason);
            }
        };
        tracing::debug!(sql = %safe_sql, "running model-written SQL");
        match self.store.run_readonly(&safe_sql).await {
            Ok(output) => SqlToolPayload {
                ok: true,
                rowcount: Some(output.rows.len()),
                sql: Some(safe_sql),
                columns: Some(output.columns),
                rows: Some(output.rows),
                error: None,
            },
            Err(err) => {
                tracing::error!(error = %err, sql = %safe_sql, "model-written SQL failed");
                SqlToolPayload::failed(sql, err)
            }
        }
    }
}

#[async_trait]
impl Tool for RunSqlTool {
    fn name(&self) -> &str {
        RUN_SQL
    }

    fn description(&self) -> &str {
        "Execute a read-only SQLite SELECT on the disbursements table and return rows."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "A single SELECT statement that queries the disbursements table."
                }
            },
            "required": ["sql"]
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let sql = input.get("sql").and_then(Value::as_str).unwrap_or_default();
        let payload = self.execute(sql).await;
        Ok(serde_json::to_value(payload)?)
    }
}
