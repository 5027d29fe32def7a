//! Natural-language questions answered with one `run_sql` round trip.
//!
//! The model sees the question and may ask for a single `run_sql` call. The
//! call is validated and executed here, its payload is handed back, and the
//! model's second reply becomes the answer. No tools are offered on the
//! second round.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::llm::{LanguageModel, OpenAIClient};
use crate::message::{Message, ToolResult};
use crate::safety::SqlGuard;
use crate::schema::SCHEMA_TEXT;
use crate::sql_tool::{RunSqlTool, SqlToolPayload};
use crate::store::{DisbursementStore, JsonRow};
use crate::tool::ToolRegistry;

fn system_prompt(row_ceiling: u32) -> String {
    format!(
        "You are a careful data analyst for a single SQLite database. Answer questions by writing \
safe, efficient SELECT queries against the disbursements table, then explain the results briefly.

Schema:
{SCHEMA_TEXT}

Rules:
- Only read data from the disbursements table. No PRAGMA, no writes, no DDL.
- Prefer aggregates when asked about biggest/smallest/top/bottom (e.g., SUM(Amount) grouped by VendorName).
- Use FiscalYear when the user references a year; otherwise use TransactionDate for date ranges.
- Include a LIMIT (e.g., {row_ceiling}) in result sets unless user asks for more.
- Choose sensible columns in SELECT (avoid SELECT *).
- For amounts, alias aggregates as total_amount.
- If the question is ambiguous, choose a reasonable interpretation and note it.
- Always exclude VendorName values that are null, empty, or only contain spaces.
When you need database results, call the run_sql tool with a single SELECT statement.
"
    )
}

/// Query details attached to an answer that used `run_sql`. Absent values
/// serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    pub sql: Option<String>,
    pub columns: Option<Vec<String>>,
    pub rows: Option<Vec<JsonRow>>,
    pub rowcount: Option<usize>,
    pub ok: bool,
    pub error: Option<String>,
}

impl From<SqlToolPayload> for QueryReport {
    fn from(payload: SqlToolPayload) -> Self {
        Self {
            sql: payload.sql,
            columns: payload.columns,
            rows: payload.rows,
            rowcount: payload.rowcount,
            ok: payload.ok,
            error: payload.error,
        }
    }
}

/// Body of a successful `/api/ask` response. Without a tool call only
/// `answer` is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    pub answer: Option<String>,
    #[serde(flatten)]
    pub query: Option<QueryReport>,
}

pub struct Analyst {
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    system_prompt: String,
}

impl Analyst {
    pub fn new(model: Arc<dyn LanguageModel>, store: Arc<DisbursementStore>, guard: SqlGuard) -> Self {
        let system_prompt = system_prompt(guard.row_ceiling());
        let mut tools = ToolRegistry::new();
        tools.register(RunSqlTool::new(store, guard));
        Self {
            model,
            tools,
            system_prompt,
        }
    }

    /// Builds an analyst backed by the OpenAI chat completions API.
    pub fn from_config(
        cfg: &ModelConfig,
        store: Arc<DisbursementStore>,
        guard: SqlGuard,
    ) -> Result<Self> {
        let client = OpenAIClient::from_config(cfg)?;
        Ok(Self::new(Arc::new(client), store, guard))
    }

    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let mut messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(question),
        ];

        let first = self
            .model
            .complete_chat(&messages, &self.tools.describe())
            .await?;
        let Some(call) = first.tool_calls.into_iter().next() else {
            tracing::debug!("model answered without a tool call");
            return Ok(AskResponse {
                answer: first.content,
                query: None,
            });
        };

        let sql = call
            .arguments
            .get("sql")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        tracing::info!(tool = %call.name, %sql, "model requested tool call");

        let payload = match self.tools.call(&call.name, call.arguments.clone()).await {
            Ok(value) => serde_json::from_value::<SqlToolPayload>(value)
                .unwrap_or_else(|err| SqlToolPayload::failed(&sql, err)),
            Err(err) => SqlToolPayload::failed(&sql, err),
        };

        messages.push(Message::assistant_tool_call(
            first.content.unwrap_or_default(),
            call.clone(),
        ));
        messages.push(Message::tool(ToolResult {
            name: call.name,
            tool_call_id: call.id,
            output: serde_json::to_value(&payload)?,
        }));

        let second = self.model.complete_chat(&messages, &[]).await?;
        Ok(AskResponse {
            answer: second.content,
            query: Some(payload.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_carries_schema_and_ceiling() {
        let prompt = system_prompt(250);
        assert!(prompt.contains("Table: disbursements"));
        assert!(prompt.contains("LIMIT (e.g., 250)"));
        assert!(prompt.contains("run_sql"));
    }

    #[test]
    fn answer_without_query_serializes_alone() {
        let response = AskResponse {
            answer: Some("hello".into()),
            query: None,
        };
        assert_eq!(serde_json::to_value(response).unwrap(), json!({"answer": "hello"}));
    }

    #[test]
    fn answer_with_query_reports_every_field() {
        let response = AskResponse {
            answer: Some("none found".into()),
            query: Some(SqlToolPayload::failed("select 1", "Query must read from the disbursements table.").into()),
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({
                "answer": "none found",
                "sql": "select 1",
                "columns": null,
                "rows": null,
                "rowcount": null,
                "ok": false,
                "error": "Query must read from the disbursements table."
            })
        );
    }
}
