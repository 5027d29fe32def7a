//! Read API and natural-language SQL assistant over a SQLite table of
//! government disbursements.
//!
//! The crate provides:
//! - A listing query builder that turns request filters into parameterized SQL (`ListingQuery`).
//! - A read-only guard for model-written SQL (`SqlGuard`).
//! - A store that runs both against SQLite (`DisbursementStore`).
//! - An `Analyst` that answers questions through one `run_sql` tool round trip.
//! - An axum router exposing all of it (behind the `server` feature).

mod analyst;
mod config;
mod error;
mod llm;
mod message;
mod query;
mod safety;
pub mod schema;
#[cfg(feature = "server")]
mod server;
mod sql_tool;
mod store;
mod telemetry;
mod tool;

pub use analyst::{Analyst, AskResponse, QueryReport};
pub use config::{AppConfig, DatabaseConfig, LogFormat, LoggingConfig, ModelConfig, ServerConfig};
pub use error::{EngineError, Result};
pub use llm::{LanguageModel, ModelCompletion, OpenAIClient, StubModel};
pub use message::{Message, Role, ToolCall, ToolResult};
pub use query::{
    FilterCriteria, ListingParams, ListingQuery, Pagination, SortColumn, SortDirection, SortSpec,
    SqlValue, Statement, DEFAULT_LIMIT, MAX_LIMIT,
};
pub use safety::{SqlGuard, UnsafeQuery, DEFAULT_ROW_CEILING};
#[cfg(feature = "server")]
pub use server::{build_router, serve, AppState};
pub use sql_tool::{RunSqlTool, SqlToolPayload, RUN_SQL};
pub use store::{DisbursementStore, JsonRow, ListingPage, Meta, QueryOutput};
pub use telemetry::{env_filter, init_tracing};
pub use tool::{Tool, ToolDescription, ToolRegistry};
