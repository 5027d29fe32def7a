//! HTTP surface.
//! Routes: `GET /health`, `GET /api/meta`, `GET /api/disbursements`, `POST /api/ask`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::analyst::Analyst;
use crate::error::{EngineError, Result};
use crate::query::ListingParams;
use crate::store::DisbursementStore;

/// Shared state threaded through all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DisbursementStore>,
    /// `None` when no model is configured; `/api/ask` then answers 500.
    pub analyst: Option<Arc<Analyst>>,
}

impl AppState {
    pub fn new(store: Arc<DisbursementStore>) -> Self {
        Self {
            store,
            analyst: None,
        }
    }

    pub fn with_analyst(mut self, analyst: Analyst) -> Self {
        self.analyst = Some(Arc::new(analyst));
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/meta", get(handle_meta))
        .route("/api/disbursements", get(handle_disbursements))
        .route("/api/ask", post(handle_ask))
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, ask_enabled = state.analyst.is_some(), "listening");
    axum::serve(listener, build_router(state).into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await
        .map_err(|err| EngineError::Protocol(format!("server error: {err}")))?;
    Ok(())
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        tracing::error!(error = %err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "disbursements"}))
}

async fn handle_meta(State(state): State<AppState>) -> std::result::Result<Response, ApiError> {
    let meta = state.store.meta().await?;
    Ok(Json(meta).into_response())
}

async fn handle_disbursements(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> std::result::Result<Response, ApiError> {
    let query = params.into_query();
    let page = state.store.list(&query).await?;
    Ok(Json(page).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let Some(analyst) = state.analyst.as_ref() else {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server is not configured with an OpenAI API key",
        ));
    };

    // Unreadable bodies count as an empty request.
    let request: AskRequest = serde_json::from_slice(&body).unwrap_or_default();
    let question = request.question.unwrap_or_default();
    let question = question.trim();
    if question.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Missing 'question'"));
    }

    let response = analyst.ask(question).await?;
    Ok(Json(response).into_response())
}
