//! Router-level tests for the HTTP endpoints.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use disbursements_engine::{build_router, Analyst, AppState, Role, SqlGuard, StubModel};

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
    let resp = build_router(state).oneshot(request).await.expect("resp");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1 << 20)
        .await
        .expect("body");
    let value = serde_json::from_slice(&body).expect("json body");
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("req")
}

fn ask(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/ask")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("req")
}

#[tokio::test]
async fn health_returns_ok() {
    let (_dir, store) = common::open_store().await;
    let (status, body) = send(AppState::new(store), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn listing_uses_defaults() {
    let (_dir, store) = common::open_store().await;
    let (status, body) = send(AppState::new(store), get("/api/disbursements")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 8);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["rows"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn listing_clamps_and_ignores_bad_parameters() {
    let (_dir, store) = common::open_store().await;
    let (status, body) = send(
        AppState::new(store.clone()),
        get("/api/disbursements?limit=999&offset=-4&sort=bogus&dir=sideways"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 200);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["rows"][0]["TransactionDate"], "2023-09-30");

    let (status, body) = send(
        AppState::new(store),
        get("/api/disbursements?limit=abc&offset=&fiscal_year="),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["total"], 8);
}

#[tokio::test]
async fn listing_filters_and_pages() {
    let (_dir, store) = common::open_store().await;
    let (status, body) = send(
        AppState::new(store),
        get("/api/disbursements?q=acme&limit=2&sort=amount&dir=desc"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["VendorName"], "ACME Supply");
    assert_eq!(rows[1]["VendorName"], "Acme Corp");
}

#[tokio::test]
async fn meta_lists_years_and_organizations() {
    let (_dir, store) = common::open_store().await;
    let (status, body) = send(AppState::new(store), get("/api/meta")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fiscalYears"], json!([2023, 2022, 2021]));
    assert_eq!(body["organizations"][0], "committee on budget");
}

#[tokio::test]
async fn ask_without_model_is_a_server_error() {
    let (_dir, store) = common::open_store().await;
    let (status, body) = send(AppState::new(store), ask(r#"{"question":"who got paid?"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn ask_requires_a_question() {
    let (_dir, store) = common::open_store().await;
    let model = StubModel::new(vec![]);
    let state = AppState::new(store.clone()).with_analyst(Analyst::new(model.clone(), store, SqlGuard::default()));

    for body in [r#"{}"#, r#"{"question":"   "}"#, "not json", r#"{"question": 7}"#] {
        let (status, value) = send(state.clone(), ask(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(value["error"], "Missing 'question'");
    }
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn ask_answers_directly_without_tool_call() {
    let (_dir, store) = common::open_store().await;
    let model = StubModel::new(vec![r#"{"action":"respond","content":"I can only answer spending questions."}"#.into()]);
    let state = AppState::new(store.clone()).with_analyst(Analyst::new(model, store, SqlGuard::default()));

    let (status, body) = send(state, ask(r#"{"question":"hello"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"answer": "I can only answer spending questions."}));
}

#[tokio::test]
async fn ask_runs_safe_sql_and_returns_rows() {
    let (_dir, store) = common::open_store().await;
    let model = StubModel::new(vec![
        json!({
            "action": "call_tool",
            "name": "run_sql",
            "arguments": {"sql": "select VendorName, Amount from disbursements where FiscalYear=2023 order by Amount desc"}
        })
        .to_string(),
        r#"{"action":"respond","content":"Landlord LLC received the most in 2023."}"#.into(),
    ]);
    let state = AppState::new(store.clone())
        .with_analyst(Analyst::new(model.clone(), store, SqlGuard::default()));

    let (status, body) = send(state, ask(r#"{"question":"Who was paid most in 2023?"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["answer"], "Landlord LLC received the most in 2023.");
    assert_eq!(
        body["sql"],
        "select VendorName, Amount from disbursements where FiscalYear=2023 order by Amount desc LIMIT 5000"
    );
    assert_eq!(body["columns"], json!(["VendorName", "Amount"]));
    assert_eq!(body["rowcount"], 4);
    assert_eq!(body["rows"][0], json!({"VendorName": "Landlord LLC", "Amount": 2500.0}));
    assert_eq!(body["error"], Value::Null);

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    assert_eq!(second.len(), 4);
    assert_eq!(second[2].role, Role::Assistant);
    assert_eq!(second[2].tool_call.as_ref().unwrap().name, "run_sql");
    assert_eq!(second[3].role, Role::Tool);
    assert!(second[3].content.contains("\"rowcount\":4"));
}

#[tokio::test]
async fn ask_reports_rejected_sql_without_running_it() {
    let (_dir, store) = common::open_store().await;
    let model = StubModel::new(vec![
        r#"{"action":"call_tool","name":"run_sql","arguments":{"sql":"DELETE FROM disbursements"}}"#.into(),
        r#"{"action":"respond","content":"I cannot modify data."}"#.into(),
    ]);
    let state = AppState::new(store.clone())
        .with_analyst(Analyst::new(model.clone(), store.clone(), SqlGuard::default()));

    let (status, body) = send(state.clone(), ask(r#"{"question":"delete everything"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["sql"], "DELETE FROM disbursements");
    assert_eq!(body["error"], "Only SELECT statements are allowed.");
    assert_eq!(body["rows"], Value::Null);
    assert_eq!(body["answer"], "I cannot modify data.");

    let tool_message = &model.requests()[1][3];
    assert!(tool_message.content.contains("\"ok\":false"));

    let (_, listing) = send(state, get("/api/disbursements")).await;
    assert_eq!(listing["total"], 8);
}

#[tokio::test]
async fn ask_surfaces_model_failures() {
    let (_dir, store) = common::open_store().await;
    let model = StubModel::new(vec![]);
    let state = AppState::new(store.clone()).with_analyst(Analyst::new(model, store, SqlGuard::default()));

    let (status, body) = send(state, ask(r#"{"question":"anything"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("ran out of scripted responses"));
}

#[tokio::test]
async fn ask_handles_unknown_tools() {
    let (_dir, store) = common::open_store().await;
    let model = StubModel::new(vec![
        r#"{"action":"call_tool","name":"drop_everything","arguments":{}}"#.into(),
        "Sorry.".into(),
    ]);
    let state = AppState::new(store.clone())
        .with_analyst(Analyst::new(model, Arc::clone(&store), SqlGuard::default()));

    let (status, body) = send(state, ask(r#"{"question":"x"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["sql"], "");
    assert!(body["error"].as_str().unwrap().contains("drop_everything"));
    assert_eq!(body["answer"], "Sorry.");
}

#[tokio::test]
async fn ask_refuses_stacked_statements() {
    let (_dir, store) = common::open_store().await;
    let model = StubModel::new(vec![
        json!({
            "action": "call_tool",
            "name": "run_sql",
            "arguments": {"sql": "SELECT Organization FROM disbursements LIMIT 1; SELECT name FROM sqlite_master"}
        })
        .to_string(),
        r#"{"action":"respond","content":"That query could not run."}"#.into(),
    ]);
    let state = AppState::new(store.clone())
        .with_analyst(Analyst::new(model, store, SqlGuard::default()));

    let (status, body) = send(state, ask(r#"{"question":"list the tables"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["rows"], Value::Null);
    assert!(body["error"].as_str().unwrap().contains("one statement"));
    assert_eq!(body["answer"], "That query could not run.");
}
