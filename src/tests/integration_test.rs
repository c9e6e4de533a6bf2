//! Router-level tests for the gateway.
//!
//! The LLM and the database are replaced by in-process stand-ins so these
//! tests drive the full HTTP surface without any network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::SqlGenerator;
use crate::db::{QueryExecutor, ResultSet, Row};
use crate::error::GatewayError;
use crate::format::Format;
use crate::gateway::routes::create_router;
use crate::gateway::service::GatewayService;
use crate::gateway::state::AppState;
use crate::sql::{ExecutableSql, Extracted, extract};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Answers every question with the same model reply.
struct StaticGenerator {
    reply: String,
    questions: Mutex<Vec<String>>,
}

impl StaticGenerator {
    fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            questions: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SqlGenerator for StaticGenerator {
    async fn generate(&self, question: &str) -> Result<Extracted, GatewayError> {
        self.questions.lock().unwrap().push(question.to_string());
        extract(&self.reply).map_err(|e| GatewayError::Generation(e.to_string()))
    }
}

/// Records every statement it is asked to run and returns fixed rows.
#[derive(Default)]
struct RecordingExecutor {
    calls: AtomicUsize,
    last_sql: Mutex<Option<String>>,
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, sql: &ExecutableSql) -> Result<ResultSet, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_sql.lock().unwrap() = Some(sql.as_str().to_string());

        let mut row = Row::new();
        row.push("count", json!(7));
        Ok(vec![row])
    }
}

struct Harness {
    state: AppState,
    generator: Arc<StaticGenerator>,
    executor: Arc<RecordingExecutor>,
}

impl Harness {
    fn new(reply: &str) -> Self {
        Self::with_key(reply, None)
    }

    fn with_key(reply: &str, api_key: Option<&str>) -> Self {
        let generator = StaticGenerator::new(reply);
        let executor = Arc::new(RecordingExecutor::default());
        let service = GatewayService::new(generator.clone(), executor.clone())
            .with_api_key(api_key.map(String::from));

        Self {
            state: AppState::new(service).with_format(Format::Json),
            generator,
            executor,
        }
    }

    fn router(&self) -> Router {
        create_router().with_state(self.state.clone())
    }

    fn executor_calls(&self) -> usize {
        self.executor.calls.load(Ordering::SeqCst)
    }
}

const COUNT_REPLY: &str = r#"{"sql":"SELECT COUNT(*) FROM vendors","notes":"count"}"#;

/// Helper to make a request to the test router.
async fn make_request(
    router: Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, Bytes) {
    send(router, method, uri, body, &[]).await
}

async fn send(
    router: Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
    headers: &[(&str, &str)],
) -> (StatusCode, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status, body)
}

fn json_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap()
}

// ============================================================================
// Health Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoints_report_ok() {
    let harness = Harness::new(COUNT_REPLY);

    for uri in ["/", "/health", "/status"] {
        let (status, body) = make_request(harness.router(), "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(
            json_body(&body),
            json!({"status": "ok", "message": "nlsql gateway running"})
        );
    }
    assert_eq!(harness.executor_calls(), 0);
}

#[tokio::test]
async fn test_health_ignores_api_key() {
    let harness = Harness::with_key(COUNT_REPLY, Some("secret"));
    let (status, _) = make_request(harness.router(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Question Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_question_returns_sql_notes_and_rows() {
    let harness = Harness::new(COUNT_REPLY);

    let body = r#"{"question": "How many vendors are there?"}"#;
    let (status, response) =
        make_request(harness.router(), "POST", "/generate-sql", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&response),
        json!({
            "sql": "SELECT COUNT(*) FROM vendors LIMIT 200",
            "notes": "count",
            "rows": [{"count": 7}]
        })
    );
    assert_eq!(
        harness.executor.last_sql.lock().unwrap().as_deref(),
        Some("SELECT COUNT(*) FROM vendors LIMIT 200")
    );
}

#[tokio::test]
async fn test_route_aliases_share_one_handler() {
    let harness = Harness::new(COUNT_REPLY);

    for uri in ["/generate-sql", "/chat", "/query"] {
        let (status, _) =
            make_request(harness.router(), "POST", uri, Some(r#"{"question":"q"}"#)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
    assert_eq!(harness.executor_calls(), 3);
}

#[tokio::test]
async fn test_query_field_is_accepted() {
    let harness = Harness::new(COUNT_REPLY);

    let body = r#"{"query": "vendor count"}"#;
    let (status, _) = make_request(harness.router(), "POST", "/chat", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        harness.generator.questions.lock().unwrap().as_slice(),
        ["vendor count"]
    );
}

#[tokio::test]
async fn test_missing_question_is_bad_request() {
    let harness = Harness::new(COUNT_REPLY);

    let (status, body) = make_request(harness.router(), "POST", "/query", Some("{}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"].is_string());
    assert!(harness.generator.questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let harness = Harness::new(COUNT_REPLY);

    let body = r#"{"question": invalid_json}"#;
    let (status, response) = make_request(harness.router(), "POST", "/query", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&response)["error"].is_string());
}

#[tokio::test]
async fn test_empty_body_is_bad_request() {
    let harness = Harness::new(COUNT_REPLY);
    let (status, _) = make_request(harness.router(), "POST", "/query", Some("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_content_type_is_bad_request() {
    let harness = Harness::new(COUNT_REPLY);

    let request = Request::builder()
        .method("POST")
        .uri("/query")
        .header("content-type", "text/plain")
        .body(Body::from(r#"{"question":"q"}"#))
        .unwrap();
    let response = harness.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.executor_calls(), 0);
}

#[tokio::test]
async fn test_missing_content_type_defaults_to_json() {
    let harness = Harness::new(COUNT_REPLY);

    let request = Request::builder()
        .method("POST")
        .uri("/query")
        .body(Body::from(r#"{"question":"q"}"#))
        .unwrap();
    let response = harness.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Validation Tests
// ============================================================================

#[tokio::test]
async fn test_delete_is_rejected_without_execution() {
    let harness = Harness::new(r#"{"sql":"DELETE FROM invoices","notes":"x"}"#);

    let body = r#"{"question": "remove all invoices"}"#;
    let (status, response) = make_request(harness.router(), "POST", "/query", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(&response),
        json!({"error": "only read-only SELECT queries are permitted"})
    );
    assert_eq!(harness.executor_calls(), 0);
}

#[tokio::test]
async fn test_comment_smuggled_statement_is_rejected() {
    let harness = Harness::new(r#"{"sql":"SELECT 1 /* -- */ ; DROP TABLE vendors"}"#);

    let (status, _) =
        make_request(harness.router(), "POST", "/query", Some(r#"{"question":"q"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(harness.executor_calls(), 0);
}

#[tokio::test]
async fn test_reply_without_sql_is_server_error() {
    let harness = Harness::new("Sorry, I can't answer that.");

    let (status, response) =
        make_request(harness.router(), "POST", "/query", Some(r#"{"question":"q"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        json_body(&response)["error"]
            .as_str()
            .unwrap()
            .contains("SQL generation failed")
    );
    assert_eq!(harness.executor_calls(), 0);
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_missing_api_key_is_unauthorized() {
    let harness = Harness::with_key(COUNT_REPLY, Some("secret"));

    let (status, body) =
        make_request(harness.router(), "POST", "/query", Some(r#"{"question":"q"}"#)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body), json!({"error": "Invalid API key"}));
    assert!(harness.generator.questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_api_key_is_unauthorized() {
    let harness = Harness::with_key(COUNT_REPLY, Some("secret"));

    let (status, _) = send(
        harness.router(),
        "POST",
        "/query",
        Some(r#"{"question":"q"}"#),
        &[("x-api-key", "nope")],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unauthorized_checked_before_body() {
    let harness = Harness::with_key(COUNT_REPLY, Some("secret"));

    let (status, _) = make_request(harness.router(), "POST", "/query", Some("not json")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_correct_api_key_is_accepted() {
    let harness = Harness::with_key(COUNT_REPLY, Some("secret"));

    let (status, _) = send(
        harness.router(),
        "POST",
        "/query",
        Some(r#"{"question":"q"}"#),
        &[("X-API-Key", "secret")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Rate Limiting Tests
// ============================================================================

#[tokio::test]
async fn test_rate_limiter_rejects_burst() {
    let harness = Harness::new(COUNT_REPLY);
    let state = harness.state.clone().with_rate_limiter(1);

    let first = create_router().with_state(state.clone());
    let (status, _) = make_request(first, "POST", "/query", Some(r#"{"question":"q"}"#)).await;
    assert_eq!(status, StatusCode::OK);

    let second = create_router().with_state(state);
    let (status, body) = make_request(second, "POST", "/query", Some(r#"{"question":"q"}"#)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(&body), json!({"error": "Rate limit exceeded"}));
}

#[tokio::test]
async fn test_zero_qps_disables_limiter() {
    let harness = Harness::new(COUNT_REPLY);
    let state = harness.state.clone().with_rate_limiter(0);
    assert!(state.rate_limiter.is_none());
}

// ============================================================================
// Router Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let harness = Harness::new(COUNT_REPLY);
    let (status, _) = make_request(harness.router(), "POST", "/unknown", Some("{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_method_on_query_endpoint() {
    let harness = Harness::new(COUNT_REPLY);
    let (status, _) = make_request(harness.router(), "GET", "/query", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_response_content_type_is_json() {
    let harness = Harness::new(COUNT_REPLY);

    let request = Request::builder()
        .method("POST")
        .uri("/generate-sql")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"question":"q"}"#))
        .unwrap();
    let response = harness.router().oneshot(request).await.unwrap();

    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap_or(""));
    assert!(content_type.unwrap_or("").contains("application/json"));
}

// ============================================================================
// Concurrent Request Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_requests() {
    let harness = Harness::new(COUNT_REPLY);

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let state = harness.state.clone();
            tokio::spawn(async move {
                let router = create_router().with_state(state);
                let body = format!(r#"{{"question": "question {}"}}"#, i);
                let (status, _) = make_request(router, "POST", "/query", Some(&body)).await;
                status
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(harness.executor_calls(), 10);
}
