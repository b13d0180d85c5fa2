use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use tablegate::prelude::*;
use tablegate::server::{AppState, create_router};
use tablegate::translate::{TranslateOptions, Translator};

/// Records every statement and answers with canned data.
#[derive(Default)]
struct RecordingExecutor {
    statements: Mutex<Vec<CompiledStatement>>,
    rows: Vec<JsonRow>,
    fail: bool,
}

impl RecordingExecutor {
    fn with_rows(rows: Vec<Value>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn recorded(&self) -> Vec<CompiledStatement> {
        self.statements.lock().unwrap().clone()
    }

    fn record(&self, stmt: &CompiledStatement) -> GateResult<()> {
        self.statements.lock().unwrap().push(stmt.clone());
        if self.fail {
            return Err(TableGateError::Connection("pool timed out".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn fetch_rows(&self, stmt: &CompiledStatement) -> GateResult<Vec<JsonRow>> {
        self.record(stmt)?;
        Ok(self.rows.clone())
    }

    async fn execute(&self, stmt: &CompiledStatement) -> GateResult<u64> {
        self.record(stmt)?;
        Ok(1)
    }
}

fn app(executor: Arc<RecordingExecutor>) -> Router {
    app_with(executor, TranslateOptions::default())
}

fn app_with(executor: Arc<RecordingExecutor>, options: TranslateOptions) -> Router {
    let translator = Translator::new(Compiler::default(), options);
    create_router(Arc::new(AppState::new(translator, executor)), true)
}

async fn send(router: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(
        app(Arc::new(RecordingExecutor::default())),
        Method::GET,
        "/health",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_get_table_returns_rows() {
    let exec = Arc::new(RecordingExecutor::with_rows(vec![
        json!({"id": 1, "name": "project1"}),
    ]));
    let (status, body) = send(
        app(exec.clone()),
        Method::GET,
        "/projects?select=id,name&order=name&filters=name=eq.project1&limit=10",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": 1, "name": "project1"}]));

    let recorded = exec.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(
        recorded[0].text,
        "SELECT [id], [name] FROM [dbo].[projects] WHERE [name] = ? ORDER BY [name] LIMIT 10"
    );
    assert_eq!(recorded[0].params[0].value, SqlValue::from("project1"));
}

#[tokio::test]
async fn test_repeated_filters_are_anded() {
    let exec = Arc::new(RecordingExecutor::default());
    let (status, _) = send(
        app(exec.clone()),
        Method::GET,
        "/projects?filters=age%3Dgte.18&filters=name%3Dlike.proj%25",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        exec.recorded()[0].text,
        "SELECT * FROM [dbo].[projects] WHERE [age] >= ? AND [name] LIKE ? LIMIT 1000"
    );
    let values: Vec<_> = exec.recorded()[0].values().cloned().collect();
    assert_eq!(values, vec![SqlValue::from("18"), SqlValue::from("proj%")]);
}

#[tokio::test]
async fn test_object_filter_in_query_string() {
    // filters={"id":{"op":"eq","value":5}}
    let exec = Arc::new(RecordingExecutor::default());
    let (status, _) = send(
        app(exec.clone()),
        Method::DELETE,
        "/projects?filters=%7B%22id%22%3A%7B%22op%22%3A%22eq%22%2C%22value%22%3A5%7D%7D",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        exec.recorded()[0].text,
        "DELETE FROM [dbo].[projects] WHERE [id] = ?"
    );
    assert_eq!(exec.recorded()[0].params[0].value, SqlValue::from("5"));

    // {"id":{"op":"between","value":5}}
    let exec = Arc::new(RecordingExecutor::default());
    let (status, body) = send(
        app(exec.clone()),
        Method::GET,
        "/projects?filters=%7B%22id%22%3A%7B%22op%22%3A%22between%22%2C%22value%22%3A5%7D%7D",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_OPERATOR");
    assert!(exec.recorded().is_empty());
}

#[tokio::test]
async fn test_bad_filter_is_400_and_never_executes() {
    let exec = Arc::new(RecordingExecutor::default());
    let (status, body) = send(
        app(exec.clone()),
        Method::GET,
        "/projects?filters=bad-filter-no-dot",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "FILTER_SYNTAX");
    assert!(exec.recorded().is_empty());
}

#[tokio::test]
async fn test_bad_limit_is_400() {
    let (status, body) = send(
        app(Arc::new(RecordingExecutor::default())),
        Method::GET,
        "/projects?limit=lots",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMETER");
}

#[tokio::test]
async fn test_post_inserts_row() {
    let exec = Arc::new(RecordingExecutor::default());
    let (status, body) = send(
        app(exec.clone()),
        Method::POST,
        "/projects",
        Some(json!({"id": 1, "name": "project1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"rowsAffected": 1}));
    assert_eq!(
        exec.recorded()[0].text,
        "INSERT INTO [dbo].[projects] ([id], [name]) VALUES (?, ?)"
    );
}

#[tokio::test]
async fn test_post_empty_object_inserts_defaults() {
    let exec = Arc::new(RecordingExecutor::default());
    let (status, _) = send(app(exec.clone()), Method::POST, "/projects", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        exec.recorded()[0].text,
        "INSERT INTO [dbo].[projects] DEFAULT VALUES"
    );
}

#[tokio::test]
async fn test_post_invalid_json_is_400() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/projects")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(Arc::new(RecordingExecutor::default()))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_and_put_update_rows() {
    for method in [Method::PATCH, Method::PUT] {
        let exec = Arc::new(RecordingExecutor::default());
        let (status, body) = send(
            app(exec.clone()),
            method,
            "/projects?filters=id=eq.5",
            Some(json!({"name": "renamed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"rowsAffected": 1}));
        assert_eq!(
            exec.recorded()[0].text,
            "UPDATE [dbo].[projects] SET [name] = ? WHERE [id] = ?"
        );
    }
}

#[tokio::test]
async fn test_unfiltered_delete_is_refused() {
    let exec = Arc::new(RecordingExecutor::default());
    let (status, body) = send(app(exec.clone()), Method::DELETE, "/projects", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATEMENT");
    assert!(exec.recorded().is_empty());

    let exec = Arc::new(RecordingExecutor::default());
    let options = TranslateOptions {
        allow_unfiltered_writes: true,
        ..TranslateOptions::default()
    };
    let (status, _) = send(app_with(exec.clone(), options), Method::DELETE, "/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exec.recorded()[0].text, "DELETE FROM [dbo].[projects]");
}

#[tokio::test]
async fn test_delete_with_filter() {
    let exec = Arc::new(RecordingExecutor::default());
    let (status, _) = send(
        app(exec.clone()),
        Method::DELETE,
        "/projects?filters=id=eq.5",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        exec.recorded()[0].text,
        "DELETE FROM [dbo].[projects] WHERE [id] = ?"
    );
}

#[tokio::test]
async fn test_rpc_table_function_returns_rows() {
    let exec = Arc::new(RecordingExecutor::with_rows(vec![json!({"total": 42})]));
    let (status, body) = send(
        app(exec.clone()),
        Method::POST,
        "/rpc/getTotals",
        Some(json!({
            "function": true,
            "returns": "TABLE",
            "args": [{"name": "year", "type": "int", "value": 2024}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"total": 42}]));
    assert_eq!(
        exec.recorded()[0].text,
        "SELECT * FROM [dbo].[getTotals]( ? )"
    );
}

#[tokio::test]
async fn test_rpc_procedure_reports_rows_affected() {
    let exec = Arc::new(RecordingExecutor::default());
    let (status, body) = send(app(exec.clone()), Method::POST, "/rpc/rebuildIndex", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"rowsAffected": 1}));
    assert_eq!(exec.recorded()[0].text, "{call [dbo].[rebuildIndex]()}");
}

#[tokio::test]
async fn test_executor_failure_maps_to_503() {
    let (status, body) = send(
        app(Arc::new(RecordingExecutor::failing())),
        Method::GET,
        "/projects",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "CONNECTION_ERROR");
}
