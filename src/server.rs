//! HTTP server.
//!
//! | Route | Statement |
//! |-------|-----------|
//! | `GET /{table}` | SELECT |
//! | `POST /{table}` | INSERT |
//! | `PATCH`/`PUT /{table}` | UPDATE |
//! | `DELETE /{table}` | DELETE |
//! | `POST /rpc/{routine}` | function or procedure call |

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::engine::{JsonRow, SqlxExecutor, StatementExecutor};
use crate::error::{GateResult, TableGateError};
use crate::translate::{QueryParams, RoutineBody, TranslateOptions, Translator};
use crate::transpiler::Compiler;

/// Shared state for every request.
pub struct AppState {
    pub translator: Translator,
    pub executor: Arc<dyn StatementExecutor>,
}

impl AppState {
    pub fn new(translator: Translator, executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            translator,
            executor,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct RowsAffected {
    #[serde(rename = "rowsAffected")]
    pub rows_affected: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for TableGateError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.is_client_error() {
            tracing::warn!("Rejected request: {}", self);
        } else {
            tracing::error!("Request failed: {}", self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Create the router.
pub fn create_router(state: Arc<AppState>, cors_enabled: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/rpc/{routine}", post(call_routine))
        .route(
            "/{table}",
            get(read_rows)
                .post(insert_row)
                .patch(update_rows)
                .put(update_rows)
                .delete(delete_rows),
        )
        .layer(TraceLayer::new_for_http());

    let router = if cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn read_rows(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> GateResult<Json<Vec<JsonRow>>> {
    let query = QueryParams::from_pairs(pairs);
    let request = state.translator.read(&table, &query)?;
    let stmt = state.translator.compile(&request)?;
    tracing::debug!(sql = %stmt.text, params = stmt.params.len(), "select");
    let rows = state.executor.fetch_rows(&stmt).await?;
    Ok(Json(rows))
}

pub async fn insert_row(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    body: Bytes,
) -> GateResult<(StatusCode, Json<RowsAffected>)> {
    let request = state.translator.insert(&table, json_body(&body)?)?;
    let stmt = state.translator.compile(&request)?;
    tracing::debug!(sql = %stmt.text, params = stmt.params.len(), "insert");
    let rows_affected = state.executor.execute(&stmt).await?;
    Ok((StatusCode::CREATED, Json(RowsAffected { rows_affected })))
}

pub async fn update_rows(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> GateResult<Json<RowsAffected>> {
    let query = QueryParams::from_pairs(pairs);
    let request = state.translator.update(&table, &query, json_body(&body)?)?;
    let stmt = state.translator.compile(&request)?;
    tracing::debug!(sql = %stmt.text, params = stmt.params.len(), "update");
    let rows_affected = state.executor.execute(&stmt).await?;
    Ok(Json(RowsAffected { rows_affected }))
}

pub async fn delete_rows(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> GateResult<Json<RowsAffected>> {
    let query = QueryParams::from_pairs(pairs);
    let request = state.translator.delete(&table, &query)?;
    let stmt = state.translator.compile(&request)?;
    tracing::debug!(sql = %stmt.text, params = stmt.params.len(), "delete");
    let rows_affected = state.executor.execute(&stmt).await?;
    Ok(Json(RowsAffected { rows_affected }))
}

pub async fn call_routine(
    State(state): State<Arc<AppState>>,
    Path(routine): Path<String>,
    body: Bytes,
) -> GateResult<Response> {
    let body: RoutineBody = match json_body(&body)? {
        Value::Null => RoutineBody::default(),
        value => serde_json::from_value(value)
            .map_err(|e| TableGateError::InvalidBody(e.to_string()))?,
    };
    let request = state.translator.call(&routine, body)?;
    let stmt = state.translator.compile(&request)?;
    tracing::debug!(sql = %stmt.text, params = stmt.params.len(), "call");

    if request.returns_rows() {
        let rows = state.executor.fetch_rows(&stmt).await?;
        Ok(Json(rows).into_response())
    } else {
        let rows_affected = state.executor.execute(&stmt).await?;
        Ok(Json(RowsAffected { rows_affected }).into_response())
    }
}

/// An empty body reads as JSON `null`.
fn json_body(body: &[u8]) -> GateResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| TableGateError::InvalidBody(e.to_string()))
}

/// Connect, build the router and serve until the process is stopped.
pub async fn serve(config: AppConfig) -> GateResult<()> {
    tracing::info!("Initializing tablegate...");

    let compiler_config = config.compiler_config();
    if compiler_config.placeholders.is_named() {
        return Err(TableGateError::Config(format!(
            "placeholder style {:?} cannot be bound positionally; use it with `tablegate sql` only",
            compiler_config.placeholders
        )));
    }
    tracing::info!(
        "Compiler: dialect={:?}, schema={}, placeholders={:?}, pagination={:?}",
        compiler_config.dialect,
        compiler_config.default_schema,
        compiler_config.placeholders,
        compiler_config.pagination
    );

    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| TableGateError::Config("database_url is not set".to_string()))?;
    let executor = SqlxExecutor::connect(url, config.max_connections).await?;

    let translator = Translator::new(
        Compiler::new(compiler_config),
        TranslateOptions::from(&config),
    );
    let state = Arc::new(AppState::new(translator, Arc::new(executor)));
    let router = create_router(state, config.cors_enabled);

    let addr = &config.bind_address;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TableGateError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("tablegate listening on {}", addr);
    tracing::info!("   GET  /health          - Health check");
    tracing::info!("   *    /{{table}}         - Table access");
    tracing::info!("   POST /rpc/{{routine}}   - Routine calls");

    axum::serve(listener, router).await?;
    Ok(())
}
