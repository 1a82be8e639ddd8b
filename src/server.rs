//! Draw ledger HTTP server.
//!
//! Thin axum layer over [`RangeService`]. Handlers parse query strings,
//! delegate, and map [`LedgerError`] onto the JSON error contract.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/lotto` | Range query (`start`, `end`, `latest`, `dbOnly`, `noLimit`) |
//! | `GET`  | `/lotto/load` | Background bulk load (`start`, `end`, `batch`, `delay`) |
//! | `GET`  | `/lotto/check` | Ticket check (`round`, `numbers`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid range: start=20, end=10" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser dashboards
//! can query the ledger directly.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use draw_ledger_core::error::LedgerError;
use draw_ledger_core::win::{Ticket, WinResult};

use crate::config::Config;
use crate::service::{open_service, LoadAck, LoadRequest, RangeAnswer, RangeQuery, RangeService};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RangeService>,
}

/// Builds the router with all routes and layers attached.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/lotto", get(handle_range))
        .route("/lotto/load", get(handle_load))
        .route("/lotto/check", get(handle_check))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = open_service(config).await?;
    let app = router(AppState {
        service: Arc::new(service),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "draw ledger listening");
    println!("Draw ledger listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        if err.is_client_error() {
            bad_request(err.to_string())
        } else if let LedgerError::DrawNotFound(_) = err {
            not_found(err.to_string())
        } else {
            error!(error = %err, "request failed");
            internal(err.to_string())
        }
    }
}

// ============ Query parsing ============

/// Empty values count as absent.
fn parse_param<T: FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, AppError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| bad_request(format!("{} must be a non-negative integer, got '{}'", name, v))),
    }
}

/// `true` and `1` enable a flag; anything else leaves it off.
fn parse_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("true") | Some("1"))
}

/// An override switch is on whenever it carries any non-empty value.
fn parse_switch(raw: Option<&str>) -> bool {
    raw.map(str::trim).is_some_and(|v| !v.is_empty())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /lotto ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeParams {
    start: Option<String>,
    end: Option<String>,
    latest: Option<String>,
    db_only: Option<String>,
    no_limit: Option<String>,
}

async fn handle_range(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<RangeAnswer>, AppError> {
    let query = RangeQuery {
        start: parse_param("start", params.start.as_deref())?,
        end: parse_param("end", params.end.as_deref())?,
        latest: parse_param("latest", params.latest.as_deref())?,
        store_only: parse_flag(params.db_only.as_deref()),
        no_limit: parse_switch(params.no_limit.as_deref()),
    };
    let answer = state.service.answer_range(&query).await?;
    Ok(Json(answer))
}

// ============ GET /lotto/load ============

#[derive(Deserialize)]
struct LoadParams {
    start: Option<String>,
    end: Option<String>,
    batch: Option<String>,
    delay: Option<String>,
}

async fn handle_load(
    State(state): State<AppState>,
    Query(params): Query<LoadParams>,
) -> Result<Json<LoadAck>, AppError> {
    let request = LoadRequest {
        start: parse_param("start", params.start.as_deref())?,
        end: parse_param("end", params.end.as_deref())?,
        batch_size: parse_param("batch", params.batch.as_deref())?,
        delay_ms: parse_param("delay", params.delay.as_deref())?,
    };
    let ack = state.service.start_load(&request).await?;
    Ok(Json(ack))
}

// ============ GET /lotto/check ============

#[derive(Deserialize)]
struct CheckParams {
    round: Option<String>,
    numbers: Option<String>,
}

async fn handle_check(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> Result<Json<WinResult>, AppError> {
    let round: u32 = parse_param("round", params.round.as_deref())?
        .ok_or_else(|| bad_request("round is required"))?;
    let numbers = params
        .numbers
        .ok_or_else(|| bad_request("numbers is required"))?;
    let ticket = Ticket::parse(&numbers)?;
    let result = state.service.check_ticket(round, &ticket).await?;
    Ok(Json(result))
}
