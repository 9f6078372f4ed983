//! HTTP API for submitting ingestions and browsing the catalog.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/parser/parse/` | Submit a background ingestion for `{ "query": ... }` |
//! | `GET`  | `/parser/tasks/{id}` | State and report of a submitted ingestion |
//! | `GET`  | `/api/products/` | Filtered, ordered, paginated product listing |
//! | `GET`  | `/api/max_price/` | Highest stored price |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the API directly.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::ingest::Ingestor;
use crate::listing::{
    Ordering, ProductFilter, ProductPage, ProductQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::migrate;
use crate::store::{ProductStore, SqliteStore};
use crate::tasks::{TaskHandle, TaskRunner, TaskStatus};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ProductStore>,
    tasks: TaskRunner,
}

impl AppState {
    /// The task runner and the listing endpoints share one store.
    pub fn new(tasks: TaskRunner) -> Self {
        Self {
            store: tasks.ingestor().store().clone(),
            tasks,
        }
    }
}

/// Starts the HTTP server on `[server].bind`.
///
/// Opens (and migrates) the configured database, then serves until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;

    let store: Arc<dyn ProductStore> = Arc::new(SqliteStore::new(pool));
    let ingestor = Ingestor::from_config(config, store)?;
    let runner = TaskRunner::new(Arc::new(ingestor), config.server.task_retention);
    let state = AppState::new(runner);

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("wb-catalog API listening on http://{}", bind_addr);
    tracing::info!(%bind_addr, "server started");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Build the router with all routes and CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/parser/parse/", post(handle_submit))
        .route("/parser/tasks/{id}", get(handle_task_status))
        .route("/api/products/", get(handle_list_products))
        .route("/api/max_price/", get(handle_max_price))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
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

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 404 Not Found error.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 error for store failures, logging the cause.
fn internal(err: impl std::fmt::Display) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /parser/parse/ ============

/// JSON request body for `POST /parser/parse/`.
#[derive(Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    query: Option<String>,
}

/// JSON response body for an accepted submission.
#[derive(Serialize)]
struct SubmitResponse {
    status: &'static str,
    task_id: TaskHandle,
}

/// Handler for `POST /parser/parse/`.
///
/// Answers 202 as soon as the ingestion is handed to the task runner; the
/// outcome is only visible through `GET /parser/tasks/{id}`.
async fn handle_submit(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let query = req
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| bad_request("query must not be empty"))?;

    let task_id = state.tasks.submit(query).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            status: "accepted",
            task_id,
        }),
    ))
}

// ============ GET /parser/tasks/{id} ============

/// Handler for `GET /parser/tasks/{id}`.
///
/// Malformed ids and unknown (or evicted) tasks both answer 404.
async fn handle_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatus>, AppError> {
    let handle: TaskHandle = id
        .parse()
        .map_err(|_| not_found(format!("no task with id: {}", id)))?;
    state
        .tasks
        .status(handle)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("no task with id: {}", id)))
}

// ============ GET /api/products/ ============

/// Query string of `GET /api/products/`.
#[derive(Deserialize)]
struct ListParams {
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    min_rating: Option<f64>,
    min_reviews: Option<i64>,
    ordering: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

impl ListParams {
    fn into_query(self) -> Result<ProductQuery, AppError> {
        let ordering = match self.ordering.as_deref().map(str::trim) {
            None | Some("") => Ordering::default(),
            Some(raw) => raw.parse::<Ordering>().map_err(bad_request)?,
        };

        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(bad_request("page must be >= 1"));
        }
        let page = u32::try_from(page).map_err(|_| bad_request("page is out of range"))?;

        let page_size = self.page_size.unwrap_or(i64::from(DEFAULT_PAGE_SIZE));
        if page_size < 1 || page_size > i64::from(MAX_PAGE_SIZE) {
            return Err(bad_request(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(ProductQuery {
            filter: ProductFilter {
                min_price: self.min_price,
                max_price: self.max_price,
                min_rating: self.min_rating,
                min_reviews: self.min_reviews,
            },
            ordering,
            page,
            page_size: page_size as u32,
        })
    }
}

/// Handler for `GET /api/products/`.
///
/// Returns `400` for undecodable parameters, an unknown ordering, or a page
/// out of range.
async fn handle_list_products(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ProductPage>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let query = params.into_query()?;
    let page = state.store.list_products(&query).await.map_err(internal)?;
    Ok(Json(page))
}

// ============ GET /api/max_price/ ============

/// JSON response body for `GET /api/max_price/`.
#[derive(Serialize)]
struct MaxPriceResponse {
    /// `"0"` when the catalog is empty.
    max_price: Decimal,
}

/// Handler for `GET /api/max_price/`.
async fn handle_max_price(
    State(state): State<AppState>,
) -> Result<Json<MaxPriceResponse>, AppError> {
    let max_price = state
        .store
        .max_price()
        .await
        .map_err(internal)?
        .unwrap_or(Decimal::ZERO);
    Ok(Json(MaxPriceResponse { max_price }))
}
