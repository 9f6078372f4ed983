//! Stand-in for the Wildberries search endpoint.

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct CatalogState {
    pages: Arc<Vec<Vec<Value>>>,
    fail_with: Option<u16>,
    delay: Duration,
    requests: Arc<Mutex<Vec<(u32, String)>>>,
}

pub struct MockCatalog {
    pub endpoint: String,
    requests: Arc<Mutex<Vec<(u32, String)>>>,
}

impl MockCatalog {
    /// `(page, user agent)` of every request received, in order.
    pub fn requests(&self) -> Vec<(u32, String)> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn product(id: i64, name: &str, price_u: i64, rating: f64, feedbacks: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "priceU": price_u,
        "salePriceU": price_u - price_u / 10,
        "reviewRating": rating,
        "feedbacks": feedbacks,
    })
}

/// Serve `pages` (1-based) until the test's runtime shuts down. With
/// `fail_with` set, every request answers that status instead.
pub async fn spawn_catalog(pages: Vec<Vec<Value>>, fail_with: Option<u16>) -> MockCatalog {
    serve_catalog(CatalogState {
        pages: Arc::new(pages),
        fail_with,
        delay: Duration::ZERO,
        requests: Arc::new(Mutex::new(Vec::new())),
    })
    .await
}

/// Like [`spawn_catalog`], but every response is held back by `delay`.
pub async fn spawn_slow_catalog(pages: Vec<Vec<Value>>, delay: Duration) -> MockCatalog {
    serve_catalog(CatalogState {
        pages: Arc::new(pages),
        fail_with: None,
        delay,
        requests: Arc::new(Mutex::new(Vec::new())),
    })
    .await
}

async fn serve_catalog(state: CatalogState) -> MockCatalog {
    let requests = state.requests.clone();

    let app = Router::new()
        .route("/search", get(handle_search))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    MockCatalog {
        endpoint: format!("http://{}/search", addr),
        requests,
    }
}

async fn handle_search(
    State(state): State<CatalogState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let page: u32 = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.requests.lock().unwrap().push((page, agent));
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    if let Some(status) = state.fail_with {
        return StatusCode::from_u16(status).unwrap().into_response();
    }

    let products = (page as usize)
        .checked_sub(1)
        .and_then(|i| state.pages.get(i))
        .cloned()
        .unwrap_or_default();
    Json(json!({ "data": { "products": products } })).into_response()
}

/// `[fetch]` section pointing at the mock with no throttling.
pub fn fetch_section(endpoint: &str) -> String {
    fetch_section_with_timeout(endpoint, 5)
}

pub fn fetch_section_with_timeout(endpoint: &str, timeout_secs: u64) -> String {
    format!(
        r#"[fetch]
endpoint = "{}"
max_pages = 3
timeout_secs = {}
delay_min_secs = 0.0
delay_max_secs = 0.0
user_agents = ["wbc-test-agent/1.0"]
"#,
        endpoint, timeout_secs
    )
}
