//! Fakes shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::FetchError;
use crate::fetch::{parse_search_body, ClientIdentity, ProductSearch, SearchPage};

/// A product entry in the remote wire format.
pub fn product_json(id: i64, price_u: i64, sale_price_u: Option<i64>) -> String {
    let mut value = serde_json::json!({
        "id": id,
        "name": format!("Product {}", id),
        "priceU": price_u,
        "reviewRating": 4.5,
        "feedbacks": 10,
    });
    if let Some(sale) = sale_price_u {
        value["salePriceU"] = serde_json::json!(sale);
    }
    value.to_string()
}

/// Serves a fixed list of pages; pages past the end are empty.
pub struct ScriptedSearch {
    pages: Vec<Vec<String>>,
    failing: HashSet<u32>,
    calls: Mutex<Vec<(u32, String)>>,
}

impl ScriptedSearch {
    pub fn with_pages(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer `page` with HTTP 503.
    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing.insert(page);
        self
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, ua)| ua.clone())
            .collect()
    }
}

#[async_trait]
impl ProductSearch for ScriptedSearch {
    async fn fetch_page(
        &self,
        _query: &str,
        page: u32,
        identity: &ClientIdentity,
    ) -> Result<SearchPage, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((page, identity.user_agent.clone()));

        if self.failing.contains(&page) {
            return Err(FetchError::Status { page, status: 503 });
        }

        let entries = self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        let body = format!(r#"{{"data": {{"products": [{}]}}}}"#, entries.join(","));
        parse_search_body(page, &body)
    }
}

/// Clock frozen at a fixed instant that records requested sleeps.
pub struct ManualClock {
    now: DateTime<Utc>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
