//! Paginated product search against the Wildberries catalog endpoint.
//!
//! [`ProductSearch`] is the seam between the pipeline and the network:
//! [`WbSearchClient`] implements it with `reqwest`, tests substitute a
//! scripted fake. [`Pages`] walks the result pages for one query with a
//! single randomized client identity, a randomized pause between requests,
//! and an early stop on the first empty page.
//!
//! # Wire format
//!
//! ```json
//! { "data": { "products": [ { "id": 1, "name": "...", "priceU": 10000,
//!                             "salePriceU": 9000, "reviewRating": 4.8,
//!                             "feedbacks": 12 } ] } }
//! ```
//!
//! A missing `data` object or `data.products` array means "no more pages".

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::models::RemoteProductRecord;

/// Client identity presented to the remote service.
///
/// Chosen once per ingestion invocation and reused for every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
}

impl ClientIdentity {
    /// Pick a User-Agent uniformly from `pool`.
    pub fn random<R: Rng>(pool: &[String], rng: &mut R) -> Self {
        let user_agent = pool
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| format!("wb-catalog/{}", env!("CARGO_PKG_VERSION")));
        Self { user_agent }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Number of product entries the page carried, decodable or not.
    pub entries: usize,
    /// Entries that decoded into [`RemoteProductRecord`]s.
    pub records: Vec<RemoteProductRecord>,
}

impl SearchPage {
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

/// Remote paginated product search.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    /// Fetch a single result page (1-based) for `query`.
    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        identity: &ClientIdentity,
    ) -> Result<SearchPage, FetchError>;
}

/// `reqwest`-backed client for the public catalog search endpoint.
pub struct WbSearchClient {
    client: reqwest::Client,
    config: FetchConfig,
}

impl WbSearchClient {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[derive(Serialize)]
struct SearchParams<'a> {
    query: &'a str,
    page: u32,
    dest: i64,
    regions: &'a str,
    resultset: &'a str,
    sort: &'a str,
    spp: i64,
    #[serde(rename = "appType")]
    app_type: i64,
}

#[async_trait]
impl ProductSearch for WbSearchClient {
    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        identity: &ClientIdentity,
    ) -> Result<SearchPage, FetchError> {
        let params = SearchParams {
            query,
            page,
            dest: self.config.dest,
            regions: &self.config.regions,
            resultset: &self.config.resultset,
            sort: &self.config.sort,
            spp: self.config.spp,
            app_type: self.config.app_type,
        };

        let response = self
            .client
            .get(&self.config.endpoint)
            .header(USER_AGENT, identity.user_agent.as_str())
            .query(&params)
            .send()
            .await
            .map_err(|e| transport_error(page, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(page, e))?;
        parse_search_body(page, &body)
    }
}

fn transport_error(page: u32, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { page }
    } else {
        FetchError::Transport { page, source: err }
    }
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(default)]
    products: Option<Vec<serde_json::Value>>,
}

/// Decode a search response body.
///
/// Entries that are not product objects are dropped with a warning but
/// still count towards [`SearchPage::entries`].
pub fn parse_search_body(page: u32, body: &str) -> Result<SearchPage, FetchError> {
    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(|e| FetchError::Decode {
            page,
            message: e.to_string(),
        })?;

    let entries = envelope
        .data
        .and_then(|d| d.products)
        .unwrap_or_default();

    let mut records = Vec::with_capacity(entries.len());
    for entry in &entries {
        match RemoteProductRecord::deserialize(entry) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(page, error = %e, "skipping undecodable product entry"),
        }
    }

    Ok(SearchPage {
        entries: entries.len(),
        records,
    })
}

/// Uniform random pause drawn between consecutive page requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throttle {
    pub min: Duration,
    pub max: Duration,
}

impl Throttle {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            min: Duration::from_secs_f64(config.delay_min_secs),
            max: Duration::from_secs_f64(config.delay_max_secs),
        }
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        Duration::from_secs_f64(rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64()))
    }
}

/// Lazy cursor over the result pages of one query.
///
/// Requests are strictly sequential. The cursor is exhausted after
/// `max_pages` pages, after the first empty page, or after the first error.
pub struct Pages<'a, R: Rng> {
    search: &'a dyn ProductSearch,
    clock: &'a dyn Clock,
    rng: &'a mut R,
    query: &'a str,
    identity: ClientIdentity,
    throttle: Throttle,
    max_pages: u32,
    next_page: u32,
    exhausted: bool,
    undecodable: usize,
}

impl<'a, R: Rng + Send> Pages<'a, R> {
    pub fn new(
        search: &'a dyn ProductSearch,
        clock: &'a dyn Clock,
        rng: &'a mut R,
        query: &'a str,
        identity: ClientIdentity,
        throttle: Throttle,
        max_pages: u32,
    ) -> Self {
        Self {
            search,
            clock,
            rng,
            query,
            identity,
            throttle,
            max_pages,
            next_page: 1,
            exhausted: false,
            undecodable: 0,
        }
    }

    /// Entries on fetched pages that did not decode into a record.
    pub fn undecodable(&self) -> usize {
        self.undecodable
    }

    /// Number of pages successfully fetched so far.
    pub fn fetched(&self) -> u32 {
        self.next_page - 1
    }

    /// Fetch the next page, or `None` when there is nothing more to fetch.
    pub async fn next_page(&mut self) -> Option<Result<Vec<RemoteProductRecord>, FetchError>> {
        if self.exhausted || self.next_page > self.max_pages {
            return None;
        }

        let page = self.next_page;
        if page > 1 {
            let pause = self.throttle.draw(&mut *self.rng);
            tracing::debug!(page, pause_ms = pause.as_millis() as u64, "throttling");
            self.clock.sleep(pause).await;
        }

        match self
            .search
            .fetch_page(self.query, page, &self.identity)
            .await
        {
            Ok(result) if result.is_empty() => {
                tracing::info!(query = self.query, page, "empty page, stopping");
                self.exhausted = true;
                None
            }
            Ok(result) => {
                tracing::info!(
                    query = self.query,
                    page,
                    entries = result.entries,
                    "fetched page"
                );
                self.next_page += 1;
                self.undecodable += result.entries - result.records.len();
                Some(Ok(result.records))
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}
