//! Ingestion pipeline orchestration.
//!
//! Coordinates one run for a search query: fetch pages → normalize →
//! reconcile against the store → report. [`run_ingest`] takes every
//! collaborator as a parameter (search, store, clock, random source) and
//! never fails outward; [`Ingestor`] bundles production collaborators for
//! the CLI and the background task runner.
//!
//! # Failure policy
//!
//! - A malformed product entry is skipped and logged.
//! - A fetch error stops paging. Products from the pages already fetched
//!   are still reconciled, then the run is reported as failed.
//! - A store error fails the run. Batches already written stay written.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::fetch::{ClientIdentity, Pages, ProductSearch, Throttle, WbSearchClient};
use crate::migrate;
use crate::normalize::normalize_batch;
use crate::reconcile::reconcile;
use crate::report::{IngestOutcome, IngestSummary};
use crate::store::{ProductStore, SqliteStore};

/// Per-run knobs, derived from `[fetch]` and `[ingest]` config.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub max_pages: u32,
    pub throttle: Throttle,
    pub batch_size: usize,
    pub user_agents: Vec<String>,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.fetch.max_pages,
            throttle: Throttle::from_config(&config.fetch),
            batch_size: config.ingest.batch_size,
            user_agents: config.fetch.user_agents.clone(),
        }
    }
}

/// Run one ingestion for `query`.
pub async fn run_ingest<R: Rng + Send>(
    query: &str,
    search: &dyn ProductSearch,
    store: &dyn ProductStore,
    clock: &dyn Clock,
    rng: &mut R,
    settings: &IngestSettings,
) -> IngestOutcome {
    let identity = ClientIdentity::random(&settings.user_agents, rng);
    // One creation timestamp for every product first seen in this run.
    let started_at = clock.now();
    tracing::info!(query, user_agent = %identity.user_agent, "starting ingestion");

    let mut pages = Pages::new(
        search,
        clock,
        rng,
        query,
        identity,
        settings.throttle,
        settings.max_pages,
    );

    let mut records = Vec::new();
    let mut fetch_error = None;
    while let Some(page) = pages.next_page().await {
        match page {
            Ok(batch) => records.extend(batch),
            Err(e) => {
                tracing::warn!(query, error = %e, "fetch aborted");
                fetch_error = Some(e);
            }
        }
    }

    let (products, rejected) = normalize_batch(&records, clock.now());
    let mut summary = IngestSummary {
        pages: pages.fetched(),
        scraped: products.len(),
        skipped: pages.undecodable() + rejected,
        ..Default::default()
    };

    match reconcile(store, &products, started_at, settings.batch_size).await {
        Ok(written) => {
            summary.created = written.created;
            summary.updated = written.updated;
        }
        Err(e) => {
            tracing::error!(query, error = %e, "reconciliation failed");
            return IngestOutcome::Failed {
                error: IngestError::Store(e),
                partial: None,
            };
        }
    }

    match fetch_error {
        Some(e) => IngestOutcome::Failed {
            error: IngestError::Fetch(e),
            partial: (summary.pages > 0).then_some(summary),
        },
        None => {
            tracing::info!(
                query,
                pages = summary.pages,
                scraped = summary.scraped,
                skipped = summary.skipped,
                created = summary.created,
                updated = summary.updated,
                "ingestion complete"
            );
            IngestOutcome::Completed(summary)
        }
    }
}

/// Production wiring for [`run_ingest`].
pub struct Ingestor {
    search: Arc<dyn ProductSearch>,
    store: Arc<dyn ProductStore>,
    clock: Arc<dyn Clock>,
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(
        search: Arc<dyn ProductSearch>,
        store: Arc<dyn ProductStore>,
        clock: Arc<dyn Clock>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            search,
            store,
            clock,
            settings,
        }
    }

    /// Live search client and wall clock over the given store.
    pub fn from_config(config: &Config, store: Arc<dyn ProductStore>) -> anyhow::Result<Self> {
        let search = WbSearchClient::new(&config.fetch)?;
        Ok(Self::new(
            Arc::new(search),
            store,
            Arc::new(SystemClock),
            IngestSettings::from_config(config),
        ))
    }

    pub fn store(&self) -> &Arc<dyn ProductStore> {
        &self.store
    }

    pub async fn run(&self, query: &str) -> IngestOutcome {
        let mut rng = StdRng::from_entropy();
        run_ingest(
            query,
            self.search.as_ref(),
            self.store.as_ref(),
            self.clock.as_ref(),
            &mut rng,
            &self.settings,
        )
        .await
    }
}

/// Run one ingestion in the foreground and print its report.
///
/// This is the entry point for `wbc ingest <query>`. A failed ingestion
/// prints its report and exits non-zero.
pub async fn run_ingest_command(config: &Config, query: &str) -> anyhow::Result<()> {
    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("query must not be empty");
    }

    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let store: Arc<dyn ProductStore> = Arc::new(SqliteStore::new(pool.clone()));
    let ingestor = Ingestor::from_config(config, store)?;

    let outcome = ingestor.run(query).await;
    pool.close().await;

    println!("{}", outcome);
    if let Some(summary) = outcome.summary() {
        println!("  pages: {}  skipped: {}", summary.pages, summary.skipped);
    }
    if !outcome.is_success() {
        anyhow::bail!("ingestion of '{}' did not complete", query);
    }
    Ok(())
}
