use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Remote search endpoint and throttling settings.
///
/// The query parameters mirror what the public Wildberries catalog search
/// expects for a Moscow-region, popularity-sorted result set.
#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_delay_min_secs")]
    pub delay_min_secs: f64,
    #[serde(default = "default_delay_max_secs")]
    pub delay_max_secs: f64,
    #[serde(default = "default_dest")]
    pub dest: i64,
    #[serde(default = "default_regions")]
    pub regions: String,
    #[serde(default = "default_resultset")]
    pub resultset: String,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default)]
    pub spp: i64,
    #[serde(default = "default_app_type")]
    pub app_type: i64,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_pages: default_max_pages(),
            timeout_secs: default_timeout_secs(),
            delay_min_secs: default_delay_min_secs(),
            delay_max_secs: default_delay_max_secs(),
            dest: default_dest(),
            regions: default_regions(),
            resultset: default_resultset(),
            sort: default_sort(),
            spp: 0,
            app_type: default_app_type(),
            user_agents: default_user_agents(),
        }
    }
}

fn default_endpoint() -> String {
    "https://search.wb.ru/exactmatch/ru/common/v4/search".to_string()
}
fn default_max_pages() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_delay_min_secs() -> f64 {
    1.5
}
fn default_delay_max_secs() -> f64 {
    3.5
}
fn default_dest() -> i64 {
    -1257786
}
fn default_regions() -> String {
    "80,64,83,4,38,33,70,82,69,68,86,30,40,48,1,22,66,31".to_string()
}
fn default_resultset() -> String {
    "catalog".to_string()
}
fn default_sort() -> String {
    "popular".to_string()
}
fn default_app_type() -> i64 {
    1
}
fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
        "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Finished ingestion tasks kept for `GET /parser/tasks/{id}`.
    #[serde(default = "default_task_retention")]
    pub task_retention: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            task_retention: default_task_retention(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_task_retention() -> usize {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_pages == 0 {
            anyhow::bail!("fetch.max_pages must be >= 1");
        }
        if self.fetch.timeout_secs == 0 {
            anyhow::bail!("fetch.timeout_secs must be > 0");
        }
        if self.fetch.delay_min_secs < 0.0 || self.fetch.delay_max_secs < self.fetch.delay_min_secs
        {
            anyhow::bail!("fetch delays must satisfy 0 <= delay_min_secs <= delay_max_secs");
        }
        if self.fetch.user_agents.is_empty() {
            anyhow::bail!("fetch.user_agents must list at least one User-Agent");
        }
        if self.ingest.batch_size == 0 {
            anyhow::bail!("ingest.batch_size must be > 0");
        }
        if self.server.task_retention == 0 {
            anyhow::bail!("server.task_retention must be > 0");
        }
        Ok(())
    }
}
