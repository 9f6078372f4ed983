//! # wb-catalog CLI (`wbc`)
//!
//! ## Usage
//!
//! ```bash
//! wbc --config ./config/wbc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wbc init` | Create the SQLite database and run schema migrations |
//! | `wbc ingest "<query>"` | Fetch, normalize, and store one search query |
//! | `wbc products` | List stored products with filters and ordering |
//! | `wbc serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! wbc init --config ./config/wbc.toml
//! wbc ingest "кроссовки" --config ./config/wbc.toml
//! wbc products --min-price 1000 --max-price 5000 --ordering -rating
//! wbc serve --config ./config/wbc.toml
//! ```

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use wb_catalog::listing::{
    Ordering, ProductFilter, ProductQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use wb_catalog::{config, ingest, listing, logging, migrate, server};

/// wb-catalog CLI: ingest Wildberries search results and browse them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/wbc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "wbc",
    about = "wb-catalog: Wildberries product ingestion and catalog API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wbc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Ingest one search query.
    ///
    /// Walks up to `[fetch].max_pages` result pages, then inserts new
    /// products and refreshes known ones. Prints the ingestion report.
    Ingest {
        /// Search phrase, as typed into the Wildberries search box.
        query: String,
    },

    /// List stored products.
    Products {
        /// Minimum price, inclusive (e.g. `99.90`).
        #[arg(long)]
        min_price: Option<Decimal>,

        /// Maximum price, inclusive.
        #[arg(long)]
        max_price: Option<Decimal>,

        /// Minimum rating, inclusive.
        #[arg(long)]
        min_rating: Option<f64>,

        /// Minimum number of reviews, inclusive.
        #[arg(long)]
        min_reviews: Option<i64>,

        /// Sort field: `price`, `rating`, `reviews_count`, or `created_at`.
        /// Prefix with `-` for descending. Defaults to newest first.
        #[arg(long, allow_hyphen_values = true)]
        ordering: Option<Ordering>,

        /// Page number (1-based).
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Products per page.
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE,
              value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64))]
        page_size: u32,
    },

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing("wb_catalog=info")?;

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { query } => {
            ingest::run_ingest_command(&cfg, &query).await?;
        }
        Commands::Products {
            min_price,
            max_price,
            min_rating,
            min_reviews,
            ordering,
            page,
            page_size,
        } => {
            let query = ProductQuery {
                filter: ProductFilter {
                    min_price,
                    max_price,
                    min_rating,
                    min_reviews,
                },
                ordering: ordering.unwrap_or_default(),
                page,
                page_size,
            };
            listing::run_products(&cfg, &query).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
