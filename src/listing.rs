//! Read-side product listing: filters, ordering, and pagination.
//!
//! Every filter is an inclusive bound and filters combine conjunctively.
//! Without an explicit ordering, products are listed newest first.

use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::PersistedProduct;
use crate::store::{ProductStore, SqliteStore};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_rating: Option<f64>,
    pub min_reviews: Option<i64>,
}

impl ProductFilter {
    pub fn matches(&self, product: &PersistedProduct) -> bool {
        if let Some(min) = self.min_price {
            if product.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if product.price > max {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if !product.rating.is_some_and(|r| r >= min) {
                return false;
            }
        }
        if let Some(min) = self.min_reviews {
            if !product.reviews_count.is_some_and(|c| c >= min) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Rating,
    ReviewsCount,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Price => "price_minor",
            SortField::Rating => "rating",
            SortField::ReviewsCount => "reviews_count",
            SortField::CreatedAt => "created_at",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SortField::Price => "price",
            SortField::Rating => "rating",
            SortField::ReviewsCount => "reviews_count",
            SortField::CreatedAt => "created_at",
        }
    }
}

/// Sort order for listings: a field plus direction, written `price` or
/// `-price` on the wire.
///
/// Ties are broken by surrogate id in the same direction, so products
/// created by one ingestion run (which share a timestamp) list stably.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub field: SortField,
    pub descending: bool,
}

impl Default for Ordering {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for Ordering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "price" => SortField::Price,
            "rating" => SortField::Rating,
            "reviews_count" => SortField::ReviewsCount,
            "created_at" => SortField::CreatedAt,
            other => {
                return Err(format!(
                    "invalid ordering field: '{}'. Use price, rating, reviews_count, or created_at",
                    other
                ))
            }
        };
        Ok(Self { field, descending })
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-")?;
        }
        write!(f, "{}", self.field.name())
    }
}

impl Ordering {
    pub fn direction_sql(&self) -> &'static str {
        if self.descending {
            "DESC"
        } else {
            "ASC"
        }
    }

    /// Compare two products under this ordering. Missing values sort
    /// lowest, as NULLs do in SQLite.
    pub fn compare(&self, a: &PersistedProduct, b: &PersistedProduct) -> CmpOrdering {
        let primary = match self.field {
            SortField::Price => a.price.cmp(&b.price),
            SortField::Rating => a
                .rating
                .partial_cmp(&b.rating)
                .unwrap_or(CmpOrdering::Equal),
            SortField::ReviewsCount => a.reviews_count.cmp(&b.reviews_count),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let ord = primary.then(a.id.cmp(&b.id));
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// A fully specified listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub filter: ProductFilter,
    pub ordering: Ordering,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            filter: ProductFilter::default(),
            ordering: Ordering::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ProductQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    /// Number of products matching the filter across all pages.
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<PersistedProduct>,
}

/// Print one page of the catalog. Entry point for `wbc products`.
pub async fn run_products(config: &Config, query: &ProductQuery) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    let page = store.list_products(query).await?;
    pool.close().await;

    if page.results.is_empty() {
        println!("No products.");
        return Ok(());
    }

    let first = query.offset() + 1;
    for (i, p) in page.results.iter().enumerate() {
        let rating = p
            .rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "-".to_string());
        let reviews = p
            .reviews_count
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}. [{}] {}", first + i as u64, p.external_id, p.name);
        println!(
            "    price: {}  discount: {}  rating: {}  reviews: {}",
            p.price, p.discount_price, rating, reviews
        );
        println!("    added: {}", p.created_at.format("%Y-%m-%d %H:%M"));
    }
    println!();
    println!(
        "Page {} of {} matching products (ordering: {}).",
        page.page, page.count, query.ordering
    );
    Ok(())
}
