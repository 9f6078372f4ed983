//! Core data models used throughout wb-catalog.
//!
//! Records flow from the remote search API ([`RemoteProductRecord`]) through
//! normalization ([`NormalizedProduct`]) into the store
//! ([`NewProduct`] / [`PersistedProduct`]).

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw product entry as returned by the remote search endpoint.
///
/// Every field is optional so that a malformed entry decodes and is then
/// rejected by the normalizer instead of failing the whole page.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RemoteProductRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "priceU")]
    pub price_u: Option<i64>,
    #[serde(default, rename = "salePriceU")]
    pub sale_price_u: Option<i64>,
    #[serde(default, rename = "reviewRating")]
    pub review_rating: Option<f64>,
    #[serde(default)]
    pub feedbacks: Option<i64>,
}

/// A remote record mapped into catalog units.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProduct {
    pub external_id: i64,
    pub name: String,
    pub price: Decimal,
    pub discount_price: Decimal,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A product queued for insertion; it has no surrogate key yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub external_id: i64,
    pub name: String,
    pub price: Decimal,
    pub discount_price: Decimal,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A product row owned by the store, keyed uniquely by `external_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedProduct {
    pub id: i64,
    pub external_id: i64,
    pub name: String,
    pub price: Decimal,
    pub discount_price: Decimal,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl PersistedProduct {
    /// Overwrite the mutable fields with a fresh sighting.
    ///
    /// `id`, `external_id` and `created_at` are left untouched.
    pub fn refresh_from(&mut self, fresh: &NormalizedProduct) {
        self.name = fresh.name.clone();
        self.price = fresh.price;
        self.discount_price = fresh.discount_price;
        self.rating = fresh.rating;
        self.reviews_count = fresh.reviews_count;
    }
}

/// Mutable product columns a bulk update may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    Name,
    Price,
    DiscountPrice,
    Rating,
    ReviewsCount,
}

impl ProductField {
    /// Every field the reconciler refreshes on a repeated sighting.
    pub const REFRESHED: [ProductField; 5] = [
        ProductField::Name,
        ProductField::Price,
        ProductField::DiscountPrice,
        ProductField::Rating,
        ProductField::ReviewsCount,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            ProductField::Name => "name",
            ProductField::Price => "price_minor",
            ProductField::DiscountPrice => "discount_price_minor",
            ProductField::Rating => "rating",
            ProductField::ReviewsCount => "reviews_count",
        }
    }
}

/// Convert an amount in minor units (kopecks) to a two-place decimal.
pub fn minor_to_decimal(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Convert a decimal amount to whole minor units, truncating extra places.
///
/// Returns `None` if the amount does not fit in an `i64`.
pub fn decimal_to_minor(amount: Decimal) -> Option<i64> {
    amount.checked_mul(Decimal::ONE_HUNDRED)?.trunc().to_i64()
}
