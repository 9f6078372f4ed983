//! Storage abstraction for the product catalog.
//!
//! The [`ProductStore`] trait is the keyed upsert store the ingestion
//! pipeline and the read API run against. Products are keyed uniquely by
//! their external (remote catalog) identifier.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`fetch_by_external_ids`](ProductStore::fetch_by_external_ids) | One bulk lookup of persisted products |
//! | [`insert_many`](ProductStore::insert_many) | Bulk insert (upsert on external id) |
//! | [`update_many`](ProductStore::update_many) | Bulk update of a field list |
//! | [`list_products`](ProductStore::list_products) | Filtered, ordered, paginated listing |
//! | [`max_price`](ProductStore::max_price) | Highest stored price |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::StoreError;
use crate::listing::{ProductPage, ProductQuery};
use crate::models::{NewProduct, PersistedProduct, ProductField};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Fetch every persisted product whose external id is in `ids`, keyed
    /// by external id. Issued as a single query.
    async fn fetch_by_external_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, PersistedProduct>, StoreError>;

    /// Insert `products` in one statement.
    ///
    /// A product whose external id already exists overwrites the mutable
    /// fields of the stored row; its `created_at` is kept.
    async fn insert_many(&self, products: &[NewProduct]) -> Result<u64, StoreError>;

    /// Write `fields` of `products` back in one statement, matching rows
    /// by external id. Returns the number of rows touched.
    async fn update_many(
        &self,
        products: &[PersistedProduct],
        fields: &[ProductField],
    ) -> Result<u64, StoreError>;

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, StoreError>;

    /// Highest stored price, or `None` when the catalog is empty.
    async fn max_price(&self) -> Result<Option<Decimal>, StoreError>;
}
