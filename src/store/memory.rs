//! In-memory [`ProductStore`] implementation used by the unit tests.
//!
//! Keeps products in a `BTreeMap` keyed by external id behind a
//! `std::sync::Mutex`, and counts every bulk call so callers can check how
//! many statements a real backend would have received.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::listing::{ProductPage, ProductQuery};
use crate::models::{NewProduct, PersistedProduct, ProductField};

use super::ProductStore;

/// Number of bulk calls received, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub lookups: usize,
    pub inserts: usize,
    pub updates: usize,
}

#[derive(Default)]
struct State {
    rows: BTreeMap<i64, PersistedProduct>,
    next_id: i64,
    calls: StoreCalls,
    fail_writes: bool,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> StoreCalls {
        self.lock().map(|s| s.calls).unwrap_or_default()
    }

    /// Make every subsequent insert and update fail.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_writes = fail;
        }
    }

    /// Snapshot of all rows ordered by external id.
    pub fn products(&self) -> Vec<PersistedProduct> {
        self.lock()
            .map(|s| s.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

fn check_writable(state: &State) -> Result<(), StoreError> {
    if state.fail_writes {
        return Err(StoreError::Backend("writes are disabled".to_string()));
    }
    Ok(())
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn fetch_by_external_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, PersistedProduct>, StoreError> {
        let mut state = self.lock()?;
        state.calls.lookups += 1;
        Ok(ids
            .iter()
            .filter_map(|id| state.rows.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn insert_many(&self, products: &[NewProduct]) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        state.calls.inserts += 1;
        check_writable(&state)?;

        for p in products {
            if let Some(existing) = state.rows.get_mut(&p.external_id) {
                existing.name = p.name.clone();
                existing.price = p.price;
                existing.discount_price = p.discount_price;
                existing.rating = p.rating;
                existing.reviews_count = p.reviews_count;
                continue;
            }
            state.next_id += 1;
            let id = state.next_id;
            state.rows.insert(
                p.external_id,
                PersistedProduct {
                    id,
                    external_id: p.external_id,
                    name: p.name.clone(),
                    price: p.price,
                    discount_price: p.discount_price,
                    rating: p.rating,
                    reviews_count: p.reviews_count,
                    created_at: p.created_at,
                },
            );
        }
        Ok(products.len() as u64)
    }

    async fn update_many(
        &self,
        products: &[PersistedProduct],
        fields: &[ProductField],
    ) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        state.calls.updates += 1;
        check_writable(&state)?;

        let mut touched = 0;
        for p in products {
            let Some(row) = state.rows.get_mut(&p.external_id) else {
                continue;
            };
            for field in fields {
                match field {
                    ProductField::Name => row.name = p.name.clone(),
                    ProductField::Price => row.price = p.price,
                    ProductField::DiscountPrice => row.discount_price = p.discount_price,
                    ProductField::Rating => row.rating = p.rating,
                    ProductField::ReviewsCount => row.reviews_count = p.reviews_count,
                }
            }
            touched += 1;
        }
        Ok(touched)
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, StoreError> {
        let state = self.lock()?;
        let mut matching: Vec<PersistedProduct> = state
            .rows
            .values()
            .filter(|p| query.filter.matches(p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| query.ordering.compare(a, b));

        let count = matching.len() as u64;
        let results = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .collect();

        Ok(ProductPage {
            count,
            page: query.page,
            page_size: query.page_size,
            results,
        })
    }

    async fn max_price(&self) -> Result<Option<Decimal>, StoreError> {
        let state = self.lock()?;
        Ok(state.rows.values().map(|p| p.price).max())
    }
}
