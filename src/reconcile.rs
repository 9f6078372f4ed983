//! Merge a normalized batch into the store.
//!
//! One bulk lookup partitions the batch into new and already-known
//! products; new ones are inserted and known ones have their mutable fields
//! rewritten, both in chunks of at most `batch_size` records per call.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{NewProduct, NormalizedProduct, PersistedProduct, ProductField};
use crate::store::ProductStore;

/// What a reconciliation wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub created: usize,
    pub updated: usize,
    pub insert_calls: usize,
    pub update_calls: usize,
}

#[derive(Clone, Copy)]
enum Queued {
    Create(usize),
    Update(usize),
}

fn new_product(fresh: &NormalizedProduct, created_at: DateTime<Utc>) -> NewProduct {
    NewProduct {
        external_id: fresh.external_id,
        name: fresh.name.clone(),
        price: fresh.price,
        discount_price: fresh.discount_price,
        rating: fresh.rating,
        reviews_count: fresh.reviews_count,
        created_at,
    }
}

/// Reconcile `batch` against `store`.
///
/// Every new product gets the same `created_at`. If an external id occurs
/// more than once in the batch, it is queued once and its last occurrence
/// supplies the field values. Known products are updated whether or not
/// any field actually changed.
pub async fn reconcile(
    store: &dyn ProductStore,
    batch: &[NormalizedProduct],
    created_at: DateTime<Utc>,
    batch_size: usize,
) -> Result<Reconciled, StoreError> {
    if batch.is_empty() {
        return Ok(Reconciled::default());
    }

    let mut ids: Vec<i64> = batch.iter().map(|p| p.external_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let mut existing = store.fetch_by_external_ids(&ids).await?;

    let mut queued: HashMap<i64, Queued> = HashMap::with_capacity(ids.len());
    let mut to_create: Vec<NewProduct> = Vec::new();
    let mut to_update: Vec<PersistedProduct> = Vec::new();

    for fresh in batch {
        match queued.get(&fresh.external_id).copied() {
            Some(Queued::Create(i)) => {
                if let Some(pending) = to_create.get_mut(i) {
                    *pending = new_product(fresh, created_at);
                }
            }
            Some(Queued::Update(i)) => {
                if let Some(pending) = to_update.get_mut(i) {
                    pending.refresh_from(fresh);
                }
            }
            None => match existing.remove(&fresh.external_id) {
                Some(mut known) => {
                    known.refresh_from(fresh);
                    queued.insert(fresh.external_id, Queued::Update(to_update.len()));
                    to_update.push(known);
                }
                None => {
                    queued.insert(fresh.external_id, Queued::Create(to_create.len()));
                    to_create.push(new_product(fresh, created_at));
                }
            },
        }
    }

    let batch_size = batch_size.max(1);
    let mut result = Reconciled {
        created: to_create.len(),
        updated: to_update.len(),
        ..Default::default()
    };

    for chunk in to_create.chunks(batch_size) {
        store.insert_many(chunk).await?;
        result.insert_calls += 1;
    }
    for chunk in to_update.chunks(batch_size) {
        store.update_many(chunk, &ProductField::REFRESHED).await?;
        result.update_calls += 1;
    }

    tracing::debug!(
        created = result.created,
        updated = result.updated,
        insert_calls = result.insert_calls,
        update_calls = result.update_calls,
        "reconciled batch"
    );
    Ok(result)
}
