//! SQLite-backed [`ProductStore`] implementation.
//!
//! Prices are stored as INTEGER minor units (`price_minor`,
//! `discount_price_minor`) so range filters compare exactly; they are
//! converted to and from [`Decimal`] at this boundary. Timestamps are unix
//! seconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::listing::{ProductFilter, ProductPage, ProductQuery};
use crate::models::{decimal_to_minor, minor_to_decimal, NewProduct, PersistedProduct, ProductField};

use super::ProductStore;

const PRODUCT_COLUMNS: &str = "id, external_id, name, price_minor, discount_price_minor, rating, reviews_count, created_at";

/// SQLite implementation of the [`ProductStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &SqliteRow) -> Result<PersistedProduct, StoreError> {
    let created_ts: i64 = row.try_get("created_at")?;
    let created_at = DateTime::<Utc>::from_timestamp(created_ts, 0)
        .ok_or_else(|| StoreError::Backend(format!("invalid created_at: {}", created_ts)))?;
    Ok(PersistedProduct {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        name: row.try_get("name")?,
        price: minor_to_decimal(row.try_get("price_minor")?),
        discount_price: minor_to_decimal(row.try_get("discount_price_minor")?),
        rating: row.try_get("rating")?,
        reviews_count: row.try_get("reviews_count")?,
        created_at,
    })
}

fn minor_units(external_id: i64, amount: Decimal) -> Result<i64, StoreError> {
    decimal_to_minor(amount).ok_or_else(|| {
        StoreError::Backend(format!(
            "price {} of product {} is out of range",
            amount, external_id
        ))
    })
}

/// Position of a field's value within the `VALUES` tuples built by
/// [`SqliteStore::update_many`].
fn values_column(field: ProductField) -> &'static str {
    match field {
        ProductField::Name => "column2",
        ProductField::Price => "column3",
        ProductField::DiscountPrice => "column4",
        ProductField::Rating => "column5",
        ProductField::ReviewsCount => "column6",
    }
}

/// Convert a decimal price bound to minor units, saturating out-of-range
/// bounds so they match everything or nothing as their sign implies.
fn scaled_bound(bound: Decimal, round: fn(&Decimal) -> Decimal) -> i64 {
    bound
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| round(&scaled).to_i64())
        .unwrap_or(if bound.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(min) = filter.min_price {
        let bound = scaled_bound(min, Decimal::ceil);
        qb.push(" AND price_minor >= ").push_bind(bound);
    }
    if let Some(max) = filter.max_price {
        let bound = scaled_bound(max, Decimal::floor);
        qb.push(" AND price_minor <= ").push_bind(bound);
    }
    if let Some(min) = filter.min_rating {
        qb.push(" AND rating >= ").push_bind(min);
    }
    if let Some(min) = filter.min_reviews {
        qb.push(" AND reviews_count >= ").push_bind(min);
    }
}

#[async_trait]
impl ProductStore for SqliteStore {
    async fn fetch_by_external_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, PersistedProduct>, StoreError> {
        // One statement regardless of batch size: ids travel as a JSON array.
        let ids_json = serde_json::Value::from(ids.to_vec()).to_string();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products WHERE external_id IN (SELECT value FROM json_each(?))",
            PRODUCT_COLUMNS
        ))
        .bind(ids_json)
        .fetch_all(&self.pool)
        .await?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in &rows {
            let product = row_to_product(row)?;
            found.insert(product.external_id, product);
        }
        Ok(found)
    }

    async fn insert_many(&self, products: &[NewProduct]) -> Result<u64, StoreError> {
        if products.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(products.len());
        for p in products {
            rows.push((
                p,
                minor_units(p.external_id, p.price)?,
                minor_units(p.external_id, p.discount_price)?,
            ));
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "INSERT INTO products (external_id, name, price_minor, discount_price_minor, rating, reviews_count, created_at) ",
        );
        qb.push_values(rows, |mut b, (p, price, discount)| {
            b.push_bind(p.external_id)
                .push_bind(p.name.clone())
                .push_bind(price)
                .push_bind(discount)
                .push_bind(p.rating)
                .push_bind(p.reviews_count)
                .push_bind(p.created_at.timestamp());
        });
        qb.push(
            r#"
            ON CONFLICT(external_id) DO UPDATE SET
                name = excluded.name,
                price_minor = excluded.price_minor,
                discount_price_minor = excluded.discount_price_minor,
                rating = excluded.rating,
                reviews_count = excluded.reviews_count
            "#,
        );

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn update_many(
        &self,
        products: &[PersistedProduct],
        fields: &[ProductField],
    ) -> Result<u64, StoreError> {
        if products.is_empty() || fields.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(products.len());
        for p in products {
            rows.push((
                p,
                minor_units(p.external_id, p.price)?,
                minor_units(p.external_id, p.discount_price)?,
            ));
        }

        let assignments: Vec<String> = fields
            .iter()
            .map(|f| format!("{} = v.{}", f.column(), values_column(*f)))
            .collect();

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE products SET ");
        qb.push(assignments.join(", "));
        qb.push(" FROM (");
        qb.push_values(rows, |mut b, (p, price, discount)| {
            b.push_bind(p.external_id)
                .push_bind(p.name.clone())
                .push_bind(price)
                .push_bind(discount)
                .push_bind(p.rating)
                .push_bind(p.reviews_count);
        });
        qb.push(") AS v WHERE products.external_id = v.column1");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, StoreError> {
        let mut count_qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_filter(&mut count_qb, &query.filter);
        let count: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_filter(&mut qb, &query.filter);
        let dir = query.ordering.direction_sql();
        qb.push(format!(
            " ORDER BY {} {}, id {}",
            query.ordering.field.column(),
            dir,
            dir
        ));
        qb.push(" LIMIT ")
            .push_bind(i64::from(query.page_size))
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let results = rows
            .iter()
            .map(row_to_product)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProductPage {
            count: count as u64,
            page: query.page,
            page_size: query.page_size,
            results,
        })
    }

    async fn max_price(&self) -> Result<Option<Decimal>, StoreError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(price_minor) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.map(minor_to_decimal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::Ordering;
    use crate::migrate;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::migrate(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn new_product(external_id: i64, price: i64) -> NewProduct {
        NewProduct {
            external_id,
            name: format!("Product {}", external_id),
            price: Decimal::new(price, 0),
            discount_price: Decimal::new(price, 0),
            rating: Some(4.0),
            reviews_count: Some(10),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn insert_then_fetch_by_key() {
        let store = store().await;
        store
            .insert_many(&[new_product(10, 100), new_product(20, 200)])
            .await
            .unwrap();

        let found = store.fetch_by_external_ids(&[10, 20, 30]).await.unwrap();
        assert_eq!(found.len(), 2);
        let p = &found[&20];
        assert_eq!(p.price.to_string(), "200.00");
        assert_eq!(p.created_at, Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn insert_conflict_keeps_created_at() {
        let store = store().await;
        store.insert_many(&[new_product(1, 100)]).await.unwrap();

        let mut again = new_product(1, 150);
        again.created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        store.insert_many(&[again]).await.unwrap();

        let found = store.fetch_by_external_ids(&[1]).await.unwrap();
        assert_eq!(found[&1].price.to_string(), "150.00");
        assert_eq!(
            found[&1].created_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
        );
        let page = store.list_products(&ProductQuery::default()).await.unwrap();
        assert_eq!(page.count, 1);
    }

    #[tokio::test]
    async fn update_touches_only_listed_fields() {
        let store = store().await;
        store.insert_many(&[new_product(1, 100)]).await.unwrap();

        let mut p = store.fetch_by_external_ids(&[1]).await.unwrap()[&1].clone();
        p.name = "Renamed".to_string();
        p.price = Decimal::new(99, 0);

        let touched = store
            .update_many(&[p], &[ProductField::Price])
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let stored = &store.fetch_by_external_ids(&[1]).await.unwrap()[&1];
        assert_eq!(stored.price.to_string(), "99.00");
        assert_eq!(stored.name, "Product 1");
    }

    #[tokio::test]
    async fn list_filters_and_orders() {
        let store = store().await;
        store
            .insert_many(&[
                new_product(1, 100),
                new_product(2, 200),
                new_product(3, 300),
            ])
            .await
            .unwrap();

        let query = ProductQuery {
            filter: ProductFilter {
                min_price: Some(Decimal::new(150, 0)),
                max_price: Some(Decimal::new(250, 0)),
                ..Default::default()
            },
            ..Default::default()
        };
        let page = store.list_products(&query).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].external_id, 2);

        let query = ProductQuery {
            ordering: "-price".parse::<Ordering>().unwrap(),
            ..Default::default()
        };
        let prices: Vec<String> = store
            .list_products(&query)
            .await
            .unwrap()
            .results
            .iter()
            .map(|p| p.price.to_string())
            .collect();
        assert_eq!(prices, vec!["300.00", "200.00", "100.00"]);

        // same created_at for all rows: newest-first falls back to id
        let ids: Vec<i64> = store
            .list_products(&ProductQuery::default())
            .await
            .unwrap()
            .results
            .iter()
            .map(|p| p.external_id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn list_paginates() {
        let store = store().await;
        let products: Vec<NewProduct> = (1..=5).map(|i| new_product(i, i * 10)).collect();
        store.insert_many(&products).await.unwrap();

        let query = ProductQuery {
            ordering: "price".parse().unwrap(),
            page: 2,
            page_size: 2,
            ..Default::default()
        };
        let page = store.list_products(&query).await.unwrap();
        assert_eq!(page.count, 5);
        let ids: Vec<i64> = page.results.iter().map(|p| p.external_id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn max_price_of_empty_catalog_is_none() {
        let store = store().await;
        assert_eq!(store.max_price().await.unwrap(), None);
        store
            .insert_many(&[new_product(1, 100), new_product(2, 300)])
            .await
            .unwrap();
        assert_eq!(store.max_price().await.unwrap(), Some(Decimal::new(30000, 2)));
    }
}
