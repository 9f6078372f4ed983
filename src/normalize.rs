//! Mapping of raw search entries into catalog products.
//!
//! Prices arrive in minor units (kopecks) and are converted exactly with
//! [`minor_to_decimal`]. A missing sale price means the product is not
//! discounted, so the discount price falls back to the full price.

use chrono::{DateTime, Utc};

use crate::error::NormalizationError;
use crate::models::{minor_to_decimal, NormalizedProduct, RemoteProductRecord};

/// Review ratings are on a five-star scale.
const MIN_RATING: f64 = 0.0;
const MAX_RATING: f64 = 5.0;

pub fn normalize(
    record: &RemoteProductRecord,
    now: DateTime<Utc>,
) -> Result<NormalizedProduct, NormalizationError> {
    let external_id = record.id.ok_or(NormalizationError::MissingField("id"))?;

    let name = record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(NormalizationError::MissingField("name"))?
        .to_string();

    let price_u = record
        .price_u
        .ok_or(NormalizationError::MissingField("priceU"))?;
    non_negative("priceU", price_u)?;

    let sale_price_u = record.sale_price_u.unwrap_or(price_u);
    non_negative("salePriceU", sale_price_u)?;

    if let Some(feedbacks) = record.feedbacks {
        non_negative("feedbacks", feedbacks)?;
    }
    if let Some(rating) = record.review_rating {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(NormalizationError::OutOfRange {
                field: "reviewRating",
                value: rating,
            });
        }
    }

    Ok(NormalizedProduct {
        external_id,
        name,
        price: minor_to_decimal(price_u),
        discount_price: minor_to_decimal(sale_price_u),
        rating: record.review_rating,
        reviews_count: record.feedbacks,
        created_at: now,
    })
}

fn non_negative(field: &'static str, value: i64) -> Result<(), NormalizationError> {
    if value < 0 {
        return Err(NormalizationError::Negative { field, value });
    }
    Ok(())
}

/// Normalize a page worth of records, dropping the ones that fail.
///
/// Returns the surviving products and the number of records skipped.
pub fn normalize_batch(
    records: &[RemoteProductRecord],
    now: DateTime<Utc>,
) -> (Vec<NormalizedProduct>, usize) {
    let mut products = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        match normalize(record, now) {
            Ok(p) => products.push(p),
            Err(e) => {
                skipped += 1;
                tracing::warn!(id = ?record.id, error = %e, "skipping product");
            }
        }
    }
    (products, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, price_u: i64) -> RemoteProductRecord {
        RemoteProductRecord {
            id: Some(id),
            name: Some(format!("Product {}", id)),
            price_u: Some(price_u),
            ..Default::default()
        }
    }

    #[test]
    fn converts_minor_units() {
        let p = normalize(&record(1, 129900), Utc::now()).unwrap();
        assert_eq!(p.price.to_string(), "1299.00");
    }

    #[test]
    fn discount_defaults_to_price() {
        let p = normalize(&record(1, 10000), Utc::now()).unwrap();
        assert_eq!(p.discount_price.to_string(), "100.00");
        assert_eq!(p.discount_price, p.price);
    }

    #[test]
    fn sale_price_becomes_discount() {
        let mut r = record(1, 10000);
        r.sale_price_u = Some(8550);
        let p = normalize(&r, Utc::now()).unwrap();
        assert_eq!(p.discount_price.to_string(), "85.50");
    }

    #[test]
    fn optional_fields_copied_through() {
        let mut r = record(1, 10000);
        r.review_rating = Some(4.6);
        r.feedbacks = Some(31);
        let now = Utc::now();
        let p = normalize(&r, now).unwrap();
        assert_eq!(p.rating, Some(4.6));
        assert_eq!(p.reviews_count, Some(31));
        assert_eq!(p.created_at, now);
    }

    #[test]
    fn missing_required_fields_fail() {
        let mut r = record(1, 100);
        r.id = None;
        assert_eq!(
            normalize(&r, Utc::now()),
            Err(NormalizationError::MissingField("id"))
        );

        let mut r = record(1, 100);
        r.price_u = None;
        assert_eq!(
            normalize(&r, Utc::now()),
            Err(NormalizationError::MissingField("priceU"))
        );

        let mut r = record(1, 100);
        r.name = Some("   ".to_string());
        assert_eq!(
            normalize(&r, Utc::now()),
            Err(NormalizationError::MissingField("name"))
        );
    }

    #[test]
    fn negative_values_fail() {
        let mut r = record(1, 100);
        r.feedbacks = Some(-3);
        assert!(matches!(
            normalize(&r, Utc::now()),
            Err(NormalizationError::Negative {
                field: "feedbacks",
                ..
            })
        ));
    }

    #[test]
    fn rating_outside_scale_fails() {
        for rating in [5.5, -1.0, f64::NAN] {
            let mut r = record(1, 100);
            r.review_rating = Some(rating);
            assert!(matches!(
                normalize(&r, Utc::now()),
                Err(NormalizationError::OutOfRange {
                    field: "reviewRating",
                    ..
                })
            ));
        }

        for rating in [0.0, 5.0] {
            let mut r = record(1, 100);
            r.review_rating = Some(rating);
            assert_eq!(normalize(&r, Utc::now()).unwrap().rating, Some(rating));
        }
    }

    #[test]
    fn batch_skips_bad_records_only() {
        let mut bad = record(2, 100);
        bad.price_u = None;
        let records = vec![record(1, 100), bad, record(3, 300)];
        let (products, skipped) = normalize_batch(&records, Utc::now());
        assert_eq!(skipped, 1);
        let ids: Vec<i64> = products.iter().map(|p| p.external_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
