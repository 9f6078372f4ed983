use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the catalog schema on an open pool. Idempotent.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            price_minor INTEGER NOT NULL,
            discount_price_minor INTEGER NOT NULL,
            rating REAL,
            reviews_count INTEGER,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Listing filters and orderings
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_price ON products(price_minor)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_rating ON products(rating)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_products_reviews_count ON products(reviews_count)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
