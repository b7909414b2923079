use async_trait::async_trait;
use sqlx::migrate::MigrateError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgExecutor, PgPool};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::DatabaseSettings;
use crate::models::{ProductRecord, StoredProduct};
use crate::traits::{ProductCatalog, ProductSink};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] MigrateError),
}

const UPSERT_PRODUCT: &str = r"
    INSERT INTO products (product_id, brand_name, product_name, original_price, sale_price, rating_score, review_count)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (product_id) DO UPDATE SET
        brand_name = EXCLUDED.brand_name,
        product_name = EXCLUDED.product_name,
        original_price = EXCLUDED.original_price,
        sale_price = EXCLUDED.sale_price,
        rating_score = EXCLUDED.rating_score,
        review_count = EXCLUDED.review_count,
        crawled_at = CURRENT_TIMESTAMP
";

/// Pipeline-side handle on the product store
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Pool that connects on first use, so a crawl can run while the
    /// database is still unreachable.
    pub fn connect_lazy(settings: &DatabaseSettings) -> Self {
        info!(
            host = %settings.host,
            database = %settings.database,
            "Using PostgreSQL store"
        );
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(settings.connect_options());
        Self { pool }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `products` table if it is not there yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Table 'products' created or already exists");
        Ok(())
    }

    /// Insert or update every record in one transaction.
    ///
    /// Conflicting rows are overwritten and get a fresh `crawled_at`. On any
    /// error the transaction is dropped, so nothing from the batch persists.
    pub async fn upsert_products(&self, products: &[ProductRecord]) -> Result<u64, StoreError> {
        if products.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for product in products {
            written += sqlx::query(UPSERT_PRODUCT)
                .bind(&product.product_id)
                .bind(&product.brand_name)
                .bind(&product.product_name)
                .bind(product.original_price)
                .bind(product.sale_price)
                .bind(product.rating_score)
                .bind(product.review_count)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait]
impl ProductSink for Database {
    async fn store_products(&self, products: &[ProductRecord]) -> Result<u64, StoreError> {
        self.ensure_schema().await?;

        match self.upsert_products(products).await {
            Ok(written) => {
                info!("Successfully inserted/updated {} products", written);
                Ok(written)
            }
            Err(e) => {
                error!("Error inserting products, batch rolled back: {}", e);
                Err(e)
            }
        }
    }
}

/// Every stored product, in storage order.
pub async fn list_products<'e>(
    executor: impl PgExecutor<'e>,
) -> Result<Vec<StoredProduct>, StoreError> {
    let products = sqlx::query_as::<_, StoredProduct>(
        r"
        SELECT product_id, brand_name, product_name, original_price, sale_price,
               rating_score, review_count, crawled_at
        FROM products
        ",
    )
    .fetch_all(executor)
    .await?;

    Ok(products)
}

/// Read-only catalog that opens a fresh connection for every call
#[derive(Debug, Clone)]
pub struct PgCatalog {
    options: PgConnectOptions,
}

impl PgCatalog {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn list_products(&self) -> Result<Vec<StoredProduct>, StoreError> {
        let mut conn = PgConnection::connect_with(&self.options).await?;
        let result = list_products(&mut conn).await;
        listing_after_close(result, conn.close().await)
    }
}

/// The listing decides the response; a failed close is only logged.
fn listing_after_close(
    result: Result<Vec<StoredProduct>, StoreError>,
    closed: Result<(), sqlx::Error>,
) -> Result<Vec<StoredProduct>, StoreError> {
    if let Err(e) = closed {
        warn!("Failed to close database connection: {}", e);
    }
    result
}
