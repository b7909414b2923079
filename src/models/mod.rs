//! Data models for ranking-page products

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product as extracted from one ranking list item.
///
/// Prices and the review count are never negative: the extractor only keeps
/// digits before coercing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub brand_name: String,
    pub product_name: String,
    pub original_price: i32,
    pub sale_price: i32,
    pub rating_score: f64,
    pub review_count: i32,
}

/// A row of the `products` table, as served by the read API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredProduct {
    pub product_id: String,
    pub brand_name: String,
    pub product_name: String,
    pub original_price: i32,
    pub sale_price: i32,
    pub rating_score: f64,
    pub review_count: i32,
    pub crawled_at: DateTime<Utc>,
}

impl StoredProduct {
    /// The persisted row stamped with the given crawl time.
    pub fn from_record(record: ProductRecord, crawled_at: DateTime<Utc>) -> Self {
        Self {
            product_id: record.product_id,
            brand_name: record.brand_name,
            product_name: record.product_name,
            original_price: record.original_price,
            sale_price: record.sale_price,
            rating_score: record.rating_score,
            review_count: record.review_count,
            crawled_at,
        }
    }
}
