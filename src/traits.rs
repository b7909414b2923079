//! Traits at the pipeline seams: where markup comes from, where records go,
//! and where the read API gets them back

use async_trait::async_trait;

use crate::browser::FetchError;
use crate::database::StoreError;
use crate::models::{ProductRecord, StoredProduct};

/// Produces the fully rendered markup of the ranking page
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the ranking page.
    ///
    /// # Returns
    /// * `Result<String, FetchError>` - The page markup, or why it could not be rendered
    async fn fetch_page(&self) -> Result<String, FetchError>;
}

/// Persists a batch of extracted records
#[async_trait]
pub trait ProductSink: Send + Sync {
    /// Insert or update every record of the batch, all or nothing.
    ///
    /// # Returns
    /// * `Result<u64, StoreError>` - Number of rows written
    async fn store_products(&self, products: &[ProductRecord]) -> Result<u64, StoreError>;
}

/// Read side of the store used by the HTTP API
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Every stored product, in storage order
    async fn list_products(&self) -> Result<Vec<StoredProduct>, StoreError>;
}
