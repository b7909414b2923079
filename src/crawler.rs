use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{error, info, warn};

use crate::models::ProductRecord;
use crate::scraper::RankingExtractor;
use crate::traits::{PageSource, ProductSink};

pub const SNAPSHOT_PATH: &str = "products.json";

/// How a pipeline run ended, when it did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The page could not be rendered; diagnostics were captured by the source.
    FetchFailed,
    /// The page rendered but no product could be extracted.
    NoProducts,
    Stored {
        extracted: usize,
        failed: usize,
        stored: u64,
    },
}

/// fetch → extract → snapshot → upsert, once
pub struct RankingCrawler {
    source: Box<dyn PageSource>,
    extractor: RankingExtractor,
    sink: Box<dyn ProductSink>,
    snapshot_path: PathBuf,
}

impl RankingCrawler {
    pub fn new(
        source: Box<dyn PageSource>,
        extractor: RankingExtractor,
        sink: Box<dyn ProductSink>,
    ) -> Self {
        Self {
            source,
            extractor,
            sink,
            snapshot_path: PathBuf::from(SNAPSHOT_PATH),
        }
    }

    #[must_use]
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    /// Run the pipeline once.
    ///
    /// Only snapshot and store failures are errors; a page that cannot be
    /// fetched ends the run quietly with [`RunOutcome::FetchFailed`].
    pub async fn run(&self) -> Result<RunOutcome> {
        let html = match self.source.fetch_page().await {
            Ok(html) => html,
            Err(e) => {
                error!("Failed to fetch HTML content: {}", e);
                return Ok(RunOutcome::FetchFailed);
            }
        };
        info!("Successfully fetched HTML content");

        let extraction = self.extractor.extract(&html);
        info!(
            extracted = extraction.products.len(),
            failed = extraction.failures.len(),
            skipped = extraction.skipped,
            "Total products extracted: {}",
            extraction.products.len()
        );

        if extraction.products.is_empty() {
            warn!("No data to process");
            return Ok(RunOutcome::NoProducts);
        }

        write_snapshot(&self.snapshot_path, &extraction.products).await?;
        info!("Extracted data saved to '{}'", self.snapshot_path.display());

        let stored = self
            .sink
            .store_products(&extraction.products)
            .await
            .context("Failed to store products")?;

        Ok(RunOutcome::Stored {
            extracted: extraction.products.len(),
            failed: extraction.failures.len(),
            stored,
        })
    }
}

/// Overwrite `path` with the records as 4-space indented JSON.
pub async fn write_snapshot(path: &Path, products: &[ProductRecord]) -> Result<()> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    products
        .serialize(&mut serializer)
        .context("Failed to serialize products")?;

    tokio::fs::write(path, buf)
        .await
        .with_context(|| format!("Failed to write snapshot {}", path.display()))
}
