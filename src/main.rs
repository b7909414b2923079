use anyhow::Result;
use tracing::info;

use ranking_crawler::browser::{BrowserFetcher, FetchConfig};
use ranking_crawler::config::{BrowserSettings, DatabaseSettings};
use ranking_crawler::crawler::{RankingCrawler, RunOutcome};
use ranking_crawler::database::Database;
use ranking_crawler::logging::init_tracing;
use ranking_crawler::scraper::{ProductSelectors, RankingExtractor};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info,sqlx=warn")?;

    info!("Starting the ranking crawler");

    let db_settings = DatabaseSettings::from_env()?;
    let fetcher = BrowserFetcher::new(FetchConfig::from_settings(&BrowserSettings::from_env()));
    let extractor = RankingExtractor::new(&ProductSelectors::default())?;
    let database = Database::connect_lazy(&db_settings);

    let crawler = RankingCrawler::new(Box::new(fetcher), extractor, Box::new(database));

    match crawler.run().await? {
        RunOutcome::FetchFailed => info!("Failed to fetch HTML content. Exiting."),
        RunOutcome::NoProducts => info!("No data to process. Exiting."),
        RunOutcome::Stored {
            extracted,
            failed,
            stored,
        } => info!(extracted, failed, stored, "Crawl finished"),
    }

    Ok(())
}
