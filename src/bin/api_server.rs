use std::sync::Arc;

use anyhow::Result;

use ranking_crawler::api::ApiServer;
use ranking_crawler::config::{ApiSettings, DatabaseSettings};
use ranking_crawler::database::PgCatalog;
use ranking_crawler::logging::init_tracing;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info,sqlx=warn")?;

    tracing::info!("Initializing product API server");

    let db_settings = DatabaseSettings::from_env()?;
    let catalog = Arc::new(PgCatalog::new(db_settings.connect_options()));

    ApiServer::from_settings(ApiSettings::from_env()?)
        .run(catalog)
        .await
}
