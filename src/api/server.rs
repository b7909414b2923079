use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};

use crate::api::routes;
use crate::config::ApiSettings;
use crate::traits::ProductCatalog;

pub struct ApiServer {
    settings: ApiSettings,
}

impl ApiServer {
    pub fn from_settings(settings: ApiSettings) -> Self {
        Self { settings }
    }

    /// Bind and serve until the process is stopped.
    pub async fn run(self, catalog: Arc<dyn ProductCatalog>) -> Result<()> {
        let bind_addr = self.settings.bind_addr();

        tracing::info!(
            host = %self.settings.host,
            port = %self.settings.port,
            "Starting product API server"
        );

        let catalog: web::Data<dyn ProductCatalog> = web::Data::from(catalog);

        HttpServer::new(move || {
            App::new()
                .app_data(catalog.clone())
                .wrap(Logger::default())
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {bind_addr}"))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
