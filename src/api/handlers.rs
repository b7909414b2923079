use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use tracing::{debug, error};

use crate::traits::ProductCatalog;

pub const WELCOME_MESSAGE: &str =
    "Welcome to the ranking data pipeline API. Product data is available at /products.";

/// Body of every 500 from `/products`; the underlying cause is only logged.
pub const LIST_FAILED_DETAIL: &str = "internal server error while listing products";

pub async fn welcome() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": WELCOME_MESSAGE }))
}

/// `GET /products`: every stored product, `[]` when the store is empty
pub async fn list_products(catalog: web::Data<dyn ProductCatalog>) -> impl Responder {
    match catalog.list_products().await {
        Ok(products) => {
            debug!(count = products.len(), "Listing products");
            HttpResponse::Ok().json(products)
        }
        Err(e) => {
            error!("Failed to list products: {e}");
            HttpResponse::InternalServerError().json(json!({ "detail": LIST_FAILED_DETAIL }))
        }
    }
}
