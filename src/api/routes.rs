use actix_web::web;

use crate::api::handlers;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::welcome))
        .route("/products", web::get().to(handlers::list_products));
}
