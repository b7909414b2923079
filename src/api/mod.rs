//! Read-only HTTP API over the stored products

pub mod handlers;
pub mod routes;
pub mod server;

pub use routes::configure_routes;
pub use server::ApiServer;
