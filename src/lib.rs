//! Ranking-page crawler: renders a product ranking page in a browser, turns
//! its list items into product records and upserts them into PostgreSQL. The
//! stored products are served back by a small read-only HTTP API.

pub mod api;
pub mod browser;
pub mod config;
pub mod crawler;
pub mod database;
pub mod logging;
pub mod models;
pub mod scraper;
pub mod traits;
