//! Environment-driven settings for the pipeline and the API server.
//!
//! Values come from the process environment, after `.env` has been loaded
//! with `dotenvy`. Every reader also accepts an explicit lookup function so
//! settings can be built from a fixed map.

use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use sqlx::postgres::PgConnectOptions;

/// Connection parameters for the PostgreSQL store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
}

impl DatabaseSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            host: lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or("DB_PORT", &lookup, 5432)?,
            database: required("DB_NAME", &lookup)?,
            user: required("DB_USER", &lookup)?,
            password: lookup("DB_PASSWORD"),
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user);

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }
}

/// Where the WebDriver endpoint lives and how the browser should run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
}

impl BrowserSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            webdriver_url: lookup("WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:9515".to_string()),
            headless: lookup("BROWSER_HEADLESS").is_some_and(|raw| is_truthy(&raw)),
        }
    }
}

/// Bind address of the read API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

impl ApiSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("API_PORT", &lookup, 8000)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Unset and blank variables both read as absent.
fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String> {
    lookup(key).ok_or_else(|| anyhow!("missing env var {key}"))
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
