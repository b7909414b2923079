use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};

/// Installs the global fmt subscriber shared by both binaries.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Records
/// emitted through the `log` facade (actix's request logger) are bridged in.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}
