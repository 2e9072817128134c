use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dbinit::config::Config;
use dbinit::Database;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dbinit v{}", env!("CARGO_PKG_VERSION"));

    let settings = config.connection_settings();
    info!(
        "Connecting to PostgreSQL at {}:{} (sslmode={})",
        settings.host, settings.port, settings.ssl_mode
    );

    let db = match Database::initialize(&settings).await {
        Ok(db) => db,
        Err(e) => {
            error!("Database initialization failed: {e}");
            return Err(e.into());
        }
    };

    db.close().await;
    Ok(())
}
