use std::env::VarError;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::settings::{ConnectionSettings, SslMode, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};

/// Process configuration loaded from environment variables.
/// Startup fails if a required variable is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_ssl_mode: SslMode,
    pub db_connect_timeout: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            db_user: require_env("DB_USER")?,
            db_password: require_env("DB_PASSWORD")?,
            db_name: require_env("DB_NAME")?,
            db_host: require_env("DB_HOST")?,
            db_port: match optional_env("DB_PORT")? {
                Some(port) => parse_port(&port)?,
                None => DEFAULT_PORT,
            },
            db_ssl_mode: match optional_env("DB_SSLMODE")? {
                Some(mode) => mode
                    .parse::<SslMode>()
                    .context("DB_SSLMODE must be one of disable, prefer, require")?,
                None => SslMode::default(),
            },
            db_connect_timeout: match optional_env("DB_CONNECT_TIMEOUT_SECS")? {
                Some(secs) => parse_timeout(&secs)?,
                None => DEFAULT_CONNECT_TIMEOUT,
            },
            rust_log: optional_env("RUST_LOG")?.unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(
            self.db_user.clone(),
            self.db_password.clone(),
            self.db_name.clone(),
            self.db_host.clone(),
        )
        .with_port(self.db_port)
        .with_ssl_mode(self.db_ssl_mode)
        .with_connect_timeout(self.db_connect_timeout)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// `None` only when the variable is unset; a non-Unicode value is an error.
fn optional_env(key: &str) -> Result<Option<String>> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Environment variable '{key}' is not valid")),
    }
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .context("DB_PORT must be a valid port number")
}

fn parse_timeout(value: &str) -> Result<Duration> {
    let secs = value
        .parse::<u64>()
        .context("DB_CONNECT_TIMEOUT_SECS must be a whole number of seconds")?;
    Ok(Duration::from_secs(secs))
}
