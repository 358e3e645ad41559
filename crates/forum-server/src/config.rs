use anyhow::{Context, Result};
use chrono::Duration;

/// Process configuration, collected from the environment (a `.env` file is
/// honored when present).
pub struct Config {
    pub secret_key: String,
    pub token_ttl: Duration,
    /// SQLite file path, or the literal `:memory:` to run on the in-memory
    /// store backend.
    pub db_path: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let ttl_minutes: i64 = env_or("FORUM_TOKEN_TTL_MINUTES", "30")
            .parse()
            .context("FORUM_TOKEN_TTL_MINUTES must be an integer")?;
        let port: u16 = env_or("FORUM_PORT", "8000")
            .parse()
            .context("FORUM_PORT must be a port number")?;

        Ok(Self {
            secret_key: env_or("FORUM_SECRET_KEY", "dev-secret-change-me"),
            token_ttl: Duration::minutes(ttl_minutes),
            db_path: env_or("FORUM_DB_PATH", "forum.db"),
            host: env_or("FORUM_HOST", "0.0.0.0"),
            port,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
