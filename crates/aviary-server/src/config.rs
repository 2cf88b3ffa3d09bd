use std::path::PathBuf;
use std::time::Duration;

/// Server configuration, read from the environment (a .env file is loaded
/// first when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Trusted token issuer; its JWKS is fetched from
    /// `{issuer}/.well-known/jwks.json`.
    pub issuer: String,
    pub audience: String,
    pub db_path: PathBuf,
    /// Optional shared secret required on the feed endpoint
    /// (`x-feed-token` header).
    pub feed_token: Option<String>,
    /// Channels with no traffic or pong for this long are swept from the
    /// registry.
    pub stale_after: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let issuer = std::env::var("AVIARY_ISSUER")
            .map_err(|_| anyhow::anyhow!("AVIARY_ISSUER is required"))?;
        let audience = std::env::var("AVIARY_AUDIENCE")
            .map_err(|_| anyhow::anyhow!("AVIARY_AUDIENCE is required"))?;

        let host = std::env::var("AVIARY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("AVIARY_PORT")
            .unwrap_or_else(|_| "3400".into())
            .parse()?;
        let db_path: PathBuf = std::env::var("AVIARY_DB_PATH")
            .unwrap_or_else(|_| "aviary.db".into())
            .into();
        let feed_token = std::env::var("AVIARY_FEED_TOKEN").ok().filter(|t| !t.is_empty());
        let stale_secs: u64 = std::env::var("AVIARY_STALE_AFTER_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600); // 1 hour

        Ok(Self {
            host,
            port,
            issuer,
            audience,
            db_path,
            feed_token,
            stale_after: Duration::from_secs(stale_secs),
        })
    }
}
