//! Server configuration from environment variables (a `.env` file is loaded by the binary).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Schema holding the member table. Must be a valid PostgreSQL identifier.
    pub schema: String,
    pub max_connections: u32,
    /// Upper bound on how long a write waits for rank locks before failing with a retryable error.
    pub lock_timeout: Duration,
    pub auth_secret: String,
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/fessef_db".into());
        let bind_addr = parse(&get, "BIND_ADDR", "0.0.0.0:3001")?;
        let schema = get("MEMBERS_SCHEMA").unwrap_or_else(|| "public".into());
        let max_connections = parse(&get, "MAX_CONNECTIONS", "10")?;
        let lock_timeout_ms: u64 = parse(&get, "LOCK_TIMEOUT_MS", "5000")?;
        let auth_secret = get("AUTH_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("AUTH_SECRET"))?;
        let upload_dir = get("UPLOAD_DIR").unwrap_or_else(|| "public/uploads".into()).into();

        Ok(ServerConfig {
            database_url,
            bind_addr,
            schema,
            max_connections,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            auth_secret,
            upload_dir,
        })
    }
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    let value = get(key).unwrap_or_else(|| default.to_string());
    value.parse().map_err(|_| ConfigError::Invalid { key, value })
}
