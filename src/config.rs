use std::net::SocketAddr;

use anyhow::{Context, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://items.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_SESSION_COOKIE: &str = "item_sync_session";
pub const DEFAULT_SESSION_LIFETIME_MINUTES: i64 = 120;
/// One year.
pub const MAX_SESSION_LIFETIME_MINUTES: i64 = 525_600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub session: SessionConfig,
}

/// How the session cookie is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub lifetime_minutes: i64,
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            lifetime_minutes: DEFAULT_SESSION_LIFETIME_MINUTES,
            secure: false,
        }
    }
}

impl SessionConfig {
    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lifetime_minutes)
    }
}

impl AppConfig {
    /// Reads the process environment; call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 127.0.0.1:3000")?;

        let lifetime_minutes = match lookup("SESSION_LIFETIME_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|m| (1..=MAX_SESSION_LIFETIME_MINUTES).contains(m))
                .with_context(|| {
                    format!("SESSION_LIFETIME_MINUTES must be between 1 and {MAX_SESSION_LIFETIME_MINUTES}, got {raw:?}")
                })?,
            None => DEFAULT_SESSION_LIFETIME_MINUTES,
        };
        let secure = match lookup("SESSION_SECURE_COOKIE").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => anyhow::bail!("SESSION_SECURE_COOKIE must be true or false, got {other:?}"),
        };
        let cookie_name = lookup("SESSION_COOKIE").unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string());

        Ok(Self {
            database_url,
            bind_addr,
            session: SessionConfig { cookie_name, lifetime_minutes, secure },
        })
    }
}
