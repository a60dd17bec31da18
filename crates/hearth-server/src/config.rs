use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use hearth_gateway::ChatSettings;
use hearth_types::events::BroadcastScope;

/// Secrets that ship as defaults and must not guard a real deployment.
const PLACEHOLDER_SECRETS: &[&str] = &["please_change_this_secret", "change-me", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub passcode: String,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub broadcast_scope: BroadcastScope,
    pub unique_channel_names: bool,
}

impl Config {
    /// Read configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = var("HEARTH_PORT", "3000")
            .parse()
            .context("Invalid HEARTH_PORT")?;
        let session_ttl_hours: i64 = var("HEARTH_SESSION_TTL_HOURS", "24")
            .parse()
            .context("Invalid HEARTH_SESSION_TTL_HOURS")?;
        if session_ttl_hours <= 0 {
            bail!("HEARTH_SESSION_TTL_HOURS must be positive, got {}", session_ttl_hours);
        }
        let broadcast_scope = var("HEARTH_BROADCAST_SCOPE", "channel")
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid HEARTH_BROADCAST_SCOPE")?;
        let unique_channel_names =
            parse_bool(&var("HEARTH_UNIQUE_CHANNEL_NAMES", "false")).context("Invalid HEARTH_UNIQUE_CHANNEL_NAMES")?;

        Ok(Self {
            host: var("HEARTH_HOST", "0.0.0.0"),
            port,
            db_path: var("HEARTH_DB_PATH", "chat.sqlite").into(),
            passcode: var("HEARTH_PASSCODE", "changeme"),
            session_secret: var("HEARTH_SESSION_SECRET", "please_change_this_secret"),
            session_ttl_hours,
            broadcast_scope,
            unique_channel_names,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.session_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.session_secret.as_str())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            broadcast_scope: self.broadcast_scope,
            unique_channel_names: self.unique_channel_names,
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}
