//! Server configuration.
//!
//! Loaded from `~/.config/rel8-sync/config.toml` when present, with serde
//! defaults for everything so a missing file still yields a runnable
//! configuration. Secrets (the Resend API key) can also come from the
//! environment so they stay out of the config file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_port() -> u16 {
    4310
}

fn default_database_url() -> String {
    "sqlite://rel8-sync.db?mode=rwc".to_string()
}

fn default_system_email() -> String {
    "notifications@rel8.app".to_string()
}

fn default_from_address() -> String {
    "REL8 Notifications <notifications@rel8.app>".to_string()
}

/// Configuration at ~/.config/rel8-sync/config.toml
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Address used as the calendar ORGANIZER when a task carries none.
    #[serde(default = "default_system_email")]
    pub system_email: String,

    /// From header for outgoing invitation emails.
    #[serde(default = "default_from_address")]
    pub from_address: String,

    #[serde(default)]
    pub resend_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            database_url: default_database_url(),
            system_email: default_system_email(),
            from_address: default_from_address(),
            resend_api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("rel8-sync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the config file if it exists, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            ServerConfig::default()
        };

        if let Ok(url) = std::env::var("REL8_DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(key) = std::env::var("RESEND_API_KEY") {
            config.resend_api_key = Some(key);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ServerConfig = toml::from_str("port = 9000").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.system_email, "notifications@rel8.app");
        assert!(config.resend_api_key.is_none());
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 4310);
        assert!(config.database_url.starts_with("sqlite://"));
    }
}
