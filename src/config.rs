//! Configuration loading
//!
//! Loads settings from environment variables and optional config files.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of statically configured admin IDs
    #[serde(rename = "admin_ids")]
    pub admin_ids_str: Option<String>,

    /// Directory holding the JSON store
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides; not checked into git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() maps UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Telegram IDs seeded into the persisted admin set at startup
    #[must_use]
    pub fn admin_ids(&self) -> HashSet<i64> {
        self.admin_ids_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_list_parsing() {
        let mut settings = Settings {
            telegram_token: "dummy".to_string(),
            admin_ids_str: None,
            data_dir: default_data_dir(),
        };
        assert!(settings.admin_ids().is_empty());

        // Comma
        settings.admin_ids_str = Some("123,456".to_string());
        let admins = settings.admin_ids();
        assert!(admins.contains(&123));
        assert!(admins.contains(&456));
        assert_eq!(admins.len(), 2);

        // Space
        settings.admin_ids_str = Some("111 222".to_string());
        let admins = settings.admin_ids();
        assert!(admins.contains(&111));
        assert!(admins.contains(&222));

        // Semicolon and mixed separators
        settings.admin_ids_str = Some("333; 444, 555".to_string());
        let admins = settings.admin_ids();
        assert_eq!(admins.len(), 3);

        // Bad tokens are skipped
        settings.admin_ids_str = Some("abc, 777".to_string());
        let admins = settings.admin_ids();
        assert!(admins.contains(&777));
        assert_eq!(admins.len(), 1);
    }

    #[test]
    fn test_data_dir_defaults() {
        let settings = Settings {
            telegram_token: "dummy".to_string(),
            admin_ids_str: None,
            data_dir: default_data_dir(),
        };
        assert_eq!(settings.data_dir, "data");
    }
}
