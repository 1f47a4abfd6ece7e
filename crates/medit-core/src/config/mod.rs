//! Application configuration.
//!
//! One JSON file holds the remote table settings, the AI endpoint settings, and
//! sync timing. Environment variables override the file so that credentials
//! can come from a `.env` file instead of disk.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{normalize_text_option, trim_url};

pub const ENV_REMOTE_URL: &str = "MEDIT_REMOTE_URL";
pub const ENV_REMOTE_TOKEN: &str = "MEDIT_REMOTE_TOKEN";
pub const ENV_REMOTE_TABLE: &str = "MEDIT_REMOTE_TABLE";
pub const ENV_AI_URL: &str = "MEDIT_AI_URL";
pub const ENV_AI_KEY: &str = "MEDIT_AI_KEY";
pub const ENV_AI_MODEL: &str = "MEDIT_AI_MODEL";

const DEFAULT_RETRY_CAP: u32 = 3;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1;
const DEFAULT_FULL_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Remote table connection. All three values are required for sync; none of
/// them means local-only mode.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub table_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AiAuth {
    /// `Authorization: Bearer <key>`
    #[default]
    Bearer,
    /// `x-api-key: <key>`
    ApiKey,
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub auth: AiAuth,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_full_interval_secs")]
    pub full_interval_secs: u64,
    #[serde(default = "default_retry_cap")]
    pub retry_cap: u32,
}

const fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

const fn default_full_interval_secs() -> u64 {
    DEFAULT_FULL_INTERVAL_SECS
}

const fn default_retry_cap() -> u32 {
    DEFAULT_RETRY_CAP
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            full_interval_secs: DEFAULT_FULL_INTERVAL_SECS,
            retry_cap: DEFAULT_RETRY_CAP,
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    #[must_use]
    pub fn full_interval(&self) -> Duration {
        Duration::from_secs(self.full_interval_secs.max(1))
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Overlay `MEDIT_*` variables from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; blank values leave the file value in place.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| normalize_text_option(lookup(key));

        if let Some(value) = get(ENV_REMOTE_URL) {
            self.remote.base_url = Some(value);
        }
        if let Some(value) = get(ENV_REMOTE_TOKEN) {
            self.remote.api_token = Some(value);
        }
        if let Some(value) = get(ENV_REMOTE_TABLE) {
            self.remote.table_id = Some(value);
        }
        if let Some(value) = get(ENV_AI_URL) {
            self.ai.base_url = Some(value);
        }
        if let Some(value) = get(ENV_AI_KEY) {
            self.ai.api_key = Some(value);
        }
        if let Some(value) = get(ENV_AI_MODEL) {
            self.ai.model = Some(value);
        }
        self
    }

    fn normalize(&mut self) {
        self.remote.normalize();
        self.ai.normalize();
        self.sync.retry_cap = self.sync.retry_cap.max(1);
    }
}

impl RemoteConfig {
    /// Whether any remote value is present.
    #[must_use]
    pub const fn is_any_set(&self) -> bool {
        self.base_url.is_some() || self.api_token.is_some() || self.table_id.is_some()
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.base_url.is_some() && self.api_token.is_some() && self.table_id.is_some()
    }

    /// Names of the required values that are absent.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.base_url.is_none() {
            missing.push("base_url");
        }
        if self.api_token.is_none() {
            missing.push("api_token");
        }
        if self.table_id.is_none() {
            missing.push("table_id");
        }
        missing
    }

    fn normalize(&mut self) {
        self.base_url = normalize_text_option(self.base_url.take())
            .map(|url| trim_url(&url).to_string());
        self.api_token = normalize_text_option(self.api_token.take());
        self.table_id = normalize_text_option(self.table_id.take());
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("table_id", &self.table_id)
            .finish()
    }
}

impl AiConfig {
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some() && self.model.is_some()
    }

    fn normalize(&mut self) {
        self.base_url = normalize_text_option(self.base_url.take())
            .map(|url| trim_url(&url).to_string());
        self.api_key = normalize_text_option(self.api_key.take());
        self.model = normalize_text_option(self.model.take());
    }
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("auth", &self.auth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempdir().unwrap();
        let config = AppConfig::load_from_path(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync.retry_cap, 3);
        assert_eq!(config.sync.full_interval(), Duration::from_secs(300));
    }

    #[test]
    fn save_and_load_normalizes_values() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("medit").join("config.json");

        let config = AppConfig {
            remote: RemoteConfig {
                base_url: Some(" https://tables.example.com/ ".to_string()),
                api_token: Some("  ".to_string()),
                table_id: Some("tbl1".to_string()),
            },
            ..AppConfig::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(
            loaded.remote.base_url.as_deref(),
            Some("https://tables.example.com")
        );
        assert_eq!(loaded.remote.api_token, None);
        assert_eq!(loaded.remote.missing_fields(), vec!["api_token"]);
        assert!(loaded.remote.is_any_set());
        assert!(!loaded.remote.is_complete());
    }

    #[test]
    fn partial_sync_section_uses_defaults() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "sync": { "retry_cap": 5 } }"#).unwrap();

        let loaded = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.sync.retry_cap, 5);
        assert_eq!(loaded.sync.sweep_interval_secs, 1);
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let error = AppConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn overrides_replace_file_values_but_ignore_blanks() {
        let env = HashMap::from([
            (ENV_REMOTE_URL, "https://env.example.com"),
            (ENV_REMOTE_TOKEN, "   "),
            (ENV_AI_MODEL, "gpt-4o-mini"),
        ]);
        let base = AppConfig {
            remote: RemoteConfig {
                base_url: Some("https://file.example.com".to_string()),
                api_token: Some("file-token".to_string()),
                table_id: None,
            },
            ..AppConfig::default()
        };

        let merged =
            base.with_overrides(|key| env.get(key).map(std::string::ToString::to_string));
        assert_eq!(
            merged.remote.base_url.as_deref(),
            Some("https://env.example.com")
        );
        assert_eq!(merged.remote.api_token.as_deref(), Some("file-token"));
        assert_eq!(merged.ai.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig {
            remote: RemoteConfig {
                api_token: Some("remote-secret".to_string()),
                ..RemoteConfig::default()
            },
            ai: AiConfig {
                api_key: Some("ai-secret".to_string()),
                ..AiConfig::default()
            },
            ..AppConfig::default()
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains("remote-secret"));
        assert!(!debug.contains("ai-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn ai_auth_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&AiAuth::ApiKey).unwrap(),
            "\"api-key\""
        );
    }
}
