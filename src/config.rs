// Configuration: credentials and client settings, read from a JSON file in
// the user's home directory with `FEISHU_<KEY>` environment overrides.

use crate::error::{FeishuError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_FILENAME: &str = ".feishu_config.json";
pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Every key accepted by `config set/get`.
pub const KEYS: [&str; 8] = [
    "app_id",
    "app_secret",
    "base_url",
    "default_folder_token",
    "timeout_secs",
    "max_retries",
    "retry_backoff_ms",
    "cache_token",
];

/// Persisted configuration. Unset fields fall back to defaults through the
/// accessor methods, so the file only holds what the user set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_folder_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_token: Option<bool>,
}

/// App credentials exchanged for a tenant access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub app_secret: String,
}

/// Settings the HTTP client is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub cache_token: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 0,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            cache_token: false,
        }
    }
}

/// Location of the config file: `FEISHU_CONFIG` if set, otherwise
/// `~/.feishu_config.json`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("FEISHU_CONFIG") {
        return PathBuf::from(path);
    }
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(CONFIG_FILENAME)
}

fn env_key(key: &str) -> String {
    format!("FEISHU_{}", key.to_uppercase())
}

impl Config {
    /// Load from `path`, or defaults when the file is missing. A corrupt
    /// file is reported and ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("ignoring unreadable config file {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("saved config to {}", path.display());
        Ok(())
    }

    /// Value stored in the file, ignoring the environment.
    pub fn stored(&self, key: &str) -> Result<Option<String>> {
        let value = match key {
            "app_id" => self.app_id.clone(),
            "app_secret" => self.app_secret.clone(),
            "base_url" => self.base_url.clone(),
            "default_folder_token" => self.default_folder_token.clone(),
            "timeout_secs" => self.timeout_secs.map(|v| v.to_string()),
            "max_retries" => self.max_retries.map(|v| v.to_string()),
            "retry_backoff_ms" => self.retry_backoff_ms.map(|v| v.to_string()),
            "cache_token" => self.cache_token.map(|v| v.to_string()),
            other => return Err(unknown_key(other)),
        };
        Ok(value)
    }

    /// Effective value: `FEISHU_<KEY>` first, then the file.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let stored = self.stored(key)?;
        match std::env::var(env_key(key)) {
            Ok(v) if !v.is_empty() => Ok(Some(v)),
            _ => Ok(stored),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "app_id" => self.app_id = Some(value.to_string()),
            "app_secret" => self.app_secret = Some(value.to_string()),
            "base_url" => self.base_url = Some(value.trim_end_matches('/').to_string()),
            "default_folder_token" => self.default_folder_token = Some(value.to_string()),
            "timeout_secs" => self.timeout_secs = Some(parse_value(key, value)?),
            "max_retries" => self.max_retries = Some(parse_value(key, value)?),
            "retry_backoff_ms" => self.retry_backoff_ms = Some(parse_value(key, value)?),
            "cache_token" => self.cache_token = Some(parse_value(key, value)?),
            other => return Err(unknown_key(other)),
        }
        Ok(())
    }

    /// Effective values for every key, with secrets masked.
    pub fn list_masked(&self) -> Result<Vec<(&'static str, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                let shown = match value {
                    Some(v) if key.contains("secret") => mask_secret(&v),
                    Some(v) => v,
                    None => "N/A".to_string(),
                };
                Ok((*key, shown))
            })
            .collect()
    }

    /// Credentials, or a config error naming the missing one and how to set it.
    pub fn credentials(&self) -> Result<Credentials> {
        let app_id = self.get("app_id")?.ok_or_else(|| missing("app_id"))?;
        let app_secret = self.get("app_secret")?.ok_or_else(|| missing("app_secret"))?;
        Ok(Credentials { app_id, app_secret })
    }

    pub fn default_folder_token(&self) -> Option<String> {
        self.get("default_folder_token").ok().flatten()
    }

    pub fn client_settings(&self) -> Result<ClientSettings> {
        let defaults = ClientSettings::default();
        Ok(ClientSettings {
            base_url: self
                .get("base_url")?
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout_secs: self.parsed("timeout_secs")?.unwrap_or(defaults.timeout_secs),
            max_retries: self.parsed("max_retries")?.unwrap_or(defaults.max_retries),
            retry_backoff_ms: self
                .parsed("retry_backoff_ms")?
                .unwrap_or(defaults.retry_backoff_ms),
            cache_token: self.parsed("cache_token")?.unwrap_or(defaults.cache_token),
        })
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)?
            .map(|v| parse_value(key, &v))
            .transpose()
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| FeishuError::Config(format!("invalid value for {}: {}", key, value)))
}

fn unknown_key(key: &str) -> FeishuError {
    FeishuError::Config(format!(
        "unknown config key '{}' (expected one of: {})",
        key,
        KEYS.join(", ")
    ))
}

fn missing(key: &str) -> FeishuError {
    FeishuError::Config(format!(
        "{key} is not configured; set {} or run `feishu config set {key} <value>`",
        env_key(key)
    ))
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}***", visible)
}
