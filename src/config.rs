use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "todolist.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub firestore: FirestoreConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Firestore,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid(format!("unknown store backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_base_url() -> String { "https://firestore.googleapis.com".to_string() }
fn default_database() -> String { "(default)".to_string() }
fn default_collection() -> String { "tasks".to_string() }
fn default_timeout_ms() -> u64 { 10_000 }
fn default_page_size() -> u32 { 300 }

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: String::new(),
            base_url: default_base_url(),
            database: default_database(),
            collection: default_collection(),
            timeout_ms: default_timeout_ms(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_tick_ms() -> u64 { 1_000 }

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_level")]
    pub level: String,

    /// Log directory; the system temp dir when empty.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_true() -> bool { true }
fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_level(),
            directory: None,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Firestore
            && self.firestore.project_id.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "firestore.project_id is required for the firestore backend".to_string(),
            ));
        }
        if self.ui.tick_ms == 0 {
            return Err(ConfigError::Invalid("ui.tick_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Reads `path` when it exists, defaults otherwise, then applies env overrides.
pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut cfg = if path.exists() {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

fn apply_env_overrides(
    cfg: &mut AppConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("TODOLIST_STORE") {
        cfg.store.backend = v.parse()?;
    }
    if let Some(v) = non_empty("TODOLIST_FIRESTORE_PROJECT") {
        cfg.firestore.project_id = v;
    }
    if let Some(v) = non_empty("TODOLIST_FIRESTORE_API_KEY") {
        cfg.firestore.api_key = v;
    }
    if let Some(v) = non_empty("TODOLIST_FIRESTORE_BASE_URL") {
        cfg.firestore.base_url = v;
    }
    Ok(())
}
