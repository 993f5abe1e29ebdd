//! Application configuration: TOML file plus environment overrides.

use crate::cache::{CacheConfig, FileStorage};
use crate::errors::CalendarError;
use crate::loader::LoaderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Calendar data endpoint queried on cache misses.
    pub api_endpoint: Option<String>,
    /// Directory for the persisted cache blob.
    pub storage_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub cache: CacheConfig,
    pub loader: LoaderConfig,
}

impl AppConfig {
    /// # Errors
    /// Returns `Config` if the TOML is malformed or a section fails validation.
    pub fn from_toml_str(s: &str) -> Result<Self, CalendarError> {
        let cfg: AppConfig =
            toml::from_str(s).map_err(|e| CalendarError::Config(format!("invalid TOML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, CalendarError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| CalendarError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// # Errors
    /// Returns `Config` if the cache or loader section is invalid.
    pub fn validate(&self) -> Result<(), CalendarError> {
        self.cache.validate()?;
        self.loader.validate()
    }

    /// Applies `SLOTCACHE_API_ENDPOINT` and `SLOTCACHE_STORAGE_DIR` when set.
    pub fn apply_env(&mut self) {
        if let Ok(s) = std::env::var("SLOTCACHE_API_ENDPOINT") {
            if !s.trim().is_empty() {
                self.api_endpoint = Some(s);
            }
        }
        if let Ok(s) = std::env::var("SLOTCACHE_STORAGE_DIR") {
            if !s.trim().is_empty() {
                self.storage_dir = Some(PathBuf::from(s));
            }
        }
    }

    #[must_use]
    pub fn storage_dir_or_default(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(FileStorage::default_dir)
    }
}

/// Candidate config files in precedence order.
#[must_use]
pub fn config_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("SLOTCACHE_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("slotcache.toml"));
    }
    if let Some(home) = dirs_next::home_dir() {
        paths.push(home.join(".config").join("slotcache.toml"));
    }
    paths
}

/// Loads the first existing config file (explicit path, `SLOTCACHE_CONFIG`,
/// `./slotcache.toml`, `~/.config/slotcache.toml`), falling back to defaults,
/// then applies environment overrides.
///
/// # Errors
/// Returns `Config` if an explicit path is missing or any chosen file is invalid.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, CalendarError> {
    if let Some(p) = explicit {
        if !p.exists() {
            return Err(CalendarError::Config(format!("config file not found: {}", p.display())));
        }
    }
    let mut cfg = match config_paths(explicit).into_iter().find(|p| p.is_file()) {
        Some(path) => {
            log::debug!("loading config from {}", path.display());
            AppConfig::from_file(&path)?
        }
        None => AppConfig::default(),
    };
    cfg.apply_env();
    Ok(cfg)
}
