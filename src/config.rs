use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::{SqliteStore, VALIDITY_WINDOW};
use crate::service::{FieldAliases, GroupKeyColumns};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub grouping: GroupKeyColumns,
  /// Logical field name to header spellings, replacing the built-in lists
  pub fields: BTreeMap<String, Vec<String>>,
  /// Per-dataset overrides keyed by dataset name (`vendor`, `invoice`, ...)
  pub datasets: BTreeMap<String, DatasetOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Web-app endpoint of the spreadsheet
  pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false nothing is cached and every load goes to the network
  pub enabled: bool,
  /// SQLite file (defaults to the platform data directory)
  pub path: Option<PathBuf>,
  pub validity_secs: u64,
  /// Drop a refresh that finishes after a newer one of the same dataset started
  pub discard_superseded: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      validity_secs: VALIDITY_WINDOW.as_secs(),
      discard_superseded: false,
    }
  }
}

impl CacheConfig {
  pub fn validity(&self) -> Duration {
    Duration::from_secs(self.validity_secs)
  }

  pub fn resolved_path(&self) -> Result<PathBuf> {
    match &self.path {
      Some(path) => Ok(path.clone()),
      None => SqliteStore::default_path(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatasetOverride {
  pub table: Option<String>,
  pub empty_message: Option<String>,
  pub error_message: Option<String>,
  pub column_span: Option<u16>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./larosa.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/larosa/config.yaml
  ///
  /// Without any file the defaults apply; only a missing explicit path is an error.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("larosa.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("larosa").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Endpoint of the remote store. `LAROSA_API_URL` wins over the file.
  pub fn api_url(&self) -> Result<Url> {
    let raw = std::env::var("LAROSA_API_URL")
      .ok()
      .or_else(|| self.api.url.clone())
      .ok_or_else(|| {
        eyre!("API endpoint not configured. Set api.url in the config file or LAROSA_API_URL.")
      })?;

    Url::parse(&raw).map_err(|e| eyre!("Invalid API endpoint {}: {}", raw, e))
  }

  pub fn field_aliases(&self) -> FieldAliases {
    FieldAliases::with_overrides(&self.fields)
  }

  /// Get the login password from the environment.
  ///
  /// Checks LAROSA_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("LAROSA_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set LAROSA_PASSWORD environment variable."))
  }
}
