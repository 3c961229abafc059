use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Origin relative precache entries resolve against, e.g.
  /// "https://app.example.com".
  pub base_url: String,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Directory holding the queue and cache databases
  /// (defaults to the platform data directory)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Cache generation tag; bump it to invalidate everything cached so far
  #[serde(default = "default_tag")]
  pub tag: String,
  /// Resources fetched and cached at install time, relative to base_url
  #[serde(default)]
  pub precache: Vec<String>,
}

fn default_tag() -> String {
  "v1".to_string()
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      tag: default_tag(),
      precache: Vec::new(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./reqstash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/reqstash/config.yaml
  /// 4. ~/.config/reqstash/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(Error::Config(format!(
          "Config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(Error::Config(
        "No configuration file found. Create one at ~/.config/reqstash/config.yaml\n\
                 See config.example.yaml for the format."
          .to_string(),
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("reqstash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("reqstash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| Error::Config(format!("Failed to parse config file {}: {}", path.display(), e)))?;

    Ok(config)
  }

  /// Resolve one precache entry against base_url. Absolute entries pass
  /// through unchanged.
  pub fn resolve(&self, entry: &str) -> Result<Url> {
    let base = Url::parse(&self.base_url)
      .map_err(|e| Error::Config(format!("Invalid base_url {}: {}", self.base_url, e)))?;

    base
      .join(entry)
      .map_err(|e| Error::Config(format!("Invalid precache entry {}: {}", entry, e)))
  }

  /// The full precache manifest as resolved URLs.
  pub fn manifest_urls(&self) -> Result<Vec<Url>> {
    self
      .cache
      .precache
      .iter()
      .map(|entry| self.resolve(entry))
      .collect()
  }

  /// Directory the databases live in.
  pub fn store_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    dirs::data_dir()
      .map(|dir| dir.join("reqstash"))
      .ok_or_else(|| {
        Error::Config("Could not determine a data directory. Set data_dir in the config.".to_string())
      })
  }

  pub fn queue_db_path(&self) -> Result<PathBuf> {
    Ok(self.store_dir()?.join("queue.db"))
  }

  pub fn cache_db_path(&self) -> Result<PathBuf> {
    Ok(self.store_dir()?.join("assets.db"))
  }
}
