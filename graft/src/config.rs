//! Configuration management for graft
//!
//! Default config location: ~/.graft/config.toml

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub packages: PackagesConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Store file (JSON)
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Directory holding binary assets referenced by nodes
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Workspace nodes are read from and written to
    #[serde(default = "default_workspace")]
    pub workspace: String,
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".graft")
}

fn default_store_path() -> PathBuf {
    default_home().join("store.json")
}

fn default_assets_dir() -> PathBuf {
    default_home().join("assets")
}

pub fn default_workspace() -> String {
    "live".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            assets_dir: default_assets_dir(),
            workspace: default_workspace(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackagesConfig {
    /// Directory containing one sub-directory per package key
    #[serde(default = "default_packages_dir")]
    pub dir: PathBuf,
    /// Package keys that are active and may be exported to / imported from
    #[serde(default)]
    pub active: Vec<String>,
    /// Installed package versions, keyed by package id
    #[serde(default)]
    pub installed: BTreeMap<String, String>,
}

fn default_packages_dir() -> PathBuf {
    default_home().join("packages")
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            dir: default_packages_dir(),
            active: Vec::new(),
            installed: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Indent exported documents
    #[serde(default = "default_true")]
    pub tidy: bool,
    /// Informational tag written into every document header
    #[serde(default = "default_info")]
    pub info: String,
}

fn default_true() -> bool {
    true
}

pub fn default_info() -> String {
    "graft-partial-export".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tidy: true,
            info: default_info(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_level")]
    pub level: String,
    pub file: Option<PathBuf>,
    /// Log output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            format: default_log_format(),
        }
    }
}

/// Expand ~ to home directory
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Load config from default location (~/.graft/config.toml)
    pub fn load() -> Result<Self> {
        Self::load_from(&default_home())
    }

    /// Load config from a specific home directory. Paths that are not set
    /// in the file are placed inside that directory.
    pub fn load_from(home: &Path) -> Result<Self> {
        let config_path = home.join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config {
                store: StoreConfig {
                    path: home.join("store.json"),
                    assets_dir: home.join("assets"),
                    workspace: default_workspace(),
                },
                packages: PackagesConfig {
                    dir: home.join("packages"),
                    ..PackagesConfig::default()
                },
                ..Config::default()
            }
        };

        config.expand_paths()?;
        Ok(config)
    }

    /// Load config from file path, or create default
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.expand_paths()?;
            Ok(config)
        } else {
            let config = Config::default();
            // Try to save default config
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = config.save(config_path);
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Expand ~ in all paths
    fn expand_paths(&mut self) -> Result<()> {
        self.store.path = expand_tilde(&self.store.path)?;
        self.store.assets_dir = expand_tilde(&self.store.assets_dir)?;
        self.packages.dir = expand_tilde(&self.packages.dir)?;
        if let Some(ref f) = self.logging.file {
            self.logging.file = Some(expand_tilde(f)?);
        }
        Ok(())
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.store.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.store.assets_dir)?;
        fs::create_dir_all(&self.packages.dir)?;
        if let Some(parent) = self.logging.file.as_ref().and_then(|f| f.parent()) {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
