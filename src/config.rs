//! Configuration management for shelfcrawl.
//!
//! A [`Config`] file (TOML, YAML or JSON) is discovered, parsed with serde and
//! merged onto [`Settings::default`]. CLI flags are applied last by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crawler::{CrawlOptions, SiteProfile};
use crate::scrapers::BrowserEngineConfig;

/// Default store filename inside the data directory.
pub const DEFAULT_STORE_FILENAME: &str = "items.csv";

/// Config file basenames searched in the working and config directories.
const CONFIG_BASENAMES: &[&str] = &[
    "shelfcrawl.toml",
    "shelfcrawl.yaml",
    "shelfcrawl.yml",
    "shelfcrawl.json",
];

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Store filename (relative to `data_dir`) or absolute path.
    pub store_filename: String,
    /// Directory for backup files written when the store rejects a batch.
    /// Defaults to the store's directory.
    pub backup_dir: Option<PathBuf>,
    /// Crawl tuning.
    pub crawl: CrawlOptions,
    /// Storefront selectors.
    pub site: SiteProfile,
    /// Browser engine settings.
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            store_filename: DEFAULT_STORE_FILENAME.to_string(),
            backup_dir: None,
            crawl: CrawlOptions::default(),
            site: SiteProfile::default(),
            browser: BrowserEngineConfig::default().with_env_overrides(),
        }
    }
}

impl Settings {
    /// Full path of the persisted store.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_filename)
    }

    /// Directory backup files are written to.
    pub fn backup_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.backup_dir {
            return dir.clone();
        }
        self.store_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.data_dir.clone())
    }

    /// Ensure the data and backup directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [self.data_dir.clone(), self.backup_dir()] {
            fs::create_dir_all(&dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                )
            })?;
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Store filename or path.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "output")]
    pub store: Option<String>,
    /// Backup directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
    /// Seed category URL used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl: Option<CrawlOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load a configuration file.
    ///
    /// Search order: `explicit`, `$SHELFCRAWL_CONFIG`, the working directory,
    /// then the user config directory. A missing file yields the defaults; a
    /// file that exists but fails to parse is an error.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, String> {
        match Self::discover(explicit) {
            Some(path) => Self::load_from_path(&path).await,
            None => Ok(Self::default()),
        }
    }

    fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(env_path) = std::env::var("SHELFCRAWL_CONFIG") {
            if !env_path.is_empty() {
                return Some(PathBuf::from(shellexpand::tilde(&env_path).as_ref()));
            }
        }

        let mut dirs_to_search = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            dirs_to_search.push(config_dir.join("shelfcrawl"));
        }

        for dir in dirs_to_search {
            for name in CONFIG_BASENAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        // `config.*` is accepted inside the dedicated config directory only
        let config_dir = dirs::config_dir()?.join("shelfcrawl");
        ["config.toml", "config.yaml", "config.yml", "config.json"]
            .iter()
            .map(|name| config_dir.join(name))
            .find(|p| p.is_file())
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        match ext {
            "json" => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
        }
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        let base_dir = self.base_dir();
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, &base_dir);
        }
        if let Some(ref store) = self.store {
            settings.store_filename = store.clone();
        }
        if let Some(ref backup_dir) = self.backup_dir {
            settings.backup_dir = Some(self.resolve_path(backup_dir, &base_dir));
        }
        if let Some(ref crawl) = self.crawl {
            settings.crawl = crawl.clone();
        }
        if let Some(ref site) = self.site {
            settings.site = site.clone();
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone().with_env_overrides();
        }
    }
}

/// Load settings from the discovered config file.
pub async fn load_settings(explicit: Option<&Path>) -> Result<(Settings, Config), String> {
    let config = Config::load(explicit).await?;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    Ok((settings, config))
}
