use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Title of the container whose contents are swapped in and out.
    pub slot_title: String,
    /// Title of the container whose child folders are the stored sets.
    pub sets_root_title: String,
    /// Directory the default store, log and config paths live under.
    pub data_dir: PathBuf,
    pub metadata_db_path: PathBuf,
    pub bookmarks_db_path: PathBuf,
    pub log_dir: PathBuf,
    pub store_timeout_ms: u64,
    /// Upper bound on the entries one search returns.
    pub max_results: u16,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_data_dir(stable_app_data_dir())
    }
}

impl Config {
    /// Defaults with every path placed under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            slot_title: "Bookmarks bar".to_string(),
            sets_root_title: "Other bookmarks".to_string(),
            metadata_db_path: data_dir.join("metadata.sqlite3"),
            bookmarks_db_path: data_dir.join("bookmarks.sqlite3"),
            log_dir: data_dir.join("logs"),
            store_timeout_ms: 5_000,
            max_results: 20,
            config_path: data_dir.join("config.toml"),
            data_dir,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Encode(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "config io error: {error}"),
            Self::Parse(error) => write!(f, "config parse error: {error}"),
            Self::Encode(error) => write!(f, "config encode error: {error}"),
            Self::Invalid(error) => write!(f, "invalid config: {error}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

pub fn stable_app_data_dir() -> PathBuf {
    std::env::temp_dir().join("hotbar")
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    if cfg.slot_title.trim().is_empty() {
        return Err("slot_title is required".into());
    }

    if cfg.sets_root_title.trim().is_empty() {
        return Err("sets_root_title is required".into());
    }

    if cfg.slot_title.trim().eq_ignore_ascii_case(cfg.sets_root_title.trim()) {
        return Err("slot_title and sets_root_title must differ".into());
    }

    if cfg.store_timeout_ms < 50 || cfg.store_timeout_ms > 120_000 {
        return Err("store_timeout_ms out of range".into());
    }

    if cfg.max_results < 5 || cfg.max_results > 100 {
        return Err("max_results out of range".into());
    }

    if cfg.data_dir.as_os_str().is_empty() {
        return Err("data_dir is required".into());
    }

    if cfg.metadata_db_path.as_os_str().is_empty() {
        return Err("metadata_db_path is required".into());
    }

    if cfg.bookmarks_db_path.as_os_str().is_empty() {
        return Err("bookmarks_db_path is required".into());
    }

    Ok(())
}

/// Reads the config at `path` (or the default location), falling back to
/// defaults when the file does not exist.
///
/// `.toml` files are parsed as TOML; anything else as JSON5, which also
/// accepts plain JSON.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Config::default().config_path);

    if !config_path.exists() {
        return Ok(Config {
            config_path,
            ..Config::default()
        });
    }

    let raw = std::fs::read_to_string(&config_path)?;
    let mut cfg = parse(&raw, &config_path)?;
    cfg.config_path = config_path;
    validate(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

pub fn parse(raw: &str, path: &Path) -> Result<Config, ConfigError> {
    if is_toml(path) {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    } else {
        json5::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let encoded = if is_toml(&cfg.config_path) {
        toml::to_string_pretty(cfg).map_err(|e| ConfigError::Encode(e.to_string()))?
    } else {
        serde_json::to_string_pretty(cfg).map_err(|e| ConfigError::Encode(e.to_string()))?
    };
    std::fs::write(&cfg.config_path, encoded)?;
    Ok(())
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
