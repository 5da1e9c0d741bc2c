//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$LISTINDEX_CONFIG` (environment variable) or an explicit `--config` path
//! 2. `~/.config/listindex/config.toml` (Linux/macOS)
//!    `%APPDATA%\listindex\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override whatever the file says.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where and how segments are stored.
    pub storage: StorageConfig,
    /// Extraction and indexing policy.
    pub indexing: IndexingConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Directory for the log file. Defaults to the user cache directory.
    pub log_dir: Option<PathBuf>,
}

/// Segment storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path prefix shared by all segment directories (`<prefix>*`).
    pub path_prefix: PathBuf,
    /// Document count above which an overflow segment is not reused.
    pub chunk_size: u64,
    /// Memory budget of the segment writer in bytes.
    pub writer_memory: usize,
}

/// Extraction and indexing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Number of submitted documents after which a file boundary flushes.
    pub flush_interval: u64,
    /// Stemming language (ISO code or English name).
    pub language: String,
    /// Per-list stemming languages, overriding `language`.
    pub languages: BTreeMap<String, String>,
    /// Charset assumed for parts that do not declare one.
    pub default_charset: String,
    /// Base of the display URL stored in every payload.
    pub url_base: String,
    /// Rebuild every bucket from scratch instead of resuming.
    pub force: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path_prefix: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("listindex")
                .join("listdb"),
            chunk_size: 1_000_000,
            writer_memory: 50_000_000,
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            flush_interval: 1000,
            language: "en".to_string(),
            languages: BTreeMap::new(),
            default_charset: "iso-8859-1".to_string(),
            url_base: "http://lists.debian.org/".to_string(),
            force: false,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let path = explicit.map(Path::to_path_buf).or_else(config_file_path);
    if let Some(path) = path {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("LISTINDEX_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("listindex").join("config.toml"))
}

/// Return the directory that receives `listindex.log`.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("listindex")
}
