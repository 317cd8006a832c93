//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\music-streamer\config.toml
//! - macOS: ~/Library/Application Support/music-streamer/config.toml
//! - Linux: ~/.config/music-streamer/config.toml
//!
//! Every setting is optional. Command-line flags and their environment
//! variables (`MUSIC_ROOT`, `MUSIC_CACHE`, `PORT`) take precedence over the
//! file, and the file over built-in defaults. See [`Settings::resolve`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::library::DEFAULT_SCAN_CONCURRENCY;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default cache snapshot file name, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = "cache.json";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library settings
    pub library: LibraryConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

/// Library location and scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Music root containing one directory per category
    pub root: Option<PathBuf>,

    /// Metadata cache snapshot file
    pub cache_file: Option<PathBuf>,

    /// Tag reads allowed in flight during a scan
    pub scan_concurrency: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: None,
            cache_file: None,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-streamer"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location
///
/// Returns default config if file doesn't exist or can't be parsed.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from `path`
///
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

// ============================================================================
// Effective Settings
// ============================================================================

/// Values given on the command line (or through their env variables).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub cache_file: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub root: PathBuf,
    pub cache_file: PathBuf,
    pub bind: String,
    pub port: u16,
    pub scan_concurrency: usize,
}

impl Settings {
    /// Merge overrides, config file and defaults. Relative paths are
    /// anchored at `cwd`.
    pub fn resolve(config: &Config, overrides: &Overrides, cwd: &Path) -> Self {
        let root = resolve_music_root(
            overrides.root.as_deref().or(config.library.root.as_deref()),
            cwd,
        );
        let cache_file = overrides
            .cache_file
            .as_deref()
            .or(config.library.cache_file.as_deref())
            .map(|p| cwd.join(p))
            .unwrap_or_else(|| cwd.join(DEFAULT_CACHE_FILE));

        Self {
            root,
            cache_file,
            bind: overrides
                .bind
                .clone()
                .unwrap_or_else(|| config.server.bind.clone()),
            port: overrides.port.unwrap_or(config.server.port),
            scan_concurrency: config.library.scan_concurrency.max(1),
        }
    }
}

/// Pick the music root.
///
/// An explicit root wins. Otherwise `../music` is used when it is a
/// directory (the layout of a checkout with the library beside it), and
/// `./music` as the last resort.
pub fn resolve_music_root(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(root) = explicit {
        return cwd.join(root);
    }
    let sibling = cwd.join("..").join("music");
    if sibling.is_dir() {
        return sibling.canonicalize().unwrap_or(sibling);
    }
    cwd.join("music")
}

// ============================================================================
// Tests
// ============================================================================
