//! Configuration system for the Taskdeck client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskdeck/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use taskdeck_proto::query::Pagination;

use crate::app::Command;
use crate::session::DEFAULT_REFRESH_INTERVAL;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageFileConfig,
    session: SessionFileConfig,
    view: ViewFileConfig,
    notifications: NotificationsFileConfig,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    dir: Option<PathBuf>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    refresh_interval_secs: Option<u64>,
}

/// `[view]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ViewFileConfig {
    page_size: Option<u32>,
    upcoming_limit: Option<usize>,
    recently_completed_limit: Option<usize>,
}

/// `[notifications]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NotificationsFileConfig {
    buffer: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Task store configuration (used by `TaskStore`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Records per list request while hydrating.
    pub page_size: u32,
    /// Rows in the dashboard's upcoming list.
    pub upcoming_limit: usize,
    /// Rows in the dashboard's recently completed list.
    pub recently_completed_limit: usize,
    /// Capacity of the notification channel.
    pub notification_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: Pagination::DEFAULT_TAKE,
            upcoming_limit: 5,
            recently_completed_limit: 3,
            notification_buffer: 64,
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding the task cache and tokens.
    pub storage_dir: PathBuf,
    /// Period of the background token renewal.
    pub token_refresh_interval: Duration,
    /// Task store settings.
    pub store: StoreConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            token_refresh_interval: DEFAULT_REFRESH_INTERVAL,
            store: StoreConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/taskdeck/config.toml`) is
    /// tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            storage_dir: cli
                .storage_dir
                .clone()
                .or_else(|| file.storage.dir.clone())
                .unwrap_or(defaults.storage_dir),
            token_refresh_interval: file
                .session
                .refresh_interval_secs
                .map_or(defaults.token_refresh_interval, Duration::from_secs),
            store: StoreConfig {
                page_size: cli
                    .page_size
                    .or(file.view.page_size)
                    .unwrap_or(defaults.store.page_size),
                upcoming_limit: file
                    .view
                    .upcoming_limit
                    .unwrap_or(defaults.store.upcoming_limit),
                recently_completed_limit: file
                    .view
                    .recently_completed_limit
                    .unwrap_or(defaults.store.recently_completed_limit),
                notification_buffer: file
                    .notifications
                    .buffer
                    .unwrap_or(defaults.store.notification_buffer),
            },
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Offline-tolerant personal task tracker")]
pub struct CliArgs {
    /// Path to config file (default: `~/.config/taskdeck/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the task cache and credentials.
    #[arg(long, env = "TASKDECK_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Records per list request.
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKDECK_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskdeck.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do (default: `list`).
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("taskdeck")
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist. Otherwise the default
/// path is tried and a missing file is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskdeck").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
