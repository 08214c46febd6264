//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use nusterm_core::{RequestOptions, SessionConfig};

use crate::cli::SessionArgs;

/// Default scan duration before the picker is shown.
pub const DEFAULT_SCAN_TIMEOUT: u64 = 5;

/// Environment variable naming the device to auto-pick.
pub const DEVICE_ENV: &str = "NUSTERM_DEVICE";

/// Default number of output lines kept by the terminal UI.
pub const DEFAULT_SCROLLBACK: usize = 2000;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Device to auto-pick by name or address substring
    #[serde(default)]
    pub device: Option<String>,

    /// Offer devices that do not advertise NUS
    #[serde(default)]
    pub accept_all_devices: bool,

    /// Scan duration in seconds
    #[serde(default)]
    pub scan_timeout: Option<u64>,

    /// Outbound write chunk size in bytes (unset sends each line in one write)
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Output pane scrollback in lines
    #[serde(default = "default_scrollback")]
    pub scrollback: usize,

    /// Log file used while the terminal UI owns the screen
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_scrollback() -> usize {
    DEFAULT_SCROLLBACK
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            accept_all_devices: false,
            scan_timeout: None,
            chunk_size: None,
            scrollback: DEFAULT_SCROLLBACK,
            log_file: None,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nusterm")
            .join("config.toml")
    }

    /// Default log file for TUI mode
    pub fn default_log_file() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("nusterm")
            .join("nusterm.log")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Log file for TUI mode, falling back to the cache directory.
    pub fn log_file(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(Self::default_log_file)
    }
}

/// Session settings after merging flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub device: Option<String>,
    pub accept_all_devices: bool,
    pub scan_timeout: Duration,
    pub chunk_size: Option<usize>,
}

impl SessionSettings {
    /// Resolve settings: explicit flags, then `NUSTERM_DEVICE`, then config
    pub fn resolve(args: &SessionArgs, config: &Config) -> Self {
        Self::resolve_with(args, std::env::var(DEVICE_ENV).ok(), config)
    }

    pub fn resolve_with(args: &SessionArgs, env_device: Option<String>, config: &Config) -> Self {
        Self {
            device: args
                .device
                .clone()
                .or(env_device.filter(|d| !d.trim().is_empty()))
                .or_else(|| config.device.clone())
                .filter(|d| !d.trim().is_empty()),
            accept_all_devices: args.all_devices || config.accept_all_devices,
            scan_timeout: Duration::from_secs(
                args.scan_timeout
                    .or(config.scan_timeout)
                    .unwrap_or(DEFAULT_SCAN_TIMEOUT),
            ),
            chunk_size: args
                .chunk_size
                .map(usize::from)
                .or(config.chunk_size)
                .filter(|&n| n > 0),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .request(RequestOptions::new().accept_all_devices(self.accept_all_devices))
            .write_chunk_size(self.chunk_size)
    }
}
