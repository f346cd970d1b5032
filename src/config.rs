//! Configuration management
//!
//! Loads service configuration from a TOML file, then applies environment
//! overrides. Every section is optional.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Number of runtime worker threads (0 = auto)
    #[serde(default)]
    pub workers: usize,
    /// Time allowed for the final flush on shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    /// Get effective worker count (auto-detect if 0)
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            workers: 0,
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// Backup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Directory holding the backup file
    #[serde(default = "default_backup_path")]
    pub path: PathBuf,
    /// Backup file name inside `path`
    #[serde(default = "default_backup_file")]
    pub file_name: String,
    /// Flush cadence in seconds (0 = flush on every change)
    #[serde(default = "default_backup_interval")]
    pub interval_secs: u64,
    /// Replay the backup file at startup
    #[serde(default = "default_true")]
    pub restore: bool,
}

impl BackupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Full path of the backup file
    pub fn file_path(&self) -> PathBuf {
        self.path.join(&self.file_name)
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            path: default_backup_path(),
            file_name: default_backup_file(),
            interval_secs: default_backup_interval(),
            restore: true,
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics endpoint
    #[serde(default)]
    pub enabled: bool,
    /// Metrics server bind address
    #[serde(default = "default_metrics_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_metrics_addr(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_bind_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 8080)) }
fn default_shutdown_grace() -> u64 { 10 }
fn default_backup_path() -> PathBuf { PathBuf::from("/tmp") }
fn default_backup_file() -> String { "metrics-db.json".to_string() }
fn default_backup_interval() -> u64 { 300 }
fn default_true() -> bool { true }
fn default_metrics_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 9090)) }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Config {
    /// Load configuration from a TOML file and the process environment
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config = Self::from_toml(&contents)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus the process environment, for running without a file
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).with_context(|| "Failed to parse config file")
    }

    /// Apply `ADDRESS`, `STORE_INTERVAL`, `FILE_STORAGE_PATH` and `RESTORE`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("ADDRESS") {
            self.server.bind_addr = addr
                .parse()
                .with_context(|| format!("Invalid ADDRESS: {addr:?}"))?;
        }
        if let Some(interval) = lookup("STORE_INTERVAL") {
            self.backup.interval_secs = interval
                .parse()
                .with_context(|| format!("Invalid STORE_INTERVAL: {interval:?}"))?;
        }
        if let Some(file) = lookup("FILE_STORAGE_PATH") {
            let file = PathBuf::from(file);
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Invalid FILE_STORAGE_PATH: {:?}", file))?;
            self.backup.file_name = name.to_string();
            self.backup.path = match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
        }
        if let Some(restore) = lookup("RESTORE") {
            self.backup.restore = restore
                .parse()
                .with_context(|| format!("Invalid RESTORE: {restore:?}"))?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.backup.file_name.is_empty() {
            anyhow::bail!("backup.file_name must not be empty");
        }
        if self.server.shutdown_grace_secs == 0 {
            anyhow::bail!("shutdown_grace_secs must be > 0");
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            anyhow::bail!("logging.format must be \"json\" or \"pretty\"");
        }
        Ok(())
    }
}
