//! Layered engine settings
//!
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. TOML file (`OWNERSHIP_CONFIG`, else `./ownership.toml` when present)
//! 3. environment variables prefixed `OWNERSHIP_` (`OWNERSHIP_DATABASE_URL`, ...)

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use ownership_core::application::worker::constants::{
    DEFAULT_INVITE_EXPIRY_DAYS, DEFAULT_RECOVERY_WINDOW_MS, DEFAULT_RESUME_THRESHOLD_MINUTES,
    DEFAULT_STUCK_THRESHOLD_MINUTES, DEFAULT_TASK_TIME_LIMIT, DEFAULT_WATCHDOG_INTERVAL,
    MEMORY_THROTTLE_THRESHOLD, MILLIS_PER_MINUTE,
};
use ownership_core::application::{TaskRunnerConfig, WatchdogConfig, WorkerConfig};

pub const ENV_PREFIX: &str = "OWNERSHIP";
pub const CONFIG_PATH_ENV: &str = "OWNERSHIP_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "ownership.toml";

const DEFAULT_DATABASE_URL: &str = "sqlite://~/.ownership/ownership.db";
const DEFAULT_STORAGE_ROOT: &str = "~/.ownership/storage";
const SQLITE_SCHEME: &str = "sqlite://";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    #[serde(default)]
    pub log_dir: Option<String>,
    pub log_format: String,
    pub storage_root: String,
    pub resume_threshold_minutes: i64,
    pub stuck_threshold_minutes: i64,
    pub invite_expiry_days: i64,
    pub watchdog_interval_secs: u64,
    pub task_time_limit_secs: u64,
    pub file_move_pause_ms: u64,
    pub auto_accept_invites: bool,
    pub memory_throttle_percent: f32,
    pub recovery_window_minutes: i64,
}

impl Settings {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref())
    }

    /// Load with an explicit config file (required when given)
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                let expanded = shellexpand::tilde(path).into_owned();
                File::new(&expanded, FileFormat::Toml).required(true)
            }
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let settings: Settings = Self::defaults()?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Builder seeded with every default
    pub fn defaults() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("log_format", "pretty")?
            .set_default("storage_root", DEFAULT_STORAGE_ROOT)?
            .set_default("resume_threshold_minutes", DEFAULT_RESUME_THRESHOLD_MINUTES)?
            .set_default("stuck_threshold_minutes", DEFAULT_STUCK_THRESHOLD_MINUTES)?
            .set_default("invite_expiry_days", DEFAULT_INVITE_EXPIRY_DAYS)?
            .set_default(
                "watchdog_interval_secs",
                DEFAULT_WATCHDOG_INTERVAL.as_secs() as i64,
            )?
            .set_default(
                "task_time_limit_secs",
                DEFAULT_TASK_TIME_LIMIT.as_secs() as i64,
            )?
            .set_default("file_move_pause_ms", 0_i64)?
            .set_default("auto_accept_invites", false)?
            .set_default("memory_throttle_percent", MEMORY_THROTTLE_THRESHOLD as f64)?
            .set_default(
                "recovery_window_minutes",
                DEFAULT_RECOVERY_WINDOW_MS / MILLIS_PER_MINUTE,
            )
    }

    pub fn validate(&self) -> Result<()> {
        if self.resume_threshold_minutes <= 0 || self.stuck_threshold_minutes <= 0 {
            bail!("Watchdog thresholds must be positive");
        }
        if self.resume_threshold_minutes >= self.stuck_threshold_minutes {
            bail!(
                "resume_threshold_minutes ({}) must be below stuck_threshold_minutes ({})",
                self.resume_threshold_minutes,
                self.stuck_threshold_minutes
            );
        }
        if self.invite_expiry_days <= 0 {
            bail!("invite_expiry_days must be positive");
        }
        if !(0.0..=100.0).contains(&self.memory_throttle_percent) {
            bail!("memory_throttle_percent must be within 0-100");
        }
        Ok(())
    }

    /// Database URL with `~` expanded in the file path
    pub fn database_url(&self) -> String {
        match self.database_url.strip_prefix(SQLITE_SCHEME) {
            Some(path) => format!("{}{}", SQLITE_SCHEME, shellexpand::tilde(path)),
            None => self.database_url.clone(),
        }
    }

    /// Directory holding the database file (None for in-memory databases)
    pub fn database_dir(&self) -> Option<PathBuf> {
        let url = self.database_url();
        let path = url.strip_prefix(SQLITE_SCHEME)?;
        if path.contains(":memory:") {
            return None;
        }
        let path = path.split('?').next().unwrap_or(path);
        PathBuf::from(path).parent().map(PathBuf::from)
    }

    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage_root).into_owned())
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    pub fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            resume_threshold_minutes: self.resume_threshold_minutes,
            stuck_threshold_minutes: self.stuck_threshold_minutes,
            invite_expiry_days: self.invite_expiry_days,
            interval: Duration::from_secs(self.watchdog_interval_secs),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            task_time_limit: Duration::from_secs(self.task_time_limit_secs),
            memory_throttle_percent: self.memory_throttle_percent,
        }
    }

    pub fn runner_config(&self) -> TaskRunnerConfig {
        TaskRunnerConfig {
            file_move_pause: Duration::from_millis(self.file_move_pause_ms),
        }
    }

    pub fn recovery_window_ms(&self) -> i64 {
        self.recovery_window_minutes * MILLIS_PER_MINUTE
    }
}
