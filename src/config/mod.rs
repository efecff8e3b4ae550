mod file_config;

pub use file_config::FileConfig;

use crate::center::{BackendMode, CenterSettings};
use crate::notifications::{UserId, DEFAULT_RETENTION_CAP};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TOAST_AUTO_CLOSE_MS: u64 = 2000;
pub const DEFAULT_REMOTE_TIMEOUT_SEC: u64 = 30;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub backend: BackendMode,
    pub remote_url: Option<String>,
    pub remote_timeout_sec: u64,
    pub environment: Option<String>,
    pub user_id: Option<String>,
    pub retention_cap: usize,
    pub toast_auto_close_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            backend: BackendMode::Local,
            remote_url: None,
            remote_timeout_sec: DEFAULT_REMOTE_TIMEOUT_SEC,
            environment: None,
            user_id: None,
            retention_cap: DEFAULT_RETENTION_CAP,
            toast_auto_close_ms: DEFAULT_TOAST_AUTO_CLOSE_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub backend: BackendMode,
    pub remote_url: Option<String>,
    pub remote_timeout_sec: u64,
    pub environment: Option<String>,
    pub user_id: Option<UserId>,
    pub retention_cap: usize,
    pub toast_auto_close_ms: u64,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let backend = match file.backend {
            Some(s) => match parse_backend(&s) {
                Some(backend) => backend,
                None => bail!("Unknown backend {:?}, expected local or remote", s),
            },
            None => cli.backend,
        };

        let remote_url = non_blank(file.remote_url.or_else(|| cli.remote_url.clone()));
        if backend == BackendMode::Remote && remote_url.is_none() {
            bail!("remote_url must be specified when the backend is remote");
        }

        let remote_timeout_sec = file.remote_timeout_sec.unwrap_or(cli.remote_timeout_sec);
        let environment = non_blank(file.environment.or_else(|| cli.environment.clone()));
        let user_id = non_blank(file.user_id.or_else(|| cli.user_id.clone())).map(UserId::new);

        let retention_cap = file.retention_cap.unwrap_or(cli.retention_cap);
        if retention_cap == 0 {
            bail!("retention_cap must be greater than zero");
        }

        let toast_auto_close_ms = file.toast_auto_close_ms.unwrap_or(cli.toast_auto_close_ms);

        Ok(Self {
            db_dir,
            backend,
            remote_url,
            remote_timeout_sec,
            environment,
            user_id,
            retention_cap,
            toast_auto_close_ms,
        })
    }

    pub fn local_db_path(&self) -> PathBuf {
        self.db_dir.join("notifications.db")
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_sec)
    }

    pub fn toast_auto_close(&self) -> Duration {
        Duration::from_millis(self.toast_auto_close_ms)
    }

    pub fn center_settings(&self) -> CenterSettings {
        CenterSettings {
            mode: self.backend,
            environment: self.environment.clone(),
            retention_cap: self.retention_cap,
        }
    }
}

/// Parses a backend name into BackendMode.
/// Uses clap's ValueEnum trait for parsing.
fn parse_backend(s: &str) -> Option<BackendMode> {
    BackendMode::from_str(s, true).ok()
}
