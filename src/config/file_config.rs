use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Storage
    pub db_dir: Option<String>,
    pub retention_cap: Option<usize>,

    // Backend selection
    pub backend: Option<String>,
    pub remote_url: Option<String>,
    pub remote_timeout_sec: Option<u64>,
    pub environment: Option<String>,
    pub user_id: Option<String>,

    // Alerts
    pub toast_auto_close_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
