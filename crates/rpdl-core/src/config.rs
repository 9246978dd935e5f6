use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::CurlOptions;

/// User agent sent when neither config nor CLI set one.
pub const DEFAULT_USER_AGENT: &str = concat!("rpdl/", env!("CARGO_PKG_VERSION"));
/// Default size ceiling: 4 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 4 * 1024 * 1024;

/// Worker configuration loaded from `~/.config/rpdl/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpdlConfig {
    /// User agent string for every request.
    pub user_agent: String,
    /// Maximum accepted payload size in bytes.
    pub max_size: u64,
    /// Connect timeout in seconds (None = libcurl default).
    pub connect_timeout_secs: Option<u64>,
    /// Redirect hop limit.
    pub max_redirections: u32,
}

impl Default for RpdlConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_size: DEFAULT_MAX_SIZE,
            connect_timeout_secs: Some(15),
            max_redirections: 10,
        }
    }
}

impl RpdlConfig {
    /// Transport options derived from this config.
    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
            max_redirections: self.max_redirections,
        }
    }
}

/// Location of the config file. Does not create any directory.
pub fn config_path() -> Result<PathBuf> {
    // The prefixed config home is already `$XDG_CONFIG_HOME/rpdl`.
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rpdl")?;
    Ok(xdg_dirs.get_config_home().join("config.toml"))
}

/// Load configuration from disk; a missing file yields the defaults.
pub fn load() -> Result<RpdlConfig> {
    load_from(&config_path()?)
}

/// Load configuration from `path`. Never writes anything.
pub fn load_from(path: &Path) -> Result<RpdlConfig> {
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(RpdlConfig::default());
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: RpdlConfig = toml::from_str(&data)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(cfg)
}
