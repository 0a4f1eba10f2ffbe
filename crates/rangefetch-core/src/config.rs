use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::coordinator::DownloadSettings;
use crate::fetcher::CurlOptions;

/// Global configuration loaded once from `~/.config/rangefetch/config.toml`.
///
/// Keys are snake_case; the camelCase names (`maxThreads`, `speedLimit`,
/// `speedLimits`) are accepted as aliases. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Number of ranges (and fetch units) per download.
    #[serde(alias = "maxThreads")]
    pub max_threads: usize,
    /// Global speed limit per download in bytes per second (0 = unlimited).
    #[serde(alias = "speedLimit")]
    pub speed_limit: u64,
    /// Per-thread overrides in bytes per second, indexed by thread number.
    /// TOML has no null: a negative entry means "no override", 0 means unlimited.
    #[serde(alias = "speedLimits")]
    pub speed_limits: Vec<i64>,
    /// Address the WebSocket listener binds to.
    pub listen_addr: String,
    /// JSON file mapping keywords to URL lists. None = next to config.toml.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords_path: Option<PathBuf>,
    /// Connect timeout for HEAD probes and range GETs.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for the HEAD probe.
    pub probe_timeout_secs: u64,
    /// A unit fails when its stream stays below `low_speed_limit` bytes/s
    /// for `low_speed_time_secs`.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    /// Capacity of the bounded unit -> coordinator event channel.
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_threads: 1,
            speed_limit: 0,
            speed_limits: Vec::new(),
            listen_addr: "127.0.0.1:8080".to_string(),
            keywords_path: None,
            connect_timeout_secs: 15,
            probe_timeout_secs: 30,
            low_speed_limit: 1,
            low_speed_time_secs: 60,
            event_buffer: 64,
        }
    }
}

impl ServerConfig {
    /// Per-thread overrides with negative entries mapped to `None`.
    pub fn speed_overrides(&self) -> Vec<Option<u64>> {
        self.speed_limits
            .iter()
            .map(|&v| u64::try_from(v).ok())
            .collect()
    }

    /// Settings every download started under this config uses.
    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            thread_count: self.max_threads.max(1),
            speed_limit: self.speed_limit,
            speed_overrides: self.speed_overrides(),
            event_buffer: self.event_buffer.max(1),
            curl: self.curl_options(),
        }
    }

    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
        }
    }
}

/// Why a config file could not be used. Never fatal: the caller logs it and
/// falls back to [`ServerConfig::default`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub fn config_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rangefetch")?;
    Ok(xdg_dirs.get_config_home())
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rangefetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default location of the keyword table.
pub fn default_keywords_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("urls_by_keywords.json"))
}

/// Parse the config file at `path`.
pub fn load_from_path(path: &Path) -> Result<ServerConfig, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from `explicit` or the XDG default path.
///
/// When the default file does not exist yet, a default one is written so
/// operators have something to edit. Any failure is logged and defaults are
/// returned.
pub fn load_or_default(explicit: Option<&Path>) -> ServerConfig {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("no config location, using defaults: {:#}", e);
                return ServerConfig::default();
            }
        },
    };

    if explicit.is_none() && !path.exists() {
        let default_cfg = ServerConfig::default();
        if let Err(e) = write_default(&path, &default_cfg) {
            tracing::warn!(path = %path.display(), "could not write default config: {:#}", e);
        } else {
            tracing::info!("created default config at {}", path.display());
        }
        return default_cfg;
    }

    match load_from_path(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("config load failed, using defaults: {}", e);
            ServerConfig::default()
        }
    }
}

fn write_default(path: &Path, cfg: &ServerConfig) -> Result<()> {
    let toml = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml)?;
    Ok(())
}
