use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::{expand_path, Paths};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Overrides `~/.wincap/captures`.
    #[serde(default)]
    pub capture_root: Option<String>,
    /// Overrides `<tmp>/wincap`.
    #[serde(default)]
    pub scratch_root: Option<String>,
    /// Payloads strictly larger than this many bytes go to disk instead of inline.
    #[serde(default = "default_inline_threshold_bytes")]
    pub inline_threshold_bytes: usize,
    #[serde(default = "default_true")]
    pub pretty_print: bool,
}

fn default_inline_threshold_bytes() -> usize {
    1024
}

fn default_true() -> bool {
    true
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_root: None,
            scratch_root: None,
            inline_threshold_bytes: default_inline_threshold_bytes(),
            pretty_print: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolConfig {
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Per-subscriber event buffer; events past this are dropped.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// How many times `/json/list` is polled while looking for a page target.
    #[serde(default = "default_discovery_attempts")]
    pub discovery_attempts: u32,
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    1024
}

fn default_discovery_attempts() -> u32 {
    10
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            event_buffer: default_event_buffer(),
            discovery_attempts: default_discovery_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_page_size() -> usize {
    50
}

fn default_max_page_size() -> usize {
    500
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.protocol.command_timeout_secs == 0 {
            return Err(Error::Config("protocol.commandTimeoutSecs must be > 0".into()));
        }
        if self.query.default_page_size == 0 || self.query.max_page_size == 0 {
            return Err(Error::Config("query page sizes must be > 0".into()));
        }
        Ok(())
    }

    pub fn capture_root(&self, paths: &Paths) -> PathBuf {
        match self.capture.capture_root.as_deref() {
            Some(p) if !p.is_empty() => expand_path(p, &paths.base),
            _ => paths.capture_root(),
        }
    }

    pub fn scratch_root(&self, paths: &Paths) -> PathBuf {
        match self.capture.scratch_root.as_deref() {
            Some(p) if !p.is_empty() => expand_path(p, &paths.base),
            _ => paths.scratch_root(),
        }
    }

    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.protocol.command_timeout_secs)
    }
}
