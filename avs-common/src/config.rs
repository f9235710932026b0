//! TOML configuration file discovery and loading
//!
//! Config file resolution priority:
//! 1. Explicit path (command-line argument or `AVS_CONFIG`)
//! 2. User config: `~/.config/avs/<module>.toml`
//! 3. System config: `/etc/avs/<module>.toml` (Linux only)
//!
//! A missing file is not an error: every section falls back to compiled
//! defaults so the service can start from environment variables alone.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Top-level TOML configuration
///
/// Every field is optional; resolution against environment variables and
/// compiled defaults happens in the service crate.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// External address provider settings
    pub provider: ProviderSection,
    /// Circuit breaker settings
    pub breaker: BreakerSection,
    /// HTTP server settings
    pub server: ServerSection,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// `[provider]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProviderSection {
    /// Provider account identifier
    pub auth_id: Option<String>,
    /// Provider account secret
    pub auth_token: Option<String>,
    /// Provider base URL (overrides the built-in endpoint)
    pub base_url: Option<String>,
    /// Maximum candidates requested per lookup
    pub max_candidates: Option<u32>,
    /// Client-side request throttle
    pub max_requests_per_second: Option<u32>,
}

/// `[breaker]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerSection {
    pub timeout_ms: Option<u64>,
    pub error_threshold_percentage: Option<u8>,
    pub reset_timeout_ms: Option<u64>,
    pub rolling_window_ms: Option<u64>,
    pub rolling_buckets: Option<u32>,
    pub volume_threshold: Option<u32>,
}

/// `[server]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    /// Socket address to bind, e.g. "127.0.0.1:5780"
    pub bind: Option<String>,
    /// Whole-request timeout enforced by the HTTP layer
    pub request_timeout_ms: Option<u64>,
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Locate the config file for a module
///
/// Returns `None` when no candidate exists; an explicit path is returned
/// as-is so that a typo surfaces as a load error instead of silently
/// falling back to defaults.
pub fn resolve_config_path(explicit: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let file_name = format!("{}.toml", module_name);

    if let Some(user_config) = dirs::config_dir().map(|d| d.join("avs").join(&file_name)) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/avs").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load TOML configuration from `path`
///
/// `None` yields defaults. A file that exists but cannot be read or parsed
/// is a configuration error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config file found, using environment variables and compiled defaults");
        return Ok(TomlConfig::default());
    };

    debug!("Reading config file: {}", path.display());

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}
