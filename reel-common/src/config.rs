//! Configuration file loading and path resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module owns tiers 3 and 4 for the config file location and the file
//! contents; each binary layers its own CLI/env values on top.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "reel";

/// Contents of a `<binary>.toml` configuration file
///
/// Every field is optional; unset values fall through to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Backend origin, e.g. `http://localhost:8080`
    pub base_url: Option<String>,

    /// Per-endpoint path overrides
    #[serde(default)]
    pub endpoints: EndpointOverrides,

    /// Connect timeout for HTTP requests (milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// How long the push endpoint may take to send response headers (milliseconds)
    pub push_handshake_timeout_ms: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Endpoint path overrides (relative to the base URL)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointOverrides {
    pub timeline: Option<String>,
    pub render_free: Option<String>,
    pub render_pro: Option<String>,
    pub events: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `reel_client=debug`
    pub level: Option<String>,
}

/// Resolve which config file to read
///
/// Returns `None` when no explicit path is given and the platform default
/// file does not exist.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory (only if present)
    default_config_path(file_name).filter(|p| p.exists())
}

/// Platform default location, e.g. `~/.config/reel/reel-client.toml`
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(file_name))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load the resolved config file, or defaults when there is none
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) => load_toml_config(path),
        None => {
            debug!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}
