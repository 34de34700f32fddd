//! Configuration file resolution and TOML loading
//!
//! Services bootstrap from a single TOML file. Its location is resolved in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`~/.config/envo/<module>.toml` on Linux)
//! 4. None: the service runs on compiled defaults
//!
//! A missing file never prevents startup; a malformed file does.

use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolves the TOML config path for one service module
pub struct ConfigResolver {
    module_name: String,
    env_var_name: String,
}

impl ConfigResolver {
    /// `module_name` is used for the file name, e.g. `envo-ov` → `envo-ov.toml`
    pub fn new(module_name: &str, env_var_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            env_var_name: env_var_name.to_string(),
        }
    }

    /// Resolve the config file path; `None` means "use compiled defaults"
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config directory
        let user_config = self.default_config_path()?;
        if user_config.exists() {
            return Some(user_config);
        }

        None
    }

    /// Platform config location for this module
    pub fn default_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("envo").join(format!("{}.toml", self.module_name)))
    }
}

/// Load a TOML config, falling back to defaults when no file is available
///
/// An explicitly resolved path that does not exist is logged and ignored;
/// parse errors are returned.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using compiled defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
