//! testcoord configuration types and loading

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coordinator::CoordinatorConfig;

/// Main testcoord configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Queue, timeout, and async-action limits
    pub coordinator: CoordinatorConfig,

    /// Names of the instrumented cluster components
    pub cluster: ClusterConfig,

    /// Field masks applied before diffing updates
    pub masks: MaskConfig,

    /// Test plan to run
    #[serde(rename = "test-plan")]
    pub test_plan: Option<PathBuf>,

    /// Unix socket the coordinator listens on
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .testcoord.yml
        let local_config = PathBuf::from(".testcoord.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/testcoord/testcoord.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("testcoord").join("testcoord.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = config_path.cloned().unwrap_or_else(|| PathBuf::from(".testcoord.yml"));
        Self::load_from_file(path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Socket path from config, or the default runtime location
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(crate::ipc::get_socket_path)
    }
}

/// Identities of the instrumented components
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Namespace the scenario runs in
    pub namespace: String,

    /// Host name of the leading API server (alias `leading` in plans)
    #[serde(rename = "leading-api-server")]
    pub leading_api_server: String,

    /// Host name of the following API server (alias `following` in plans)
    #[serde(rename = "following-api-server")]
    pub following_api_server: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            leading_api_server: "kind-control-plane".to_string(),
            following_api_server: "kind-control-plane3".to_string(),
        }
    }
}

impl ClusterConfig {
    /// Resolve `leading`/`following` aliases to host names
    pub fn resolve_api_server<'a>(&'a self, name: &'a str) -> &'a str {
        match name {
            "leading" => &self.leading_api_server,
            "following" => &self.following_api_server,
            other => other,
        }
    }
}

/// Field mask sources, merged per resource type at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Paths masked for every resource type
    #[serde(rename = "common-paths")]
    pub common_paths: Vec<String>,

    /// Leaf keys masked for every resource type
    #[serde(rename = "common-keys")]
    pub common_keys: Vec<String>,

    /// Extra paths per resource type
    #[serde(rename = "resource-paths")]
    pub resource_paths: HashMap<String, Vec<String>>,

    /// Extra keys per resource type
    #[serde(rename = "resource-keys")]
    pub resource_keys: HashMap<String, Vec<String>>,

    /// JSON file of learned masks: resource type -> paths
    #[serde(rename = "learned-mask-file")]
    pub learned_mask_file: Option<PathBuf>,
}
