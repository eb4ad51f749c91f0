//! Daemon configuration
//!
//! Loaded from `config.toml`. Every key has a default, so a missing file or
//! a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::settings::SETTINGS_FILE_NAME;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{key} must be in {min}..={max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub coordinator: CoordinatorConfig,
    pub projects: ProjectsConfig,
    pub containers: ContainerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Quiet period before an incomplete batch is built anyway
    pub debounce_ms: u64,
    /// Settings file name at the project root
    pub settings_file: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 20_000,
            settings_file: SETTINGS_FILE_NAME.to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectsConfig {
    /// Directory holding `<projectID>.json` info files
    pub info_dir: PathBuf,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            info_dir: base.join("pfw").join("projects"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub docker_binary: String,
    /// Prepended to the project id to form container and image names
    pub name_prefix: String,
    pub network: String,
    pub build_label: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            name_prefix: "mc-".to_string(),
            network: "microclimate_network".to_string(),
            build_label: "builtBy=microclimate".to_string(),
        }
    }
}

impl ContainerConfig {
    pub fn container_name(&self, project_id: &str) -> String {
        format!("{}{}", self.name_prefix, project_id)
    }
}

const DEBOUNCE_RANGE: (u64, u64) = (10, 600_000);

impl Config {
    /// Load from an explicit path, or the default location if `None`
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match config_file_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config = Self::from_toml(&data).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = DEBOUNCE_RANGE;
        if !(min..=max).contains(&self.coordinator.debounce_ms) {
            return Err(ConfigError::OutOfRange {
                key: "coordinator.debounce_ms",
                value: self.coordinator.debounce_ms,
                min,
                max,
            });
        }
        if self.coordinator.settings_file.is_empty() {
            return Err(ConfigError::Empty("coordinator.settings_file"));
        }
        if self.containers.docker_binary.is_empty() {
            return Err(ConfigError::Empty("containers.docker_binary"));
        }
        Ok(())
    }
}

/// `<config_dir>/pfw/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pfw").join("config.toml"))
}

pub fn example_config() -> &'static str {
    r#"# pfw configuration

[coordinator]
# Quiet period (ms) after the last chunk before a partial batch is built
# Valid range: 10-600000
debounce_ms = 20000
settings_file = ".cw-settings"

[projects]
# Directory of <projectID>.json project info files
info_dir = "/file-watcher/fwdata/projects"

[containers]
docker_binary = "docker"
name_prefix = "mc-"
network = "microclimate_network"
build_label = "builtBy=microclimate"
"#
}
