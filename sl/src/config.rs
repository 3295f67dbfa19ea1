//! Configuration for simlock

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Unix socket path the coordinator binds and workers connect to
    #[serde(default = "default_socket_path")]
    pub socket: PathBuf,

    /// Coordinator timeouts
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Run parameters for the coordinate and demo commands
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of workers to wait for before stepping
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Number of simulated entities
    #[serde(default = "default_entities")]
    pub entities: usize,

    /// Step size in simulated seconds
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Total simulated duration in seconds
    #[serde(default = "default_duration")]
    pub duration: f64,
}

fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("simlock")
        .join("simlock.sock")
}

fn default_workers() -> usize {
    2
}

fn default_entities() -> usize {
    4
}

fn default_dt() -> f64 {
    60.0
}

fn default_duration() -> f64 {
    6000.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: default_socket_path(),
            coordinator: CoordinatorConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            entities: default_entities(),
            dt: default_dt(),
            duration: default_duration(),
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            let content = std::fs::read_to_string(config_path)
                .wrap_err_with(|| format!("Failed to read config {}", config_path.display()))?;
            let config: Config = serde_yaml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config {}", config_path.display()))?;
            return Ok(config);
        }

        // Try default locations
        let default_paths = [
            Some(PathBuf::from(".simlock.yml")),
            dirs::config_dir().map(|p| p.join("simlock").join("simlock.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
                let config: Config = serde_yaml::from_str(&content)
                    .wrap_err_with(|| format!("Failed to parse config {}", path.display()))?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
