use anyhow::{Context, Result};
use herald_core::DispatchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// File the settings were read from; `None` when running on defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Overrides the service's own server name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: None,
            version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append logs to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "herald=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            filter: default_filter(),
        }
    }
}

impl ServerConfig {
    /// Load the config file if it exists, otherwise use defaults
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .context("Failed to read configuration file")?;
        let mut config: Self =
            toml::from_str(&content).context("Failed to parse configuration file")?;
        config.source = Some(config_path.to_path_buf());
        Ok(config)
    }
}
