//! CLI configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration. Command-line flags override every value here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Runtime used when `--local` is not given.
    #[serde(default)]
    pub runtime: RuntimeKind,
    /// Image for the implicit clone step.
    #[serde(default = "default_clone_image")]
    pub clone_image: String,
    /// Root directory for run workspaces.
    pub workspace_root: Option<PathBuf>,
    /// Directory where build statuses are persisted.
    pub state_dir: Option<PathBuf>,
    /// Secrets file consulted after environment variables.
    pub secrets_file: Option<PathBuf>,
    /// Base URL of an HTTP secret service.
    pub secrets_url: Option<String>,
    /// Bearer token for the secret service.
    pub secrets_token: Option<String>,
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,
    pub max_parallel: Option<usize>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub output_format: OutputFormat,
}

fn default_clone_image() -> String {
    "alpine/git".to_string()
}

fn default_secret_prefix() -> String {
    "DROVER_SECRET".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeKind::default(),
            clone_image: default_clone_image(),
            workspace_root: None,
            state_dir: None,
            secrets_file: None,
            secrets_url: None,
            secrets_token: None,
            secret_prefix: default_secret_prefix(),
            max_parallel: None,
            timeout_seconds: None,
            output_format: OutputFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    #[default]
    Docker,
    Shell,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl CliConfig {
    /// Load configuration from file.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let dirs = directories::ProjectDirs::from("dev", "drover", "drover")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let number = |value: &str| -> Result<u64, String> {
            value
                .parse()
                .map_err(|_| format!("Invalid number for {}: {}", key, value))
        };

        match key {
            "runtime" => {
                self.runtime = match value {
                    "docker" => RuntimeKind::Docker,
                    "shell" => RuntimeKind::Shell,
                    _ => return Err(format!("Invalid runtime: {}", value)),
                };
            }
            "clone_image" => self.clone_image = value.to_string(),
            "workspace_root" => self.workspace_root = Some(PathBuf::from(value)),
            "state_dir" => self.state_dir = Some(PathBuf::from(value)),
            "secrets_file" => self.secrets_file = Some(PathBuf::from(value)),
            "secrets_url" => self.secrets_url = Some(value.to_string()),
            "secrets_token" => self.secrets_token = Some(value.to_string()),
            "secret_prefix" => self.secret_prefix = value.to_string(),
            "max_parallel" => self.max_parallel = Some(number(value)? as usize),
            "timeout_seconds" => self.timeout_seconds = Some(number(value)?),
            "output_format" => {
                self.output_format = match value {
                    "table" => OutputFormat::Table,
                    "json" => OutputFormat::Json,
                    _ => return Err(format!("Invalid output format: {}", value)),
                };
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }
}
