//! Environment and file backed secret providers.

use async_trait::async_trait;
use drover_core::ports::SecretProvider;
use drover_core::secrets::SecretValue;
use drover_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Environment variable secret provider.
pub struct EnvProvider {
    prefix: Option<String>,
}

impl EnvProvider {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    fn resolve_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{}_{}", p, name),
            None => name.to_string(),
        }
    }
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl SecretProvider for EnvProvider {
    async fn get(&self, name: &str) -> Result<SecretValue> {
        let env_name = self.resolve_name(name);
        std::env::var(&env_name)
            .map(SecretValue::new)
            .map_err(|_| Error::SecretNotFound(name.to_string()))
    }

    fn name(&self) -> &str {
        "env"
    }
}

/// File-based secret provider: a flat JSON or YAML map of name to value.
pub struct FileProvider {
    secrets: HashMap<String, String>,
}

impl FileProvider {
    pub fn from_map(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    /// Load secrets from `path`. Files ending in `.json` are parsed as JSON,
    /// everything else as YAML.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("failed to read secrets file {}: {}", path.display(), e))
        })?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let secrets: HashMap<String, String> = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse secrets file {}: {}", path.display(), e))
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse secrets file {}: {}", path.display(), e))
            })?
        };

        debug!(path = %path.display(), count = secrets.len(), "Loaded secrets file");
        Ok(Self { secrets })
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[async_trait]
impl SecretProvider for FileProvider {
    async fn get(&self, name: &str) -> Result<SecretValue> {
        self.secrets
            .get(name)
            .map(|value| SecretValue::new(value.clone()))
            .ok_or_else(|| Error::SecretNotFound(name.to_string()))
    }

    fn name(&self) -> &str {
        "file"
    }
}
