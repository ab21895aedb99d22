//! Secret resolver: an ordered chain of providers.

use drover_core::pipeline::EnvValue;
use drover_core::ports::SecretProvider;
use drover_core::secrets::{SecretValue, StepEnvironment};
use drover_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves `from_secret` references.
///
/// Providers are asked in registration order. `SecretNotFound` moves on to
/// the next provider; any other error stops resolution. Nothing is cached.
#[derive(Default, Clone)]
pub struct SecretResolver {
    providers: Vec<Arc<dyn SecretProvider>>,
}

impl SecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret provider behind those already registered.
    pub fn register_provider(&mut self, provider: Arc<dyn SecretProvider>) {
        info!(provider = %provider.name(), "Registering secret provider");
        self.providers.push(provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn SecretProvider>) -> Self {
        self.register_provider(provider);
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Resolve a single secret name.
    pub async fn resolve(&self, name: &str) -> Result<SecretValue> {
        for provider in &self.providers {
            match provider.get(name).await {
                Ok(value) => {
                    debug!(secret = %name, provider = %provider.name(), "Secret resolved");
                    return Ok(value);
                }
                Err(Error::SecretNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::SecretNotFound(name.to_string()))
    }

    /// Put `key` into `env`, resolving it first if it is a secret reference.
    pub async fn apply(
        &self,
        env: &mut StepEnvironment,
        key: impl Into<String>,
        value: &EnvValue,
    ) -> Result<()> {
        match value {
            EnvValue::Secret { from_secret } => {
                let secret = self.resolve(from_secret).await?;
                env.set_secret(key, secret);
            }
            EnvValue::Literal(_) => {
                env.set(key, value.render_literal()?.unwrap_or_default());
            }
        }
        Ok(())
    }
}
