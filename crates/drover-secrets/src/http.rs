//! HTTP vault provider.
//!
//! Talks to a secret service exposing `GET {base}/v1/secrets/{name}` which
//! answers `{"value": "...", "version": "..."}`.

use async_trait::async_trait;
use drover_core::ports::SecretProvider;
use drover_core::secrets::SecretValue;
use drover_core::{Error, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct HttpProviderConfig {
    /// Base URL of the secret service.
    pub address: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    value: String,
    #[serde(default)]
    version: Option<String>,
}

pub struct HttpProvider {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let mut base = Url::parse(&config.address)
            .map_err(|e| Error::Config(format!("invalid secret service address: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            token: config.token,
        })
    }

    fn secret_url(&self, name: &str) -> Result<Url> {
        let mut url = self
            .base
            .join("v1/secrets/")
            .map_err(|e| Error::Internal(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| Error::Internal("secret service address cannot be a base".to_string()))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }
}

#[async_trait]
impl SecretProvider for HttpProvider {
    async fn get(&self, name: &str) -> Result<SecretValue> {
        let access = |message: String| Error::SecretAccess {
            name: name.to_string(),
            message,
        };

        let url = self.secret_url(name)?;
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(secret = %name, error = %e, "Secret service unreachable");
            access(e.to_string())
        })?;

        match response.status() {
            StatusCode::OK => {
                let body: SecretResponse = response
                    .json()
                    .await
                    .map_err(|e| access(format!("invalid response body: {}", e)))?;
                debug!(secret = %name, "Secret fetched from secret service");
                let value = SecretValue::new(body.value);
                Ok(match body.version {
                    Some(version) => value.with_version(version),
                    None => value,
                })
            }
            StatusCode::NOT_FOUND => Err(Error::SecretNotFound(name.to_string())),
            status => Err(access(format!("secret service returned {}", status))),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
