//! Registry HTTP client used by the CPI

use crate::error::{RegistryError, Result};
use crate::settings::AgentSettings;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const HTTP_API_TIMEOUT: Duration = Duration::from_secs(300);

/// Registry connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub endpoint: String,
    pub user: String,
    pub password: String,
}

/// Settings store keyed by VM id
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Base URL the agent should use to reach this registry
    fn endpoint(&self) -> &str;

    async fn read_settings(&self, instance_id: &str) -> Result<AgentSettings>;

    async fn update_settings(&self, instance_id: &str, settings: &AgentSettings) -> Result<()>;

    async fn delete_settings(&self, instance_id: &str) -> Result<()>;
}

#[derive(Deserialize)]
struct SettingsResponse {
    settings: Option<String>,
}

/// Basic-auth JSON client for the registry REST API
pub struct HttpRegistryClient {
    client: reqwest::Client,
    config: RegistryConfig,
}

impl HttpRegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_API_TIMEOUT)
            .build()
            .map_err(RegistryError::Client)?;

        Ok(Self { client, config })
    }

    fn settings_url(&self, instance_id: &str) -> String {
        format!(
            "{}/instances/{}/settings",
            self.config.endpoint.trim_end_matches('/'),
            instance_id
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        request
            .basic_auth(&self.config.user, Some(&self.config.password))
            .send()
            .await
            .map_err(|source| RegistryError::Transport {
                url: url.to_string(),
                source,
            })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn read_settings(&self, instance_id: &str) -> Result<AgentSettings> {
        let url = self.settings_url(instance_id);
        let response = self.send(self.client.get(&url), &url).await?;

        if response.status() != StatusCode::OK {
            return Err(RegistryError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| RegistryError::Transport {
                url: url.clone(),
                source,
            })?;

        let envelope: SettingsResponse = serde_json::from_str(&body)
            .map_err(|_| RegistryError::InvalidResponse(body.clone()))?;
        let settings = envelope
            .settings
            .ok_or_else(|| RegistryError::InvalidResponse(body.clone()))?;

        Ok(serde_json::from_str(&settings)?)
    }

    async fn update_settings(&self, instance_id: &str, settings: &AgentSettings) -> Result<()> {
        let url = self.settings_url(instance_id);
        let body = serde_json::to_string(settings)?;
        tracing::debug!("PUT {} ({} bytes)", url, body.len());

        let request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let response = self.send(request, &url).await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => Err(RegistryError::Status {
                url,
                status: status.as_u16(),
            }),
        }
    }

    async fn delete_settings(&self, instance_id: &str) -> Result<()> {
        let url = self.settings_url(instance_id);
        let response = self.send(self.client.delete(&url), &url).await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!("Settings for `{}' already gone", instance_id);
                Ok(())
            }
            status => Err(RegistryError::Status {
                url,
                status: status.as_u16(),
            }),
        }
    }
}
