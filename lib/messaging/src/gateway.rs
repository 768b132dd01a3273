//! Outbound message gateway.
//!
//! [`HttpGateway`] posts prepared payloads to
//! `{base_url}/{api_version}/{phone_number_id}/messages` with the channel's
//! bearer token. Any non-2xx status is a send failure; delivery is
//! best-effort and nothing here retries.

use crate::error::GatewayError;
use crate::payload::OutboundMessage;
use crate::recipient::ChannelCredentials;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Gateway connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    /// Provider API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API version path segment.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v18.0".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from `FLOWLINE__GATEWAY__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FLOWLINE__GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the messages endpoint for a sending number.
    #[must_use]
    pub fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/'),
            phone_number_id
        )
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Message ID assigned by the provider, when it reports one.
    pub provider_message_id: Option<String>,
}

/// Collaborator contract for submitting outbound messages.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Submits a message on the given channel.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if the provider does not accept the message.
    async fn send(
        &self,
        channel: &ChannelCredentials,
        message: &OutboundMessage,
    ) -> Result<SentMessage, GatewayError>;
}

/// Gateway backed by the provider's HTTPS API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Creates a gateway with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[async_trait]
impl MessageGateway for HttpGateway {
    #[instrument(skip(self, channel, message), fields(phone_number_id = %channel.phone_number_id, to = %message.to))]
    async fn send(
        &self,
        channel: &ChannelCredentials,
        message: &OutboundMessage,
    ) -> Result<SentMessage, GatewayError> {
        let url = self.config.messages_url(&channel.phone_number_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&channel.access_token)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, endpoint = %url, "Failed to reach message gateway");
                GatewayError::Transport {
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Message gateway rejected message");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse {
                reason: e.to_string(),
            })?;
        let provider_message_id = provider_message_id(&body);
        debug!(provider_message_id = ?provider_message_id, "Message accepted by gateway");

        Ok(SentMessage {
            provider_message_id,
        })
    }
}

/// Reads `messages[0].id` from a provider response.
#[must_use]
pub fn provider_message_id(body: &JsonValue) -> Option<String> {
    body.get("messages")?
        .get(0)?
        .get("id")?
        .as_str()
        .map(str::to_string)
}
