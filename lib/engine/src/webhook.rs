//! Webhook delivery for webhook nodes.
//!
//! Delivery is fire-and-forget: the engine logs the outcome and moves on
//! whatever the endpoint answers.

use crate::config::EngineConfig;
use crate::error::WebhookError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowline_core::{ContactId, WorkflowId};
use flowline_workflow::node::WebhookMethod;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::time::Duration;

/// Body posted to webhook endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub workflow_id: WorkflowId,
    pub recipient_id: ContactId,
    pub variables: Map<String, JsonValue>,
    pub timestamp: DateTime<Utc>,
}

/// A fully resolved webhook call.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    pub url: String,
    pub method: WebhookMethod,
    pub headers: BTreeMap<String, String>,
    pub payload: WebhookPayload,
}

/// Collaborator contract for issuing webhook requests.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// Issues the request and returns the HTTP status code.
    async fn deliver(&self, request: &WebhookRequest) -> Result<u16, WebhookError>;
}

/// Webhook sender backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    /// Creates a sender whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Client`] if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Client {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Creates a sender using the configured webhook timeout.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Client`] if the client cannot be built.
    pub fn from_config(config: &EngineConfig) -> Result<Self, WebhookError> {
        Self::new(config.webhook_timeout())
    }
}

fn reqwest_method(method: WebhookMethod) -> reqwest::Method {
    match method {
        WebhookMethod::Get => reqwest::Method::GET,
        WebhookMethod::Post => reqwest::Method::POST,
        WebhookMethod::Put => reqwest::Method::PUT,
        WebhookMethod::Patch => reqwest::Method::PATCH,
        WebhookMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn deliver(&self, request: &WebhookRequest) -> Result<u16, WebhookError> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if request.method != WebhookMethod::Get {
            builder = builder.json(&request.payload);
        }

        let response = builder.send().await.map_err(|e| WebhookError::Transport {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        Ok(response.status().as_u16())
    }
}
