//! Conversation history recording.

use crate::error::RecorderError;
use async_trait::async_trait;
use flowline_core::ContactId;
use serde::{Deserialize, Serialize};

/// Sender label attached to messages sent by the engine.
pub const AUTOMATION_SENDER: &str = "automation";

/// One outbound message as stored in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRecord {
    pub contact_id: ContactId,
    pub content: String,
    pub message_type: String,
    pub provider_message_id: Option<String>,
    pub sender_label: String,
    pub template_name: Option<String>,
}

impl OutboundRecord {
    /// Creates a record for a message sent by the engine.
    #[must_use]
    pub fn automated(
        contact_id: ContactId,
        content: impl Into<String>,
        message_type: impl Into<String>,
        provider_message_id: Option<String>,
    ) -> Self {
        Self {
            contact_id,
            content: content.into(),
            message_type: message_type.into(),
            provider_message_id,
            sender_label: AUTOMATION_SENDER.to_string(),
            template_name: None,
        }
    }
}

/// Collaborator contract for the conversation history log.
///
/// The engine logs failures from this trait and carries on.
#[async_trait]
pub trait ConversationRecorder: Send + Sync {
    async fn record(&self, record: OutboundRecord) -> Result<(), RecorderError>;
}
