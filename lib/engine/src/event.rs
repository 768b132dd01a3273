//! Inbound events that resume suspended executions.

use chrono::{DateTime, Utc};
use flowline_core::ExecutionId;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

/// What the recipient did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundEventKind {
    ButtonClick,
    ListSelection,
    TextResponse,
}

impl InboundEventKind {
    /// Returns true for button taps and list selections.
    #[must_use]
    pub fn is_selection(self) -> bool {
        matches!(self, Self::ButtonClick | Self::ListSelection)
    }
}

/// An external reply from a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub kind: InboundEventKind,
    #[serde(default)]
    pub option_id: Option<String>,
    #[serde(default)]
    pub option_title: Option<String>,
    #[serde(default)]
    pub text_content: Option<String>,
    /// Provider ID of the message the recipient replied to.
    #[serde(default)]
    pub referenced_message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    /// A button tap.
    #[must_use]
    pub fn button_click(option_id: impl Into<String>, option_title: impl Into<String>) -> Self {
        Self::selection(InboundEventKind::ButtonClick, option_id, option_title)
    }

    /// A list row selection.
    #[must_use]
    pub fn list_selection(option_id: impl Into<String>, option_title: impl Into<String>) -> Self {
        Self::selection(InboundEventKind::ListSelection, option_id, option_title)
    }

    fn selection(
        kind: InboundEventKind,
        option_id: impl Into<String>,
        option_title: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            option_id: Some(option_id.into()),
            option_title: Some(option_title.into()),
            text_content: None,
            referenced_message_id: None,
            timestamp: Utc::now(),
        }
    }

    /// A free-text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: InboundEventKind::TextResponse,
            option_id: None,
            option_title: None,
            text_content: Some(text.into()),
            referenced_message_id: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.referenced_message_id = Some(message_id.into());
        self
    }

    /// Returns the text this event contributes as a reply.
    ///
    /// Selections answer with their title, falling back to the option ID.
    #[must_use]
    pub fn reply_text(&self) -> String {
        let text = if self.kind.is_selection() {
            self.option_title.as_ref().or(self.option_id.as_ref())
        } else {
            self.text_content.as_ref()
        };
        text.cloned().unwrap_or_default()
    }

    /// Returns the value stored as `lastInteraction`.
    #[must_use]
    pub fn interaction_record(&self) -> JsonValue {
        json!({
            "kind": self.kind,
            "optionId": self.option_id,
            "optionTitle": self.option_title,
            "referencedMessageId": self.referenced_message_id,
            "timestamp": self.timestamp,
        })
    }
}

/// Result of a `continue_workflow` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The event was applied and the execution advanced.
    Resumed { execution_id: ExecutionId },
    /// A matching execution exists but the event does not fit what it awaits.
    Ignored { execution_id: ExecutionId },
    /// No paused or resumable execution matched.
    NotFound,
}
