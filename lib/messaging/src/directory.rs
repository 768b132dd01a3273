//! Operator directory used by `assign_conversation` actions.

use crate::error::DirectoryError;
use async_trait::async_trait;
use flowline_core::{ContactId, ConversationId, UserId};
use serde::{Deserialize, Serialize};

/// An operator who can own a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    pub user_id: UserId,
    pub display_name: String,
}

/// Collaborator contract for conversation assignment.
#[async_trait]
pub trait AssignmentDirectory: Send + Sync {
    /// Looks up an operator, or `None` if they do not exist.
    async fn find_user(&self, user_id: UserId) -> Result<Option<Assignee>, DirectoryError>;

    /// Assigns the recipient's conversation to an operator.
    ///
    /// Returns the conversation ID, or `None` if the recipient has no
    /// conversation record.
    async fn assign_conversation(
        &self,
        contact_id: ContactId,
        assignee: &Assignee,
    ) -> Result<Option<ConversationId>, DirectoryError>;

    /// Appends a system-authored note to a conversation.
    async fn append_note(
        &self,
        conversation_id: ConversationId,
        note: &str,
    ) -> Result<(), DirectoryError>;
}
