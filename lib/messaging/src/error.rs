//! Error types for the messaging crate.
//!
//! One enum per collaborator so the engine can classify failures:
//! - `ResolveError`: recipient or channel lookup failed
//! - `PayloadError`: the authored action cannot be turned into a payload
//! - `GatewayError`: the provider did not accept the message
//! - `RecorderError`: the audit log write failed
//! - `DirectoryError`: operator or conversation lookup failed

use flowline_core::{ContactId, UserId};
use std::fmt;

/// Errors from recipient and channel resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No contact with this ID exists.
    ContactNotFound { contact_id: ContactId },
    /// The contact exists but has no usable messaging channel.
    ChannelNotConfigured { contact_id: ContactId },
    /// The directory could not be reached.
    Unavailable { reason: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContactNotFound { contact_id } => {
                write!(f, "contact not found: {contact_id}")
            }
            Self::ChannelNotConfigured { contact_id } => {
                write!(f, "no messaging channel configured for {contact_id}")
            }
            Self::Unavailable { reason } => {
                write!(f, "recipient directory unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Errors from building a provider payload out of an action config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// A required field is empty.
    MissingField { field: &'static str },
    /// An interactive message has nothing to choose from.
    NoOptions { action_type: &'static str },
    /// The action does not send a message.
    NotAMessage { action_type: &'static str },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::NoOptions { action_type } => {
                write!(f, "'{action_type}' message has no options")
            }
            Self::NotAMessage { action_type } => {
                write!(f, "'{action_type}' does not send a message")
            }
        }
    }
}

impl std::error::Error for PayloadError {}

/// Errors from the outbound message gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The provider answered with a non-2xx status.
    Rejected { status: u16, body: String },
    /// The request never got a response.
    Transport { reason: String },
    /// The provider answered 2xx with a body we could not read.
    InvalidResponse { reason: String },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, body } => {
                write!(f, "gateway rejected message with HTTP {status}: {body}")
            }
            Self::Transport { reason } => write!(f, "gateway request failed: {reason}"),
            Self::InvalidResponse { reason } => {
                write!(f, "invalid gateway response: {reason}")
            }
        }
    }
}

impl std::error::Error for GatewayError {}

/// Errors from the conversation recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    /// The history store could not be written.
    Unavailable { reason: String },
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "conversation recorder unavailable: {reason}"),
        }
    }
}

impl std::error::Error for RecorderError {}

/// Errors from the assignment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The assignee does not exist.
    UserNotFound { user_id: UserId },
    /// The recipient has no conversation record to assign.
    ConversationNotFound { contact_id: ContactId },
    /// The directory could not be reached.
    Unavailable { reason: String },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserNotFound { user_id } => write!(f, "user not found: {user_id}"),
            Self::ConversationNotFound { contact_id } => {
                write!(f, "no conversation found for {contact_id}")
            }
            Self::Unavailable { reason } => write!(f, "assignment directory unavailable: {reason}"),
        }
    }
}

impl std::error::Error for DirectoryError {}
