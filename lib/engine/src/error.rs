//! Error types for the engine crate.
//!
//! - `EngineError`: returned to callers of the public entry points
//! - `StepFailure`: a configuration error inside the graph; the execution
//!   becomes `Failed` with the message recorded
//! - `WebhookError`: webhook delivery failures, logged and swallowed

use flowline_core::WorkflowId;
use flowline_workflow::{NodeId, NodeKind};
use std::fmt;

/// Errors surfaced by the engine's entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No workflow with this ID exists.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// The workflow exists but is deactivated.
    WorkflowInactive { workflow_id: WorkflowId },
    /// The workflow graph has no trigger node.
    NoTriggerNode { workflow_id: WorkflowId },
    /// The definition store could not be read; the store error is the cause.
    StoreUnavailable { workflow_id: WorkflowId },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::WorkflowInactive { workflow_id } => {
                write!(f, "workflow is inactive: {workflow_id}")
            }
            Self::NoTriggerNode { workflow_id } => {
                write!(f, "workflow has no trigger node: {workflow_id}")
            }
            Self::StoreUnavailable { workflow_id } => {
                write!(f, "cannot load workflow {workflow_id}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// A node that cannot be evaluated as authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    /// The node's config did not decode for its kind.
    MalformedNode {
        node_id: NodeId,
        kind: NodeKind,
        reason: String,
    },
    /// The action config decoded but cannot be sent.
    InvalidAction { node_id: NodeId, reason: String },
    /// The traversal bound was hit, most likely a cycle.
    MaxHopsExceeded { max_hops: usize },
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedNode {
                node_id,
                kind,
                reason,
            } => write!(f, "malformed {kind} node '{node_id}': {reason}"),
            Self::InvalidAction { node_id, reason } => {
                write!(f, "invalid action on node '{node_id}': {reason}")
            }
            Self::MaxHopsExceeded { max_hops } => {
                write!(f, "max hops exceeded ({max_hops})")
            }
        }
    }
}

impl std::error::Error for StepFailure {}

/// Errors from webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// The HTTP client could not be built.
    Client { reason: String },
    /// The request never got a response.
    Transport { url: String, reason: String },
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { reason } => write!(f, "webhook client unavailable: {reason}"),
            Self::Transport { url, reason } => {
                write!(f, "webhook request to '{url}' failed: {reason}")
            }
        }
    }
}

impl std::error::Error for WebhookError {}
