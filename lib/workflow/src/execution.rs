//! Execution record and state machine.
//!
//! An [`Execution`] is one trigger-to-terminal run of a workflow against a
//! single recipient. Status transitions are monotonic apart from the
//! `Paused -> Running` resume edge:
//!
//! ```text
//! Running --suspend--> Paused --resume--> Running
//! Running --complete--> Completed
//! Running --fail--> Failed
//! Paused  --fail--> Failed
//! ```
//!
//! `execution_path` is append-only and records every visited node in order.

use crate::node::NodeId;
use chrono::{DateTime, Utc};
use flowline_core::{ContactId, ExecutionId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Variable holding the trigger payload.
pub const TRIGGER_VAR: &str = "trigger";
/// Variable holding a free-text reply until a condition consumes it.
pub const USER_REPLY_VAR: &str = "userReply";
/// Variable holding the last button/list selection.
pub const LAST_INTERACTION_VAR: &str = "lastInteraction";

/// The state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A button or list option offered to the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferedOption {
    pub id: String,
    pub title: String,
}

/// What a paused execution is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AwaitedInput {
    /// A button tap or list selection among the offered options.
    Interaction { options: Vec<OfferedOption> },
    /// A free-text reply that a condition node will evaluate.
    ConditionReply,
}

/// Records which node is waiting and for what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendMarker {
    pub node_id: NodeId,
    pub awaiting: AwaitedInput,
    pub since: DateTime<Utc>,
}

/// One run of a workflow against one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub contact_id: ContactId,
    /// The node about to be (re)evaluated.
    pub current_node_id: NodeId,
    pub status: ExecutionStatus,
    pub variables: Map<String, JsonValue>,
    pub execution_path: Vec<NodeId>,
    /// Set while `status` is `Paused`.
    pub suspended: Option<SuspendMarker>,
    /// Set while a delay continuation is pending.
    pub wake_at: Option<DateTime<Utc>>,
    /// Why a `Completed` execution stopped before running out of graph.
    pub halt_reason: Option<String>,
    /// Why a `Failed` execution failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Creates a running execution positioned at the trigger node.
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        contact_id: ContactId,
        trigger_node: NodeId,
        trigger_payload: JsonValue,
    ) -> Self {
        let now = Utc::now();
        let mut variables = Map::new();
        variables.insert(TRIGGER_VAR.to_string(), trigger_payload);

        Self {
            id: ExecutionId::new(),
            workflow_id,
            contact_id,
            execution_path: vec![trigger_node.clone()],
            current_node_id: trigger_node,
            status: ExecutionStatus::Running,
            variables,
            suspended: None,
            wake_at: None,
            halt_reason: None,
            error: None,
            created_at: now,
            last_activity: now,
            completed_at: None,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Moves to the next node and appends it to the path.
    pub fn move_to(&mut self, node_id: NodeId) {
        self.execution_path.push(node_id.clone());
        self.current_node_id = node_id;
        self.touch();
    }

    /// Pauses a running execution at its current node.
    ///
    /// Returns false if the execution was not running.
    pub fn suspend(&mut self, awaiting: AwaitedInput) -> bool {
        if self.status != ExecutionStatus::Running {
            return false;
        }
        self.status = ExecutionStatus::Paused;
        self.suspended = Some(SuspendMarker {
            node_id: self.current_node_id.clone(),
            awaiting,
            since: Utc::now(),
        });
        self.touch();
        true
    }

    /// Resumes a paused execution, returning the cleared marker.
    ///
    /// Returns `None` and changes nothing unless the execution is paused.
    pub fn resume(&mut self) -> Option<SuspendMarker> {
        if self.status != ExecutionStatus::Paused {
            return None;
        }
        self.status = ExecutionStatus::Running;
        self.touch();
        self.suspended.take()
    }

    /// Records a pending delay continuation.
    pub fn schedule_wake(&mut self, at: DateTime<Utc>) {
        self.wake_at = Some(at);
        self.touch();
    }

    /// Clears the pending delay continuation.
    pub fn clear_wake(&mut self) -> Option<DateTime<Utc>> {
        let wake_at = self.wake_at.take();
        if wake_at.is_some() {
            self.touch();
        }
        wake_at
    }

    /// Returns true while a delay continuation is pending.
    #[must_use]
    pub fn is_waiting_on_timer(&self) -> bool {
        self.wake_at.is_some()
    }

    /// Marks the execution completed. No-op once terminal.
    pub fn complete(&mut self, halt_reason: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = ExecutionStatus::Completed;
        self.halt_reason = halt_reason;
        self.finish();
        true
    }

    /// Marks the execution failed. No-op once terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.finish();
        true
    }

    fn finish(&mut self) {
        self.suspended = None;
        self.wake_at = None;
        self.touch();
        self.completed_at = Some(self.last_activity);
    }

    /// Sets a variable.
    pub fn set_variable(&mut self, key: impl Into<String>, value: JsonValue) {
        self.variables.insert(key.into(), value);
        self.touch();
    }

    /// Returns the pending free-text reply, if any.
    #[must_use]
    pub fn user_reply(&self) -> Option<&str> {
        self.variables.get(USER_REPLY_VAR).and_then(JsonValue::as_str)
    }

    /// Injects a free-text reply.
    pub fn set_user_reply(&mut self, text: impl Into<String>) {
        self.set_variable(USER_REPLY_VAR, JsonValue::String(text.into()));
    }

    /// Removes and returns the pending reply.
    pub fn take_user_reply(&mut self) -> Option<JsonValue> {
        self.variables.remove(USER_REPLY_VAR)
    }

    /// Returns the text of the trigger payload.
    ///
    /// The payload may be a bare string or an object carrying the text under
    /// `text`, `message` or `body`.
    #[must_use]
    pub fn trigger_text(&self) -> Option<&str> {
        let payload = self.variables.get(TRIGGER_VAR)?;
        if let Some(text) = payload.as_str() {
            return Some(text);
        }
        ["text", "message", "body"]
            .iter()
            .find_map(|key| payload.get(key).and_then(JsonValue::as_str))
    }
}
