//! Node handlers.
//!
//! Each node kind is evaluated into a [`StepOutcome`]. Handlers never touch
//! the execution status themselves; the driver applies the outcome.
//!
//! Failure classes:
//! - graph-shape anomalies (no outgoing edge, malformed condition) end the
//!   execution as `Terminate`
//! - external dependency failures are logged and end it as `Terminate` with
//!   a halt reason
//! - configuration errors are returned as [`StepFailure`] and fail it

use crate::engine::WorkflowEngine;
use crate::error::StepFailure;
use crate::webhook::{WebhookPayload, WebhookRequest};
use chrono::Utc;
use flowline_messaging::{DirectoryError, OutboundRecord, PreparedMessage};
use flowline_workflow::node::AssignConversationConfig;
use flowline_workflow::{
    ActionConfig, AwaitedInput, ConditionConfig, Edge, Execution, Node, NodeConfig, NodeId,
    NodeKind, WebhookConfig, Workflow, WorkflowGraph,
};
use std::time::Duration;
use tracing::{debug, warn};

/// What happens after a node has been evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Continue with this node.
    NextNode(NodeId),
    /// Pause until the awaited input arrives.
    Suspend(AwaitedInput),
    /// Continue past the current node after this wait.
    Wait(Duration),
    /// Stop; the execution is completed.
    Terminate { halt_reason: Option<String> },
}

impl StepOutcome {
    fn halt(reason: impl Into<String>) -> Self {
        Self::Terminate {
            halt_reason: Some(reason.into()),
        }
    }
}

/// Follows the first outgoing edge, or terminates if there is none.
pub(crate) fn next_or_terminate(graph: &WorkflowGraph, node_id: &NodeId) -> StepOutcome {
    match graph.first_outgoing(node_id) {
        Some(edge) => StepOutcome::NextNode(edge.target.clone()),
        None => StepOutcome::Terminate { halt_reason: None },
    }
}

/// Evaluates a condition node against the pending reply or the trigger text.
///
/// The reply is consumed by the evaluation.
pub(crate) fn evaluate_condition(
    graph: &WorkflowGraph,
    node_id: &NodeId,
    config: &ConditionConfig,
    execution: &mut Execution,
) -> StepOutcome {
    if config.wait_for_reply && execution.user_reply().is_none() {
        return StepOutcome::Suspend(AwaitedInput::ConditionReply);
    }

    let haystack = execution
        .user_reply()
        .or_else(|| execution.trigger_text())
        .unwrap_or_default()
        .to_lowercase();
    let needle = config.value.to_lowercase();
    let result = config.operator.evaluate(&haystack, &needle);
    execution.take_user_reply();

    debug!(
        node_id = %node_id,
        operator = config.operator.as_str(),
        result,
        "Condition evaluated"
    );

    match select_condition_branch(&graph.outgoing(node_id), result) {
        Some(edge) => StepOutcome::NextNode(edge.target.clone()),
        None => StepOutcome::Terminate { halt_reason: None },
    }
}

/// Picks the branch for a condition result.
///
/// A lone edge is always taken. Otherwise the edge whose handle (or label)
/// names the result wins, and a true result falls back to the first edge.
pub(crate) fn select_condition_branch<'g>(outgoing: &[&'g Edge], result: bool) -> Option<&'g Edge> {
    if let [only] = outgoing {
        return Some(*only);
    }

    let branch = if result { "yes" } else { "no" };
    outgoing
        .iter()
        .find(|edge| edge.has_handle(branch))
        .or_else(|| outgoing.iter().find(|edge| edge.has_label(branch)))
        .copied()
        .or_else(|| if result { outgoing.first().copied() } else { None })
}

impl WorkflowEngine {
    /// Evaluates one node.
    pub(crate) async fn step(
        &self,
        workflow: &Workflow,
        node: &Node,
        execution: &mut Execution,
    ) -> Result<StepOutcome, StepFailure> {
        let graph = &workflow.graph;
        match &node.config {
            NodeConfig::Trigger(_) => Ok(next_or_terminate(graph, &node.id)),
            NodeConfig::Action(action) => self.run_action(graph, node, action, execution).await,
            NodeConfig::Condition(config) => {
                Ok(evaluate_condition(graph, &node.id, config, execution))
            }
            NodeConfig::Delay(config) => Ok(StepOutcome::Wait(
                config.wait().unwrap_or_else(|| self.inner.config.default_delay()),
            )),
            NodeConfig::Webhook(config) => {
                self.call_webhook(node, config, execution).await;
                Ok(next_or_terminate(graph, &node.id))
            }
            NodeConfig::Malformed {
                kind: NodeKind::Condition,
                reason,
                ..
            } => {
                warn!(node_id = %node.id, reason = %reason, "Malformed condition config");
                Ok(StepOutcome::halt(format!("malformed condition config: {reason}")))
            }
            NodeConfig::Malformed { kind, reason, .. } => Err(StepFailure::MalformedNode {
                node_id: node.id.clone(),
                kind: *kind,
                reason: reason.clone(),
            }),
        }
    }

    async fn run_action(
        &self,
        graph: &WorkflowGraph,
        node: &Node,
        action: &ActionConfig,
        execution: &mut Execution,
    ) -> Result<StepOutcome, StepFailure> {
        if let ActionConfig::AssignConversation(config) = action {
            return Ok(self.assign_conversation(graph, node, config, execution).await);
        }

        let collaborators = &self.inner.collaborators;
        let recipient = match collaborators.resolver.resolve(execution.contact_id).await {
            Ok(recipient) => recipient,
            Err(e) => {
                warn!(
                    node_id = %node.id,
                    contact_id = %execution.contact_id,
                    error = %e,
                    "Cannot resolve recipient"
                );
                return Ok(StepOutcome::halt(e.to_string()));
            }
        };

        let prepared =
            PreparedMessage::for_action(&node.id, recipient.normalized_address(), action).map_err(
                |e| StepFailure::InvalidAction {
                    node_id: node.id.clone(),
                    reason: e.to_string(),
                },
            )?;
        let PreparedMessage {
            message,
            message_type,
            content,
            options,
        } = prepared;

        let sent = match collaborators
            .gateway
            .send(&recipient.channel, &message)
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                warn!(
                    node_id = %node.id,
                    contact_id = %execution.contact_id,
                    action_type = action.action_type(),
                    error = %e,
                    "Message send failed"
                );
                return Ok(StepOutcome::halt(e.to_string()));
            }
        };

        let record = OutboundRecord::automated(
            execution.contact_id,
            content,
            message_type,
            sent.provider_message_id,
        );
        if let Err(e) = collaborators.recorder.record(record).await {
            warn!(node_id = %node.id, error = %e, "Failed to record outbound message");
        }

        if action.awaits_interaction() {
            Ok(StepOutcome::Suspend(AwaitedInput::Interaction { options }))
        } else {
            Ok(next_or_terminate(graph, &node.id))
        }
    }

    async fn assign_conversation(
        &self,
        graph: &WorkflowGraph,
        node: &Node,
        config: &AssignConversationConfig,
        execution: &Execution,
    ) -> StepOutcome {
        let directory = &self.inner.collaborators.directory;

        let assignee = match directory.find_user(config.user_id).await {
            Ok(Some(assignee)) => assignee,
            Ok(None) => {
                let e = DirectoryError::UserNotFound {
                    user_id: config.user_id,
                };
                warn!(node_id = %node.id, error = %e, "Cannot assign conversation");
                return StepOutcome::halt(e.to_string());
            }
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Cannot assign conversation");
                return StepOutcome::halt(e.to_string());
            }
        };

        let conversation_id = match directory
            .assign_conversation(execution.contact_id, &assignee)
            .await
        {
            Ok(Some(conversation_id)) => conversation_id,
            Ok(None) => {
                let e = DirectoryError::ConversationNotFound {
                    contact_id: execution.contact_id,
                };
                warn!(node_id = %node.id, error = %e, "Cannot assign conversation");
                return StepOutcome::halt(e.to_string());
            }
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Cannot assign conversation");
                return StepOutcome::halt(e.to_string());
            }
        };

        let note = config.note.clone().unwrap_or_else(|| {
            format!(
                "Conversation assigned to {} by automation",
                assignee.display_name
            )
        });
        if let Err(e) = directory.append_note(conversation_id, &note).await {
            warn!(node_id = %node.id, conversation_id = %conversation_id, error = %e, "Failed to append assignment note");
        }

        debug!(node_id = %node.id, conversation_id = %conversation_id, assignee = %assignee.user_id, "Conversation assigned");
        next_or_terminate(graph, &node.id)
    }

    /// Fires the webhook. Every outcome is logged and otherwise ignored.
    async fn call_webhook(&self, node: &Node, config: &WebhookConfig, execution: &Execution) {
        let request = WebhookRequest {
            url: config.url.clone(),
            method: config.method,
            headers: config.headers.clone(),
            payload: WebhookPayload {
                workflow_id: execution.workflow_id,
                recipient_id: execution.contact_id,
                variables: execution.variables.clone(),
                timestamp: Utc::now(),
            },
        };

        match self.inner.collaborators.webhooks.deliver(&request).await {
            Ok(status) if (200..300).contains(&status) => {
                debug!(node_id = %node.id, url = %config.url, status, "Webhook delivered");
            }
            Ok(status) => {
                warn!(node_id = %node.id, url = %config.url, status, "Webhook returned non-success status");
            }
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Webhook delivery failed");
            }
        }
    }
}
