//! Resume matching.
//!
//! Two questions are answered here, both without side effects on anything
//! but the execution being resumed:
//!
//! 1. Which of a recipient's executions should receive an inbound event
//!    ([`candidates`]).
//! 2. How the event is applied to the chosen execution ([`apply`]).

use crate::config::{EngineConfig, ResumePolicy};
use crate::event::InboundEvent;
use crate::registry::ExecutionSummary;
use chrono::{DateTime, Utc};
use flowline_core::{ExecutionId, WorkflowId};
use flowline_workflow::execution::LAST_INTERACTION_VAR;
use flowline_workflow::{
    AwaitedInput, Edge, Execution, ExecutionStatus, OfferedOption, WorkflowGraph,
};

/// Returns true if the execution can take an inbound event right now.
///
/// `Running` executions only qualify when they are not waiting on a timer.
#[must_use]
pub fn is_resumable(status: ExecutionStatus, waiting_on_timer: bool) -> bool {
    match status {
        ExecutionStatus::Paused => true,
        ExecutionStatus::Running => !waiting_on_timer,
        ExecutionStatus::Completed | ExecutionStatus::Failed => false,
    }
}

/// Orders a recipient's executions by how well they match an event.
///
/// Paused executions of the event's workflow come first, then `Running`
/// ones of that workflow active within the resume window. Under
/// [`ResumePolicy::RecipientRecency`] the recipient's other workflows follow.
/// Within each group the most recently active execution wins.
#[must_use]
pub fn candidates(
    config: &EngineConfig,
    workflow_id: WorkflowId,
    summaries: &[ExecutionSummary],
    now: DateTime<Utc>,
) -> Vec<ExecutionId> {
    let cutoff = now - config.resume_window();
    let fresh = |summary: &ExecutionSummary| summary.last_activity >= cutoff;

    let mut paused = Vec::new();
    let mut running = Vec::new();
    let mut elsewhere = Vec::new();

    for summary in summaries {
        if !is_resumable(summary.status, summary.waiting_on_timer) {
            continue;
        }
        let own_workflow = summary.workflow_id == workflow_id;
        match summary.status {
            ExecutionStatus::Paused if own_workflow => paused.push(summary),
            ExecutionStatus::Running if own_workflow && fresh(summary) => running.push(summary),
            _ if !own_workflow
                && config.resume_policy == ResumePolicy::RecipientRecency
                && fresh(summary) =>
            {
                elsewhere.push(summary);
            }
            _ => {}
        }
    }

    [paused, running, elsewhere]
        .into_iter()
        .flat_map(|mut group| {
            group.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
            group.into_iter().map(|summary| summary.execution_id)
        })
        .collect()
}

/// What the driver does after an event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resumption {
    /// The execution is running again; advance it.
    Advance,
    /// The selected option leads nowhere; the execution is done.
    Terminate,
}

/// Why an event was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A text reply arrived while a button or list choice is awaited.
    AwaitingSelection,
    /// The selected option was not offered and matches no edge.
    UnknownOption { option_id: String },
    /// The execution cannot take events in its current state.
    NotResumable,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingSelection => write!(f, "awaiting a button or list selection"),
            Self::UnknownOption { option_id } => write!(f, "unknown option '{option_id}'"),
            Self::NotResumable => write!(f, "execution is not resumable"),
        }
    }
}

/// Applies an inbound event to a resumable execution.
///
/// On success the execution is `Running` again: a selection has moved it to
/// the chosen branch, a text reply has been stored as `userReply` for the
/// waiting condition. On rejection the execution is left untouched.
pub fn apply(
    graph: &WorkflowGraph,
    execution: &mut Execution,
    event: &InboundEvent,
) -> Result<Resumption, Rejection> {
    if !is_resumable(execution.status, execution.is_waiting_on_timer()) {
        return Err(Rejection::NotResumable);
    }

    let awaiting = execution
        .suspended
        .as_ref()
        .map(|marker| marker.awaiting.clone());

    match awaiting {
        Some(AwaitedInput::Interaction { options }) => {
            if !event.kind.is_selection() {
                return Err(Rejection::AwaitingSelection);
            }
            let outgoing = graph.outgoing(&execution.current_node_id);
            let edge = select_branch(&outgoing, &options, event);
            if edge.is_none() && !was_offered(&options, event) {
                return Err(Rejection::UnknownOption {
                    option_id: event
                        .option_id
                        .clone()
                        .or_else(|| event.option_title.clone())
                        .unwrap_or_default(),
                });
            }

            execution.resume();
            execution.set_variable(LAST_INTERACTION_VAR, event.interaction_record());
            match edge {
                Some(edge) => {
                    execution.move_to(edge.target.clone());
                    Ok(Resumption::Advance)
                }
                None => Ok(Resumption::Terminate),
            }
        }
        // Waiting condition, or a legacy running execution: the event is a reply.
        Some(AwaitedInput::ConditionReply) | None => {
            execution.resume();
            if event.kind.is_selection() {
                execution.set_variable(LAST_INTERACTION_VAR, event.interaction_record());
            }
            execution.set_user_reply(event.reply_text());
            Ok(Resumption::Advance)
        }
    }
}

/// Returns true if the selection names one of the offered options.
///
/// Matches by ID, or by title when the event carries no ID.
fn was_offered(offered: &[OfferedOption], event: &InboundEvent) -> bool {
    match (event.option_id.as_deref(), event.option_title.as_deref()) {
        (Some(option_id), _) => offered.iter().any(|option| option.id == option_id),
        (None, Some(title)) => offered
            .iter()
            .any(|option| option.title.trim().eq_ignore_ascii_case(title.trim())),
        (None, None) => false,
    }
}

/// Picks the outgoing edge for a selection.
///
/// Matches the option ID against edge handles, then the option title against
/// edge labels, then falls back to a lone outgoing edge.
fn select_branch<'g>(
    outgoing: &[&'g Edge],
    offered: &[OfferedOption],
    event: &InboundEvent,
) -> Option<&'g Edge> {
    if let Some(option_id) = event.option_id.as_deref()
        && let Some(edge) = outgoing.iter().find(|edge| edge.has_handle(option_id))
    {
        return Some(*edge);
    }

    let title = event.option_title.as_deref().or_else(|| {
        let option_id = event.option_id.as_deref()?;
        offered
            .iter()
            .find(|option| option.id == option_id)
            .map(|option| option.title.as_str())
    });
    if let Some(title) = title
        && let Some(edge) = outgoing.iter().find(|edge| edge.has_label(title))
    {
        return Some(*edge);
    }

    match outgoing {
        [only] => Some(*only),
        _ => None,
    }
}
