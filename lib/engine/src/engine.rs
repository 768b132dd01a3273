//! Execution driver.
//!
//! [`WorkflowEngine`] owns the registry and the delay scheduler and runs
//! every execution through the same loop:
//!
//! 1. Resolve the current node; a node that no longer resolves completes
//!    the execution.
//! 2. Evaluate it (see `handlers`) to get a [`StepOutcome`].
//! 3. Move on, pause, arm a delay, or finish.
//!
//! The loop holds the execution's slot lock from start to stopping point,
//! so node transitions of one execution are strictly sequential. Workflow
//! statistics are reported to the definition store once per terminal
//! transition.

use crate::config::EngineConfig;
use crate::error::{EngineError, StepFailure};
use crate::event::{InboundEvent, ResumeOutcome};
use crate::handlers::StepOutcome;
use crate::registry::{ExecutionRegistry, ExecutionSlot, InMemoryExecutionRegistry};
use crate::resume::{self, Rejection, Resumption};
use crate::scheduler::DelayScheduler;
use crate::webhook::WebhookSender;
use chrono::{DateTime, TimeDelta, Utc};
use flowline_core::{ContactId, ExecutionId, WorkflowId};
use flowline_messaging::{
    AssignmentDirectory, ConversationRecorder, MessageGateway, RecipientResolver,
};
use flowline_workflow::{Execution, ExecutionStatus, RunOutcome, Workflow, WorkflowStore};
use rootcause::prelude::ResultExt;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// External collaborators the engine calls while running nodes.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn WorkflowStore>,
    pub resolver: Arc<dyn RecipientResolver>,
    pub gateway: Arc<dyn MessageGateway>,
    pub recorder: Arc<dyn ConversationRecorder>,
    pub directory: Arc<dyn AssignmentDirectory>,
    pub webhooks: Arc<dyn WebhookSender>,
}

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) collaborators: Collaborators,
    registry: Arc<dyn ExecutionRegistry>,
    scheduler: DelayScheduler,
}

/// How an execution ends.
enum Ending {
    Completed { halt_reason: Option<String> },
    Failed { error: String },
}

/// The workflow execution engine.
///
/// Cheap to clone; clones share the same registry and scheduler.
#[derive(Clone)]
pub struct WorkflowEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl WorkflowEngine {
    /// Creates an engine with an in-memory execution registry.
    #[must_use]
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        Self::with_registry(
            config,
            collaborators,
            Arc::new(InMemoryExecutionRegistry::new()),
        )
    }

    /// Creates an engine on top of an existing execution registry.
    #[must_use]
    pub fn with_registry(
        config: EngineConfig,
        collaborators: Collaborators,
        registry: Arc<dyn ExecutionRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                collaborators,
                registry,
                scheduler: DelayScheduler::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the number of delay continuations that have not fired yet.
    #[must_use]
    pub fn pending_delays(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Starts a workflow for a recipient and runs it to its first stopping
    /// point.
    ///
    /// Failures inside the graph do not surface here; they are visible on
    /// the execution through [`Self::get_execution`].
    ///
    /// # Errors
    ///
    /// Returns an error if the workflow cannot be loaded, is inactive, or
    /// has no trigger node. No execution is registered in that case.
    #[instrument(skip(self, payload), fields(workflow_id = %workflow_id, contact_id = %contact_id))]
    pub async fn trigger_workflow(
        &self,
        workflow_id: WorkflowId,
        contact_id: ContactId,
        payload: JsonValue,
    ) -> flowline_core::Result<ExecutionId, EngineError> {
        let workflow = self
            .inner
            .collaborators
            .store
            .load(workflow_id)
            .await
            .context(EngineError::StoreUnavailable { workflow_id })?
            .ok_or(EngineError::WorkflowNotFound { workflow_id })?;

        if !workflow.is_active() {
            return Err(EngineError::WorkflowInactive { workflow_id }.into());
        }

        let trigger_id = {
            let triggers = workflow.graph.trigger_nodes();
            let Some(trigger) = triggers.first() else {
                return Err(EngineError::NoTriggerNode { workflow_id }.into());
            };
            if triggers.len() > 1 {
                warn!(
                    trigger_count = triggers.len(),
                    trigger_node = %trigger.id,
                    "Workflow has several trigger nodes, using the first"
                );
            }
            trigger.id.clone()
        };

        let execution = Execution::new(workflow_id, contact_id, trigger_id, payload);
        let execution_id = execution.id;
        let slot = Arc::new(ExecutionSlot::new(workflow, execution));

        // Registered while locked so nothing can resume it before the first run.
        let mut state = slot.state.lock().await;
        self.inner.registry.insert(Arc::clone(&slot), &state).await;
        info!(execution_id = %execution_id, "Execution created");

        self.drive(&slot.workflow, &mut state).await;
        Ok(execution_id)
    }

    /// Delivers a recipient's reply to their suspended execution.
    ///
    /// Never fails: events that match nothing, or do not fit what the
    /// execution awaits, are logged and reported in the outcome. A candidate
    /// that refuses the event passes it on to the next one; the event is
    /// ignored only if every candidate refuses it.
    #[instrument(skip(self, event), fields(workflow_id = %workflow_id, contact_id = %contact_id, kind = ?event.kind))]
    pub async fn continue_workflow(
        &self,
        workflow_id: WorkflowId,
        contact_id: ContactId,
        event: InboundEvent,
    ) -> ResumeOutcome {
        let summaries = self.inner.registry.for_contact(contact_id).await;
        let candidates = resume::candidates(&self.inner.config, workflow_id, &summaries, Utc::now());

        let mut refused = None;
        for execution_id in candidates {
            let Some(slot) = self.inner.registry.get(execution_id).await else {
                continue;
            };
            let mut execution = slot.state.lock().await;

            match resume::apply(&slot.workflow.graph, &mut execution, &event) {
                Ok(Resumption::Advance) => {
                    info!(execution_id = %execution_id, node_id = %execution.current_node_id, "Execution resumed");
                    self.drive(&slot.workflow, &mut execution).await;
                    return ResumeOutcome::Resumed { execution_id };
                }
                Ok(Resumption::Terminate) => {
                    info!(execution_id = %execution_id, "Selected option has no outgoing edge");
                    self.finish(&mut execution, Ending::Completed { halt_reason: None })
                        .await;
                    self.inner.registry.refresh(&execution).await;
                    return ResumeOutcome::Resumed { execution_id };
                }
                // The summary was stale; try the next candidate.
                Err(Rejection::NotResumable) => continue,
                Err(rejection) => {
                    info!(execution_id = %execution_id, reason = %rejection, "Execution refused inbound event");
                    refused = refused.or(Some(execution_id));
                }
            }
        }

        match refused {
            Some(execution_id) => {
                info!(execution_id = %execution_id, "Ignoring inbound event");
                ResumeOutcome::Ignored { execution_id }
            }
            None => {
                info!("No resumable execution for inbound event");
                ResumeOutcome::NotFound
            }
        }
    }

    /// Runs an execution from its current node.
    ///
    /// A no-op for unknown executions and for executions that are paused,
    /// finished, or waiting on a delay.
    #[instrument(skip(self), fields(execution_id = %execution_id))]
    pub async fn advance(&self, execution_id: ExecutionId) {
        let Some(slot) = self.inner.registry.get(execution_id).await else {
            warn!("Cannot advance unknown execution");
            return;
        };
        let mut execution = slot.state.lock().await;
        self.drive(&slot.workflow, &mut execution).await;
    }

    /// Returns a snapshot of an execution.
    pub async fn get_execution(&self, execution_id: ExecutionId) -> Option<Execution> {
        let slot = self.inner.registry.get(execution_id).await?;
        let execution = slot.state.lock().await;
        Some(execution.clone())
    }

    /// Returns snapshots of every registered execution.
    pub async fn list_executions(&self) -> Vec<Execution> {
        let mut executions = Vec::new();
        for execution_id in self.inner.registry.ids().await {
            if let Some(execution) = self.get_execution(execution_id).await {
                executions.push(execution);
            }
        }
        executions
    }

    /// Removes finished executions older than `retention`.
    ///
    /// Returns the number of executions removed.
    pub async fn evict_finished(&self, retention: TimeDelta) -> usize {
        let evicted = self
            .inner
            .registry
            .evict_finished(Utc::now() - retention)
            .await;
        if evicted > 0 {
            info!(evicted, "Evicted finished executions");
        }
        evicted
    }

    /// Removes finished executions older than the configured retention.
    pub async fn evict_expired(&self) -> usize {
        self.evict_finished(self.inner.config.finished_retention())
            .await
    }

    async fn drive(&self, workflow: &Workflow, execution: &mut Execution) {
        if execution.status != ExecutionStatus::Running || execution.is_waiting_on_timer() {
            debug!(
                execution_id = %execution.id,
                status = ?execution.status,
                "Execution is not runnable"
            );
            return;
        }

        let max_hops = self.inner.config.max_hops;
        let mut hops = 0;

        loop {
            let Some(node) = workflow.graph.node(&execution.current_node_id) else {
                debug!(node_id = %execution.current_node_id, "Current node does not resolve");
                self.finish(execution, Ending::Completed { halt_reason: None })
                    .await;
                break;
            };

            match self.step(workflow, node, execution).await {
                Ok(StepOutcome::NextNode(next)) => {
                    if hops >= max_hops {
                        let error = StepFailure::MaxHopsExceeded { max_hops }.to_string();
                        self.finish(execution, Ending::Failed { error }).await;
                        break;
                    }
                    hops += 1;
                    debug!(from = %node.id, to = %next, "Advancing");
                    execution.move_to(next);
                }
                Ok(StepOutcome::Suspend(awaiting)) => {
                    execution.suspend(awaiting);
                    info!(
                        execution_id = %execution.id,
                        node_id = %execution.current_node_id,
                        "Execution paused"
                    );
                    break;
                }
                Ok(StepOutcome::Wait(wait)) => {
                    self.arm_delay(execution, wait);
                    break;
                }
                Ok(StepOutcome::Terminate { halt_reason }) => {
                    self.finish(execution, Ending::Completed { halt_reason })
                        .await;
                    break;
                }
                Err(failure) => {
                    let error = failure.to_string();
                    self.finish(execution, Ending::Failed { error }).await;
                    break;
                }
            }
        }

        self.inner.registry.refresh(execution).await;
    }

    fn arm_delay(&self, execution: &mut Execution, wait: Duration) {
        let now = Utc::now();
        let wake_at = TimeDelta::from_std(wait)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        execution.schedule_wake(wake_at);

        let engine = self.clone();
        let execution_id = execution.id;
        self.inner.scheduler.schedule(wait, async move {
            engine.wake(execution_id).await;
        });

        info!(
            execution_id = %execution_id,
            node_id = %execution.current_node_id,
            wake_at = %wake_at,
            "Execution waiting on delay"
        );
    }

    /// Continues past a delay node once its timer fires.
    async fn wake(&self, execution_id: ExecutionId) {
        let Some(slot) = self.inner.registry.get(execution_id).await else {
            debug!(execution_id = %execution_id, "Delay fired for evicted execution");
            return;
        };
        let mut execution = slot.state.lock().await;
        if execution.status != ExecutionStatus::Running || execution.clear_wake().is_none() {
            debug!(execution_id = %execution_id, "Delay fired for execution no longer waiting");
            return;
        }

        debug!(execution_id = %execution_id, node_id = %execution.current_node_id, "Delay elapsed");
        match slot.workflow.graph.first_outgoing(&execution.current_node_id) {
            Some(edge) => {
                execution.move_to(edge.target.clone());
                self.drive(&slot.workflow, &mut execution).await;
            }
            None => {
                self.finish(&mut execution, Ending::Completed { halt_reason: None })
                    .await;
                self.inner.registry.refresh(&execution).await;
            }
        }
    }

    async fn finish(&self, execution: &mut Execution, ending: Ending) {
        let outcome = match ending {
            Ending::Completed { halt_reason } => {
                if !execution.complete(halt_reason) {
                    return;
                }
                info!(
                    execution_id = %execution.id,
                    node_id = %execution.current_node_id,
                    halt_reason = ?execution.halt_reason,
                    "Execution completed"
                );
                RunOutcome::Success
            }
            Ending::Failed { error } => {
                if !execution.fail(error) {
                    return;
                }
                warn!(
                    execution_id = %execution.id,
                    node_id = %execution.current_node_id,
                    error = ?execution.error,
                    "Execution failed"
                );
                RunOutcome::Failure
            }
        };

        if let Err(e) = self
            .inner
            .collaborators
            .store
            .record_outcome(execution.workflow_id, outcome)
            .await
        {
            warn!(error = %e, workflow_id = %execution.workflow_id, "Failed to update workflow statistics");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        Harness, UnreachableStore, assign, buttons, condition, delay, graph, list, text, trigger,
        webhook,
    };
    use flowline_workflow::node::NodeConfig;
    use flowline_workflow::{AwaitedInput, Edge, Node, NodeId, NodeKind, WorkflowGraph};
    use serde_json::json;

    fn path(execution: &Execution) -> Vec<&str> {
        execution.execution_path.iter().map(NodeId::as_str).collect()
    }

    fn button_graph() -> WorkflowGraph {
        graph(
            vec![
                trigger("start"),
                buttons("ask", &[("opt-yes", "Yes"), ("opt-no", "No")]),
                text("yes-path", "Great"),
                text("no-path", "Maybe later"),
            ],
            vec![
                Edge::new("e1", "start", "ask"),
                Edge::new("e2", "ask", "yes-path").with_handle("opt-yes"),
                Edge::new("e3", "ask", "no-path").with_handle("opt-no"),
            ],
        )
    }

    async fn run(h: &Harness, graph: WorkflowGraph, contact_id: ContactId) -> Execution {
        let workflow_id = h.install(graph).await;
        let execution_id = h
            .engine
            .trigger_workflow(workflow_id, contact_id, json!({"text": "hi"}))
            .await
            .unwrap();
        h.engine.get_execution(execution_id).await.unwrap()
    }

    #[tokio::test]
    async fn linear_chain_runs_to_completion() {
        let h = Harness::new();
        let contact_id = ContactId::new();
        let graph = graph(
            vec![trigger("start"), text("hello", "Hello"), text("bye", "Bye")],
            vec![
                Edge::new("e1", "start", "hello"),
                Edge::new("e2", "hello", "bye"),
            ],
        );

        let execution = run(&h, graph, contact_id).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(path(&execution), vec!["start", "hello", "bye"]);
        assert!(execution.halt_reason.is_none());
        assert!(execution.completed_at.is_some());
        assert_eq!(h.gateway.sent().len(), 2);

        let records = h.recorder.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].contact_id, contact_id);
        assert_eq!(records[0].content, "Hello");
        assert_eq!(records[0].message_type, "text");
        assert_eq!(records[0].sender_label, "automation");
        assert_eq!(records[0].provider_message_id.as_deref(), Some("wamid.1"));

        let stats = h.store.stats(execution.workflow_id).await.unwrap();
        assert_eq!(stats.execution_count, 1);
        assert_eq!(stats.success_count, 1);
        assert!(stats.last_triggered_at.is_some());
    }

    #[tokio::test]
    async fn trigger_rejects_unknown_inactive_and_triggerless_workflows() {
        let h = Harness::new();
        let contact_id = ContactId::new();

        let err = h
            .engine
            .trigger_workflow(WorkflowId::new(), contact_id, json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("workflow not found"));

        let mut inactive = Workflow::with_graph("Off", graph(vec![trigger("start")], vec![]));
        inactive.deactivate();
        let inactive_id = h.store.insert(inactive).await;
        let err = h
            .engine
            .trigger_workflow(inactive_id, contact_id, json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inactive"));

        let triggerless = h.install(graph(vec![text("hello", "Hello")], vec![])).await;
        let err = h
            .engine
            .trigger_workflow(triggerless, contact_id, json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no trigger node"));

        assert!(h.engine.list_executions().await.is_empty());
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn condition_branches_on_trigger_text() {
        let h = Harness::new();
        let build = || {
            graph(
                vec![
                    trigger("start"),
                    condition("check", "pricing", false),
                    text("yes-path", "Here are our prices"),
                    text("no-path", "How can we help?"),
                ],
                vec![
                    Edge::new("e1", "start", "check"),
                    Edge::new("e2", "check", "yes-path").with_handle("yes"),
                    Edge::new("e3", "check", "no-path").with_handle("no"),
                ],
            )
        };

        let yes_id = h.install(build()).await;
        let id = h
            .engine
            .trigger_workflow(yes_id, ContactId::new(), json!({"text": "What is your PRICING?"}))
            .await
            .unwrap();
        let execution = h.engine.get_execution(id).await.unwrap();
        assert_eq!(path(&execution), vec!["start", "check", "yes-path"]);

        let no_id = h.install(build()).await;
        let id = h
            .engine
            .trigger_workflow(no_id, ContactId::new(), json!("opening hours?"))
            .await
            .unwrap();
        let execution = h.engine.get_execution(id).await.unwrap();
        assert_eq!(path(&execution), vec!["start", "check", "no-path"]);
        assert_eq!(execution.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn condition_waits_for_reply_then_branches() {
        let h = Harness::new();
        let contact_id = ContactId::new();
        let workflow_id = h
            .install(graph(
                vec![
                    trigger("start"),
                    condition("check", "yes", true),
                    text("yes-path", "Confirmed"),
                    text("no-path", "Cancelled"),
                ],
                vec![
                    Edge::new("e1", "start", "check"),
                    Edge::new("e2", "check", "yes-path").with_label("Yes"),
                    Edge::new("e3", "check", "no-path").with_label("No"),
                ],
            ))
            .await;

        let id = h
            .engine
            .trigger_workflow(workflow_id, contact_id, json!({"text": "yes"}))
            .await
            .unwrap();
        let paused = h.engine.get_execution(id).await.unwrap();
        assert_eq!(paused.status, ExecutionStatus::Paused);
        assert_eq!(
            paused.suspended.as_ref().map(|m| m.awaiting.clone()),
            Some(AwaitedInput::ConditionReply)
        );

        let outcome = h
            .engine
            .continue_workflow(workflow_id, contact_id, InboundEvent::text("Nope"))
            .await;
        assert_eq!(outcome, ResumeOutcome::Resumed { execution_id: id });

        let execution = h.engine.get_execution(id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(path(&execution), vec!["start", "check", "no-path"]);
        assert!(execution.user_reply().is_none());
    }

    #[tokio::test]
    async fn buttons_suspend_until_clicked() {
        let h = Harness::new();
        let contact_id = ContactId::new();
        let workflow_id = h.install(button_graph()).await;

        let id = h
            .engine
            .trigger_workflow(workflow_id, contact_id, json!({}))
            .await
            .unwrap();
        let paused = h.engine.get_execution(id).await.unwrap();
        assert_eq!(paused.status, ExecutionStatus::Paused);
        assert_eq!(paused.current_node_id.as_str(), "ask");
        let Some(AwaitedInput::Interaction { options }) =
            paused.suspended.as_ref().map(|m| m.awaiting.clone())
        else {
            panic!("expected interaction marker");
        };
        assert_eq!(options.len(), 2);
        assert_eq!(h.recorder.records()[0].message_type, "interactive");

        let outcome = h
            .engine
            .continue_workflow(workflow_id, contact_id, InboundEvent::button_click("opt-no", "No"))
            .await;
        assert_eq!(outcome, ResumeOutcome::Resumed { execution_id: id });

        let execution = h.engine.get_execution(id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(path(&execution), vec!["start", "ask", "no-path"]);
        assert_eq!(execution.variables["lastInteraction"]["optionId"], "opt-no");
        assert_eq!(h.gateway.sent().len(), 2);

        // Already finished: nothing to resume.
        let again = h
            .engine
            .continue_workflow(workflow_id, contact_id, InboundEvent::button_click("opt-yes", "Yes"))
            .await;
        assert_eq!(again, ResumeOutcome::NotFound);
        assert_eq!(h.gateway.sent().len(), 2);
    }

    #[tokio::test]
    async fn text_reply_does_not_resume_a_button_prompt() {
        let h = Harness::new();
        let contact_id = ContactId::new();
        let workflow_id = h.install(button_graph()).await;
        let id = h
            .engine
            .trigger_workflow(workflow_id, contact_id, json!({}))
            .await
            .unwrap();

        let outcome = h
            .engine
            .continue_workflow(workflow_id, contact_id, InboundEvent::text("yes"))
            .await;
        assert_eq!(outcome, ResumeOutcome::Ignored { execution_id: id });

        let unknown = h
            .engine
            .continue_workflow(workflow_id, contact_id, InboundEvent::button_click("other", "Other"))
            .await;
        assert_eq!(unknown, ResumeOutcome::Ignored { execution_id: id });
        assert_eq!(
            h.engine.get_execution(id).await.unwrap().status,
            ExecutionStatus::Paused
        );

        let stranger = h
            .engine
            .continue_workflow(workflow_id, ContactId::new(), InboundEvent::button_click("opt-yes", "Yes"))
            .await;
        assert_eq!(stranger, ResumeOutcome::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_continues_after_wait() {
        let h = Harness::new();
        let contact_id = ContactId::new();
        let workflow_id = h
            .install(graph(
                vec![trigger("start"), delay("wait", 5), text("after", "Still there?")],
                vec![
                    Edge::new("e1", "start", "wait"),
                    Edge::new("e2", "wait", "after"),
                ],
            ))
            .await;

        let id = h
            .engine
            .trigger_workflow(workflow_id, contact_id, json!({}))
            .await
            .unwrap();
        let waiting = h.engine.get_execution(id).await.unwrap();
        assert_eq!(waiting.status, ExecutionStatus::Running);
        assert_eq!(waiting.current_node_id.as_str(), "wait");
        assert!(waiting.is_waiting_on_timer());
        assert_eq!(h.engine.pending_delays(), 1);

        // Neither a manual advance nor a reply skips the delay.
        h.engine.advance(id).await;
        let outcome = h
            .engine
            .continue_workflow(workflow_id, contact_id, InboundEvent::text("hello"))
            .await;
        assert_eq!(outcome, ResumeOutcome::NotFound);
        assert!(h.gateway.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(4900)).await;
        let almost = h.engine.get_execution(id).await.unwrap();
        assert_eq!(path(&almost), vec!["start", "wait"]);
        assert!(almost.is_waiting_on_timer());
        assert_eq!(h.engine.pending_delays(), 1);
        assert!(h.gateway.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;

        let execution = h.engine.get_execution(id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(path(&execution), vec!["start", "wait", "after"]);
        assert!(execution.wake_at.is_none());
        assert_eq!(h.engine.pending_delays(), 0);
        assert_eq!(h.gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn first_trigger_in_authored_order_starts_the_run() {
        let h = Harness::new();

        let execution = run(
            &h,
            graph(
                vec![
                    trigger("t1"),
                    trigger("t2"),
                    text("a", "From the first trigger"),
                    text("b", "From the second trigger"),
                ],
                vec![Edge::new("e1", "t1", "a"), Edge::new("e2", "t2", "b")],
            ),
            ContactId::new(),
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(path(&execution), vec!["t1", "a"]);
        assert_eq!(h.gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn list_selection_resumes_list_prompt() {
        let h = Harness::new();
        let contact_id = ContactId::new();
        let workflow_id = h
            .install(graph(
                vec![
                    trigger("start"),
                    list("topics", &[("row-billing", "Billing"), ("row-tech", "Technical")]),
                    text("billing", "Billing team"),
                    text("tech", "Tech team"),
                ],
                vec![
                    Edge::new("e1", "start", "topics"),
                    Edge::new("e2", "topics", "billing").with_handle("row-billing"),
                    Edge::new("e3", "topics", "tech").with_handle("row-tech"),
                ],
            ))
            .await;

        let id = h
            .engine
            .trigger_workflow(workflow_id, contact_id, json!({}))
            .await
            .unwrap();
        let paused = h.engine.get_execution(id).await.unwrap();
        assert_eq!(paused.status, ExecutionStatus::Paused);
        assert_eq!(paused.current_node_id.as_str(), "topics");
        assert_eq!(h.recorder.records()[0].message_type, "interactive");

        let outcome = h
            .engine
            .continue_workflow(
                workflow_id,
                contact_id,
                InboundEvent::list_selection("row-tech", "Technical"),
            )
            .await;
        assert_eq!(outcome, ResumeOutcome::Resumed { execution_id: id });

        let execution = h.engine.get_execution(id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(path(&execution), vec!["start", "topics", "tech"]);
        assert_eq!(execution.variables["lastInteraction"]["kind"], "list_selection");
    }

    #[tokio::test]
    async fn refused_event_passes_to_next_candidate() {
        let h = Harness::with_config(EngineConfig {
            resume_policy: crate::config::ResumePolicy::RecipientRecency,
            ..EngineConfig::default()
        });
        let contact_id = ContactId::new();

        let survey_id = h
            .install(graph(
                vec![
                    trigger("start"),
                    condition("check", "yes", true),
                    text("thanks", "Thanks!"),
                ],
                vec![
                    Edge::new("e1", "start", "check"),
                    Edge::new("e2", "check", "thanks").with_handle("yes"),
                ],
            ))
            .await;
        let survey = h
            .engine
            .trigger_workflow(survey_id, contact_id, json!({}))
            .await
            .unwrap();

        let menu_id = h.install(button_graph()).await;
        let menu = h
            .engine
            .trigger_workflow(menu_id, contact_id, json!({}))
            .await
            .unwrap();

        // The menu awaits a click, so the text reply goes to the survey.
        let outcome = h
            .engine
            .continue_workflow(menu_id, contact_id, InboundEvent::text("yes"))
            .await;
        assert_eq!(outcome, ResumeOutcome::Resumed { execution_id: survey });

        let survey_run = h.engine.get_execution(survey).await.unwrap();
        assert_eq!(survey_run.status, ExecutionStatus::Completed);
        assert_eq!(path(&survey_run), vec!["start", "check", "thanks"]);
        assert_eq!(
            h.engine.get_execution(menu).await.unwrap().status,
            ExecutionStatus::Paused
        );
    }

    #[tokio::test]
    async fn unreachable_store_is_reported_to_the_caller() {
        let h = Harness::new();
        let engine = WorkflowEngine::new(
            EngineConfig::default(),
            Collaborators {
                store: Arc::new(UnreachableStore),
                ..h.engine.inner.collaborators.clone()
            },
        );
        let workflow_id = WorkflowId::new();

        let err = engine
            .trigger_workflow(workflow_id, ContactId::new(), json!({}))
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .contains(&format!("cannot load workflow {workflow_id}"))
        );
        assert!(engine.list_executions().await.is_empty());
    }

    #[tokio::test]
    async fn recorder_failure_does_not_stop_sends() {
        let h = Harness::new();
        h.recorder.fail_records();

        let execution = run(
            &h,
            graph(
                vec![trigger("start"), text("hello", "Hello"), text("bye", "Bye")],
                vec![
                    Edge::new("e1", "start", "hello"),
                    Edge::new("e2", "hello", "bye"),
                ],
            ),
            ContactId::new(),
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.halt_reason.is_none());
        assert_eq!(path(&execution), vec!["start", "hello", "bye"]);
        assert_eq!(h.gateway.sent().len(), 2);
        assert!(h.recorder.records().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_recipient_halts_without_failing() {
        let h = Harness::new();
        let contact_id = ContactId::new();
        h.resolver.mark_missing(contact_id);

        let execution = run(
            &h,
            graph(
                vec![trigger("start"), text("hello", "Hello")],
                vec![Edge::new("e1", "start", "hello")],
            ),
            contact_id,
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(
            execution
                .halt_reason
                .as_deref()
                .is_some_and(|reason| reason.contains("contact not found"))
        );
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn rejected_send_halts_without_recording() {
        let h = Harness::new();
        h.gateway.fail_sends();

        let execution = run(
            &h,
            graph(
                vec![trigger("start"), text("hello", "Hello"), text("bye", "Bye")],
                vec![
                    Edge::new("e1", "start", "hello"),
                    Edge::new("e2", "hello", "bye"),
                ],
            ),
            ContactId::new(),
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.current_node_id.as_str(), "hello");
        assert!(execution.halt_reason.as_deref().is_some_and(|r| r.contains("401")));
        assert!(h.recorder.records().is_empty());
    }

    #[tokio::test]
    async fn malformed_action_fails_execution() {
        let h = Harness::new();
        let broken = Node::new(
            "broken",
            NodeConfig::Malformed {
                kind: NodeKind::Action,
                reason: "missing field `actionType`".to_string(),
                raw: json!({"message": "Hi"}),
            },
        );

        let execution = run(
            &h,
            graph(
                vec![trigger("start"), broken],
                vec![Edge::new("e1", "start", "broken")],
            ),
            ContactId::new(),
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(
            execution
                .error
                .as_deref()
                .is_some_and(|error| error.contains("actionType"))
        );
        let stats = h.store.stats(execution.workflow_id).await.unwrap();
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.success_count, 0);
    }

    #[tokio::test]
    async fn cycle_fails_after_max_hops() {
        let h = Harness::with_config(EngineConfig {
            max_hops: 5,
            ..EngineConfig::default()
        });

        let execution = run(
            &h,
            graph(
                vec![
                    trigger("start"),
                    condition("a", "", false),
                    condition("b", "", false),
                ],
                vec![
                    Edge::new("e1", "start", "a"),
                    Edge::new("e2", "a", "b"),
                    Edge::new("e3", "b", "a"),
                ],
            ),
            ContactId::new(),
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.error.as_deref(), Some("max hops exceeded (5)"));
        assert_eq!(execution.execution_path.len(), 6);
    }

    #[tokio::test]
    async fn webhook_failure_is_swallowed() {
        let h = Harness::new();
        h.webhooks.fail_deliveries();
        let contact_id = ContactId::new();

        let execution = run(
            &h,
            graph(
                vec![
                    trigger("start"),
                    webhook("notify", "https://hooks.example.com/flow"),
                    text("after", "Done"),
                ],
                vec![
                    Edge::new("e1", "start", "notify"),
                    Edge::new("e2", "notify", "after"),
                ],
            ),
            contact_id,
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.halt_reason.is_none());
        assert_eq!(path(&execution), vec!["start", "notify", "after"]);

        let requests = h.webhooks.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://hooks.example.com/flow");
        assert_eq!(requests[0].payload.recipient_id, contact_id);
        assert_eq!(requests[0].payload.variables["trigger"]["text"], "hi");
        assert_eq!(requests[0].headers["X-Flow"], "test");
    }

    #[tokio::test]
    async fn assign_conversation_appends_note() {
        let h = Harness::new();
        let contact_id = ContactId::new();
        let user_id = h.directory.add_user("Grace");
        let conversation_id = h.directory.add_conversation(contact_id);

        let execution = run(
            &h,
            graph(
                vec![trigger("start"), assign("handoff", user_id)],
                vec![Edge::new("e1", "start", "handoff")],
            ),
            contact_id,
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.halt_reason.is_none());
        assert_eq!(h.directory.assignments(), vec![(contact_id, user_id)]);
        let notes = h.directory.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, conversation_id);
        assert!(notes[0].1.contains("Grace"));
    }

    #[tokio::test]
    async fn assign_to_unknown_user_halts() {
        let h = Harness::new();

        let execution = run(
            &h,
            graph(
                vec![trigger("start"), assign("handoff", flowline_core::UserId::new())],
                vec![Edge::new("e1", "start", "handoff")],
            ),
            ContactId::new(),
        )
        .await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(
            execution
                .halt_reason
                .as_deref()
                .is_some_and(|reason| reason.contains("user not found"))
        );
        assert!(h.directory.assignments().is_empty());
    }

    #[tokio::test]
    async fn evict_finished_keeps_paused_executions() {
        let h = Harness::new();
        let done = run(
            &h,
            graph(vec![trigger("start")], vec![]),
            ContactId::new(),
        )
        .await;
        let workflow_id = h.install(button_graph()).await;
        let paused = h
            .engine
            .trigger_workflow(workflow_id, ContactId::new(), json!({}))
            .await
            .unwrap();

        assert_eq!(h.engine.evict_finished(TimeDelta::hours(1)).await, 0);
        assert_eq!(h.engine.evict_finished(TimeDelta::zero()).await, 1);
        assert!(h.engine.get_execution(done.id).await.is_none());
        assert!(h.engine.get_execution(paused).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recipients_run_independently() {
        let h = Harness::new();
        let workflow_id = h.install(button_graph()).await;
        let contacts: Vec<_> = (0..100).map(|_| ContactId::new()).collect();

        let started = futures::future::join_all(contacts.iter().map(|contact_id| {
            h.engine
                .trigger_workflow(workflow_id, *contact_id, json!({}))
        }))
        .await;
        assert!(started.iter().all(Result::is_ok));

        let outcomes = futures::future::join_all(contacts.iter().map(|contact_id| {
            h.engine.continue_workflow(
                workflow_id,
                *contact_id,
                InboundEvent::button_click("opt-yes", "Yes"),
            )
        }))
        .await;
        assert!(
            outcomes
                .iter()
                .all(|outcome| matches!(outcome, ResumeOutcome::Resumed { .. }))
        );

        let executions = h.engine.list_executions().await;
        assert_eq!(executions.len(), 100);
        for execution in &executions {
            assert_eq!(execution.status, ExecutionStatus::Completed);
            assert_eq!(path(execution), vec!["start", "ask", "yes-path"]);
        }
        assert_eq!(h.gateway.sent().len(), 200);
        assert_eq!(
            h.store.stats(workflow_id).await.unwrap().success_count,
            100
        );
    }
}
