//! Execution registry.
//!
//! Every execution lives in an [`ExecutionSlot`] that pairs the workflow
//! snapshot it started with and its mutable state behind a per-execution
//! mutex. The mutex is the serialization point: `advance`, delay wake-ups and
//! resumes for the same execution never interleave, while different
//! executions proceed independently.
//!
//! Alongside each slot the registry keeps an [`ExecutionSummary`] that is
//! refreshed after every state change, so resume lookups can scan a
//! recipient's executions without locking them. Summaries may be stale;
//! callers re-check the real state under the slot lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowline_core::{ContactId, ExecutionId, WorkflowId};
use flowline_workflow::{Execution, ExecutionStatus, Workflow};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One registered execution.
#[derive(Debug)]
pub struct ExecutionSlot {
    /// The definition the execution was started against.
    pub workflow: Arc<Workflow>,
    pub state: Mutex<Execution>,
}

impl ExecutionSlot {
    #[must_use]
    pub fn new(workflow: Arc<Workflow>, execution: Execution) -> Self {
        Self {
            workflow,
            state: Mutex::new(execution),
        }
    }
}

/// Lock-free view of an execution used for lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub contact_id: ContactId,
    pub status: ExecutionStatus,
    pub waiting_on_timer: bool,
    pub last_activity: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Execution> for ExecutionSummary {
    fn from(execution: &Execution) -> Self {
        Self {
            execution_id: execution.id,
            workflow_id: execution.workflow_id,
            contact_id: execution.contact_id,
            status: execution.status,
            waiting_on_timer: execution.is_waiting_on_timer(),
            last_activity: execution.last_activity,
            completed_at: execution.completed_at,
        }
    }
}

/// Storage for executions.
///
/// The engine only talks to this trait, so a durable backend can replace
/// the in-memory one.
#[async_trait]
pub trait ExecutionRegistry: Send + Sync {
    /// Registers a new execution.
    ///
    /// `execution` is the current state of `slot`, which the caller may
    /// already hold locked.
    async fn insert(&self, slot: Arc<ExecutionSlot>, execution: &Execution);

    /// Returns the slot of an execution.
    async fn get(&self, execution_id: ExecutionId) -> Option<Arc<ExecutionSlot>>;

    /// Refreshes the lookup summary after a state change.
    async fn refresh(&self, execution: &Execution);

    /// Returns the summaries of every execution for a recipient.
    async fn for_contact(&self, contact_id: ContactId) -> Vec<ExecutionSummary>;

    /// Returns every registered execution id.
    async fn ids(&self) -> Vec<ExecutionId>;

    /// Removes terminal executions that completed before `cutoff`.
    ///
    /// Returns the number of executions removed.
    async fn evict_finished(&self, cutoff: DateTime<Utc>) -> usize;
}

struct Entry {
    slot: Arc<ExecutionSlot>,
    summary: ExecutionSummary,
}

/// Execution registry backed by a process-local map.
#[derive(Default)]
pub struct InMemoryExecutionRegistry {
    entries: RwLock<HashMap<ExecutionId, Entry>>,
}

impl InMemoryExecutionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered executions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ExecutionRegistry for InMemoryExecutionRegistry {
    async fn insert(&self, slot: Arc<ExecutionSlot>, execution: &Execution) {
        self.entries.write().await.insert(
            execution.id,
            Entry {
                slot,
                summary: ExecutionSummary::from(execution),
            },
        );
    }

    async fn get(&self, execution_id: ExecutionId) -> Option<Arc<ExecutionSlot>> {
        self.entries
            .read()
            .await
            .get(&execution_id)
            .map(|entry| Arc::clone(&entry.slot))
    }

    async fn refresh(&self, execution: &Execution) {
        if let Some(entry) = self.entries.write().await.get_mut(&execution.id) {
            entry.summary = ExecutionSummary::from(execution);
        }
    }

    async fn for_contact(&self, contact_id: ContactId) -> Vec<ExecutionSummary> {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.summary.contact_id == contact_id)
            .map(|entry| entry.summary.clone())
            .collect()
    }

    async fn ids(&self) -> Vec<ExecutionId> {
        let mut ids: Vec<_> = self.entries.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    async fn evict_finished(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            !(entry.summary.status.is_terminal()
                && entry
                    .summary
                    .completed_at
                    .is_some_and(|completed_at| completed_at < cutoff))
        });
        before - entries.len()
    }
}
