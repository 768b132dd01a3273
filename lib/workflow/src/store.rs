//! Workflow definition store.
//!
//! The engine reads definitions through [`WorkflowStore`] and reports
//! finished executions back for statistics. Definitions are handed out as
//! `Arc<Workflow>` so every execution keeps the graph it started with even
//! if the stored definition changes later.

use crate::definition::{RunOutcome, Workflow, WorkflowStats};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use flowline_core::WorkflowId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Collaborator contract for loading workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Loads a workflow definition, or `None` if it does not exist.
    async fn load(&self, workflow_id: WorkflowId) -> Result<Option<Arc<Workflow>>, StoreError>;

    /// Counts one finished execution towards the workflow's statistics.
    async fn record_outcome(
        &self,
        workflow_id: WorkflowId,
        outcome: RunOutcome,
    ) -> Result<(), StoreError>;
}

/// Workflow store backed by a process-local map.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, Arc<Workflow>>>,
}

impl InMemoryWorkflowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a definition.
    pub async fn insert(&self, workflow: Workflow) -> WorkflowId {
        let id = workflow.id;
        self.workflows.write().await.insert(id, Arc::new(workflow));
        id
    }

    /// Returns the current statistics of a workflow.
    pub async fn stats(&self, workflow_id: WorkflowId) -> Option<WorkflowStats> {
        self.workflows
            .read()
            .await
            .get(&workflow_id)
            .map(|workflow| workflow.stats.clone())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn load(&self, workflow_id: WorkflowId) -> Result<Option<Arc<Workflow>>, StoreError> {
        Ok(self.workflows.read().await.get(&workflow_id).cloned())
    }

    async fn record_outcome(
        &self,
        workflow_id: WorkflowId,
        outcome: RunOutcome,
    ) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write().await;
        if let Some(workflow) = workflows.get_mut(&workflow_id) {
            // Running executions keep their own snapshot.
            Arc::make_mut(workflow).stats.record(outcome, Utc::now());
        }
        Ok(())
    }
}
