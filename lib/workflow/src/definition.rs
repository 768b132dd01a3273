//! Workflow definition types.
//!
//! A workflow is an authored automation made of:
//! - Metadata (name, description, activation flag, timestamps)
//! - The graph of nodes and edges
//! - Run statistics maintained by the definition store

use crate::graph::WorkflowGraph;
use chrono::{DateTime, Utc};
use flowline_core::WorkflowId;
use serde::{Deserialize, Serialize};

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    pub name: String,
    pub description: Option<String>,
    /// Inactive workflows cannot be triggered.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    /// Creates active metadata with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// How a finished execution counts towards workflow statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
}

/// Aggregate run statistics for a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl WorkflowStats {
    /// Counts one finished execution.
    pub fn record(&mut self, outcome: RunOutcome, at: DateTime<Utc>) {
        self.execution_count += 1;
        match outcome {
            RunOutcome::Success => self.success_count += 1,
            RunOutcome::Failure => self.failure_count += 1,
        }
        self.last_triggered_at = Some(at);
    }
}

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub metadata: WorkflowMetadata,
    pub graph: WorkflowGraph,
    #[serde(default)]
    pub stats: WorkflowStats,
}

impl Workflow {
    /// Creates an active workflow with an empty graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_graph(name, WorkflowGraph::new())
    }

    /// Creates an active workflow around an existing graph.
    #[must_use]
    pub fn with_graph(name: impl Into<String>, graph: WorkflowGraph) -> Self {
        Self {
            id: WorkflowId::new(),
            metadata: WorkflowMetadata::new(name),
            graph,
            stats: WorkflowStats::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.metadata.active
    }

    pub fn activate(&mut self) {
        self.metadata.active = true;
        self.metadata.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.metadata.active = false;
        self.metadata.updated_at = Utc::now();
    }
}
