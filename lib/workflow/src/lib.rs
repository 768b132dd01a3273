//! Workflow model for the flowline automation engine.
//!
//! This crate holds everything the engine reads but never mutates, plus the
//! record type the engine owns while running:
//!
//! - **Graph Model**: editor-authored nodes and labeled edges on top of petgraph
//! - **Node Configs**: loose editor config decoded once into typed variants
//! - **Definitions**: workflow metadata, activation flag and run statistics
//! - **Store**: the `WorkflowStore` collaborator contract and an in-memory store
//! - **Execution**: the per-recipient run record and its state machine

pub mod definition;
pub mod edge;
pub mod error;
pub mod execution;
pub mod graph;
pub mod node;
pub mod store;

pub use definition::{RunOutcome, Workflow, WorkflowMetadata, WorkflowStats};
pub use edge::Edge;
pub use error::{GraphError, StoreError};
pub use execution::{AwaitedInput, Execution, ExecutionStatus, OfferedOption, SuspendMarker};
pub use graph::WorkflowGraph;
pub use node::{
    ActionConfig, ConditionConfig, ConditionOperator, DelayConfig, Node, NodeConfig, NodeId,
    NodeKind, WebhookConfig,
};
pub use store::{InMemoryWorkflowStore, WorkflowStore};
