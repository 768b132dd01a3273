//! Error types for the workflow crate.
//!
//! - `GraphError`: structural problems while building a graph
//! - `StoreError`: failures of the workflow definition store

use crate::node::NodeId;
use std::fmt;

/// Errors from graph construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// A node with the same ID is already present.
    DuplicateNode { node_id: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::DuplicateNode { node_id } => write!(f, "duplicate node id: {node_id}"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from the workflow definition store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached.
    Unavailable { reason: String },
    /// The stored definition could not be decoded.
    Corrupt { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "workflow store unavailable: {reason}"),
            Self::Corrupt { reason } => write!(f, "stored workflow is corrupt: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}
