//! Workflow graph implementation using petgraph.
//!
//! The graph is loaded from the editor document `{nodes, edges}` and never
//! changes afterwards. Loading is lenient: duplicate node IDs and edges that
//! point at unknown nodes are dropped with a warning instead of failing the
//! whole workflow, because authored graphs are not validated ahead of time.
//!
//! Outgoing edges are always reported in authored order, which is what
//! "first outgoing edge" means throughout the engine.

use crate::edge::Edge;
use crate::error::GraphError;
use crate::node::{Node, NodeId, NodeKind};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "GraphDocument", into = "GraphDocument")]
pub struct WorkflowGraph {
    graph: DiGraph<Node, Edge>,
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateNode`] if a node with the same ID exists.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.node_index_map.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode { node_id: node.id });
        }
        let node_id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id.clone(), index);
        Ok(node_id)
    }

    /// Adds an edge between two existing nodes.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if either endpoint is missing.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        let source = self.index_of(&edge.source)?;
        let target = self.index_of(&edge.target)?;
        self.graph.add_edge(source, target, edge);
        Ok(())
    }

    fn index_of(&self, node_id: &NodeId) -> Result<NodeIndex, GraphError> {
        self.node_index_map
            .get(node_id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound {
                node_id: node_id.clone(),
            })
    }

    /// Returns a node by its ID.
    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all nodes in authored order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns all edges in authored order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns every trigger node in authored order.
    ///
    /// A well-formed graph has exactly one.
    #[must_use]
    pub fn trigger_nodes(&self) -> Vec<&Node> {
        self.nodes()
            .filter(|node| node.kind() == NodeKind::Trigger)
            .collect()
    }

    /// Returns the outgoing edges of a node in authored order.
    ///
    /// Unknown nodes have no outgoing edges.
    #[must_use]
    pub fn outgoing(&self, node_id: &NodeId) -> Vec<&Edge> {
        let Some(&index) = self.node_index_map.get(node_id) else {
            return Vec::new();
        };

        // petgraph walks adjacency lists newest-first.
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.weight()))
            .collect();
        edges.sort_by_key(|(edge_index, _)| *edge_index);
        edges.into_iter().map(|(_, edge)| edge).collect()
    }

    /// Returns the first outgoing edge of a node, if any.
    #[must_use]
    pub fn first_outgoing(&self, node_id: &NodeId) -> Option<&Edge> {
        self.outgoing(node_id).into_iter().next()
    }
}

/// Editor representation of a graph.
#[derive(Serialize, Deserialize)]
struct GraphDocument {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

impl From<GraphDocument> for WorkflowGraph {
    fn from(doc: GraphDocument) -> Self {
        let mut graph = Self::new();

        for node in doc.nodes {
            if let Err(e) = graph.add_node(node) {
                warn!(error = %e, "Skipping node while loading workflow graph");
            }
        }

        for edge in doc.edges {
            let edge_id = edge.id.clone();
            if let Err(e) = graph.add_edge(edge) {
                warn!(edge_id = %edge_id, error = %e, "Skipping dangling edge while loading workflow graph");
            }
        }

        graph
    }
}

impl From<WorkflowGraph> for GraphDocument {
    fn from(graph: WorkflowGraph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().cloned().collect(),
        }
    }
}
