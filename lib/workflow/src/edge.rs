//! Edge types for workflow graphs.
//!
//! Edges are directed connections authored in the editor. Branch selection
//! is encoded on the edge itself: `source_handle` carries the condition
//! branch (`"yes"`/`"no"`) or the button/list option id, and `label` carries
//! the human-readable caption.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    /// Creates an unlabeled edge.
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            label: None,
        }
    }

    /// Sets the source handle.
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns true if the source handle equals `handle` exactly.
    #[must_use]
    pub fn has_handle(&self, handle: &str) -> bool {
        self.source_handle.as_deref() == Some(handle)
    }

    /// Returns true if the label equals `label`, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.label
            .as_deref()
            .is_some_and(|own| own.trim().eq_ignore_ascii_case(label.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_editor_field_names() {
        let edge: Edge = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "source": "check",
            "target": "send-yes",
            "sourceHandle": "yes"
        }))
        .expect("deserialize");

        assert_eq!(edge.source, NodeId::from("check"));
        assert!(edge.has_handle("yes"));
        assert!(!edge.has_handle("no"));
        assert_eq!(edge.label, None);
    }

    #[test]
    fn label_match_ignores_case() {
        let edge = Edge::new("e1", "a", "b").with_label("  Talk to Sales ");
        assert!(edge.has_label("talk to sales"));
        assert!(!edge.has_label("support"));
    }
}
