//! Workflow Domain Model
//!
//! This module defines the core domain entities for the workflow graph.
//! A workflow is a persisted, acyclic directed graph of nodes (triggers,
//! actions, logic) connected by edges that may carry a branch handle.
//!
//! # Design Principles
//!
//! 1. **Self-Validating:** `Workflow::new` enforces graph invariants
//! 2. **Type Safety:** node categories and workflow status are closed enums
//! 3. **Wire Compatibility:** nodes/edges serialize camelCase, matching the
//!    graph editor's document format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

// ============================================================================
// Value Objects: Identifiers
// ============================================================================

/// Unique identifier for a Workflow definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Entities: Nodes and Edges
// ============================================================================

/// Node category. Determines where the node may sit in a graph and how the
/// editor renders it; the runtime treats all three uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Trigger,
    Action,
    Logic,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Trigger => write!(f, "trigger"),
            NodeKind::Action => write!(f, "action"),
            NodeKind::Logic => write!(f, "logic"),
        }
    }
}

/// Canvas position, kept verbatim for the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single step in the workflow graph.
///
/// `subtype` keys a registered integration; `config` is that integration's
/// opaque configuration map, hydrated with expressions at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub subtype: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub position: Position,
}

/// Directed connector between two nodes.
///
/// `source_handle` carries the branch label (`"true"` / `"false"`) when the
/// source is a branch node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

/// Workflow lifecycle status (editor-facing; inactive workflows are kept but
/// not offered for triggering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Active,
    Inactive,
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::Active
    }
}

// ============================================================================
// Aggregate Root: Workflow
// ============================================================================

/// Workflow Aggregate Root
///
/// # Invariants
/// - Node ids are unique
/// - Every edge's source and target reference existing nodes
/// - No self-loops, no duplicate parallel edges
/// - The graph is acyclic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new Workflow with validation
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, WorkflowError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WorkflowError::InvalidName("Workflow name cannot be empty".to_string()));
        }

        validate_graph(&nodes, &edges)?;

        let now = Utc::now();
        Ok(Self {
            id: WorkflowId::new(),
            name,
            nodes,
            edges,
            status: WorkflowStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the graph and bump `updated_at`.
    pub fn update(&mut self, name: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<(), WorkflowError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WorkflowError::InvalidName("Workflow name cannot be empty".to_string()));
        }
        validate_graph(&nodes, &edges)?;

        self.name = name;
        self.nodes = nodes;
        self.edges = edges;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Kahn topological order over the node ids. See [`topological_order`].
    pub fn topological_order(&self) -> Vec<String> {
        topological_order(&self.nodes, &self.edges)
    }

    /// True iff the topological order covers every node.
    pub fn is_acyclic(&self) -> bool {
        self.topological_order().len() == self.nodes.len()
    }
}

/// Kahn topological order over a node/edge list.
///
/// Zero-in-degree nodes are seeded in the insertion order of `nodes`, and the
/// worklist is FIFO, so the order is stable and reproducible. A result shorter
/// than `nodes.len()` means the graph contains a cycle. Edges referencing
/// unknown nodes are ignored, so the order is total even for legacy graphs.
pub fn topological_order(nodes: &[Node], edges: &[Edge]) -> Vec<String> {
    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in edges {
        if !in_degree.contains_key(edge.source.as_str()) || !in_degree.contains_key(edge.target.as_str()) {
            continue;
        }
        adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        if let Some(d) = in_degree.get_mut(edge.target.as_str()) {
            *d += 1;
        }
    }

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .filter(|n| in_degree[n.id.as_str()] == 0)
        .map(|n| n.id.as_str())
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());
        if let Some(targets) = adjacency.get(node_id) {
            for &target in targets {
                let d = in_degree.get_mut(target).expect("edge endpoints filtered above");
                *d -= 1;
                if *d == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    order
}

/// Validate structural graph invariants (everything except acyclicity, which
/// the engine re-checks at execution time so stored legacy graphs still get a
/// recorded failure instead of a rejected update).
fn validate_graph(nodes: &[Node], edges: &[Edge]) -> Result<(), WorkflowError> {
    let mut ids = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
        }
    }

    let mut seen_pairs = HashSet::with_capacity(edges.len());
    for edge in edges {
        if edge.source == edge.target {
            return Err(WorkflowError::SelfLoop(edge.id.clone()));
        }
        if !ids.contains(edge.source.as_str()) {
            return Err(WorkflowError::DanglingEdge {
                edge: edge.id.clone(),
                node: edge.source.clone(),
            });
        }
        if !ids.contains(edge.target.as_str()) {
            return Err(WorkflowError::DanglingEdge {
                edge: edge.id.clone(),
                node: edge.target.clone(),
            });
        }
        let key = (
            edge.source.as_str(),
            edge.target.as_str(),
            edge.source_handle.as_deref().unwrap_or(""),
        );
        if !seen_pairs.insert(key) {
            return Err(WorkflowError::DuplicateEdge {
                source_node: edge.source.clone(),
                target: edge.target.clone(),
            });
        }
    }

    Ok(())
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid workflow name: {0}")]
    InvalidName(String),

    #[error("Duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("Edge '{edge}' references unknown node '{node}'")]
    DanglingEdge { edge: String, node: String },

    #[error("Edge '{0}' connects a node to itself")]
    SelfLoop(String),

    #[error("Duplicate edge from '{source_node}' to '{target}'")]
    DuplicateEdge { source_node: String, target: String },

    #[error("Workflow contains cycles")]
    CyclicGraph,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Action,
            subtype: "set_variable".to_string(),
            config: serde_json::json!({}),
            position: Position::default(),
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: None,
        }
    }

    #[test]
    fn test_workflow_id_unique() {
        assert_ne!(WorkflowId::new(), WorkflowId::new());
    }

    #[test]
    fn test_new_workflow_defaults_active() {
        let wf = Workflow::new("greet", vec![node("a")], vec![]).unwrap();
        assert_eq!(wf.status, WorkflowStatus::Active);
        assert_eq!(wf.created_at, wf.updated_at);
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Workflow::new("  ", vec![node("a")], vec![]).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidName(_)));
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let err = Workflow::new("wf", vec![node("a"), node("a")], vec![]).unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateNodeId(_)));
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let err = Workflow::new("wf", vec![node("a")], vec![edge("e1", "a", "ghost")]).unwrap_err();
        assert!(matches!(err, WorkflowError::DanglingEdge { .. }));
    }

    #[test]
    fn test_self_loop_rejected() {
        let err = Workflow::new("wf", vec![node("a")], vec![edge("e1", "a", "a")]).unwrap_err();
        assert!(matches!(err, WorkflowError::SelfLoop(_)));
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let err = Workflow::new(
            "wf",
            vec![node("a"), node("b")],
            vec![edge("e1", "a", "b"), edge("e2", "a", "b")],
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateEdge { .. }));
    }

    #[test]
    fn test_parallel_edges_with_distinct_handles_allowed() {
        let mut t = edge("e1", "a", "b");
        t.source_handle = Some("true".to_string());
        let mut f = edge("e2", "a", "b");
        f.source_handle = Some("false".to_string());
        assert!(Workflow::new("wf", vec![node("a"), node("b")], vec![t, f]).is_ok());
    }

    // ── Topological order ─────────────────────────────────────────────────────

    #[test]
    fn test_topological_order_linear() {
        let wf = Workflow::new(
            "wf",
            vec![node("a"), node("b"), node("c")],
            vec![edge("e1", "a", "b"), edge("e2", "b", "c")],
        )
        .unwrap();
        assert_eq!(wf.topological_order(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_topological_order_respects_every_edge() {
        let wf = Workflow::new(
            "wf",
            vec![node("d"), node("b"), node("a"), node("c")],
            vec![edge("e1", "a", "b"), edge("e2", "a", "c"), edge("e3", "b", "d"), edge("e4", "c", "d")],
        )
        .unwrap();
        let order = wf.topological_order();
        assert_eq!(order.len(), 4);
        let index = |id: &str| order.iter().position(|n| n == id).unwrap();
        for (u, v) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")] {
            assert!(index(u) < index(v), "{u} must precede {v}");
        }
    }

    #[test]
    fn test_topological_order_ties_broken_by_insertion_order() {
        let wf = Workflow::new(
            "wf",
            vec![node("first"), node("second"), node("third")],
            vec![],
        )
        .unwrap();
        assert_eq!(wf.topological_order(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_cycle_detected_by_short_order() {
        // Structural validation allows the cycle; ordering exposes it.
        let mut wf = Workflow::new("wf", vec![node("a"), node("b")], vec![edge("e1", "a", "b")]).unwrap();
        wf.edges.push(edge("e2", "b", "a"));
        assert!(!wf.is_acyclic());
        assert!(wf.topological_order().len() < wf.nodes.len());
    }

    #[test]
    fn test_update_bumps_updated_at() {
        let mut wf = Workflow::new("wf", vec![node("a")], vec![]).unwrap();
        let before = wf.updated_at;
        wf.update("renamed", vec![node("a"), node("b")], vec![edge("e1", "a", "b")]).unwrap();
        assert_eq!(wf.name, "renamed");
        assert!(wf.updated_at >= before);
        assert_eq!(wf.nodes.len(), 2);
    }

    #[test]
    fn test_node_serialization_uses_editor_field_names() {
        let n = node("a");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "action");
        assert!(json.get("subtype").is_some());
    }

    #[test]
    fn test_edge_source_handle_camel_case() {
        let mut e = edge("e1", "a", "b");
        e.source_handle = Some("true".to_string());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["sourceHandle"], "true");
    }
}
