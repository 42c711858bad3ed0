//! Versioned wire types for the graph data contract.
//!
//! The response shape is schema v1 and is consumed by visualization front
//! ends (scatter-plot and network-graph UIs). Changes to these types are
//! contract changes: additive fields must be optional and skipped when
//! absent so the v1 shape stays stable byte-for-byte in the common case.
//!
//! # Security
//!
//! No type in this module carries a raw embedding vector. Payloads are
//! assembled exclusively from these types, which makes "embeddings never
//! leave the service" a type-level guarantee rather than a filtering step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current graph payload schema version
pub const GRAPH_SCHEMA_VERSION: u32 = 1;

/// Server-enforced hard cap on `max_nodes`
pub const MAX_NODES_HARD_CAP: usize = 2000;

/// Typed relationship between two chunk nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    /// Nearest neighbor by similarity in the source embedding space
    Knn,
    /// Shared extracted entity above the co-occurrence threshold
    Entity,
    /// Same named structural anchor within the same document
    Anchor,
}

impl RelationType {
    /// All relation types, in canonical order.
    pub const ALL: [RelationType; 3] =
        [RelationType::Knn, RelationType::Entity, RelationType::Anchor];

    /// Canonical lowercase name, as serialized on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Knn => "knn",
            RelationType::Entity => "entity",
            RelationType::Anchor => "anchor",
        }
    }

    /// Parse a wire name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "knn" => Some(RelationType::Knn),
            "entity" => Some(RelationType::Entity),
            "anchor" => Some(RelationType::Anchor),
            _ => None,
        }
    }

    /// The default relation set: all types.
    pub fn all_set() -> BTreeSet<RelationType> {
        RelationType::ALL.iter().copied().collect()
    }
}

/// A single chunk node in the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkNode {
    /// Unique chunk id within the payload
    pub id: String,
    /// Human-readable label, e.g. "file.md:45-67"
    pub label: String,
    /// Named structural anchor (e.g. "tldr"), if any
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub anchor: Option<String>,
    /// 2D projected coordinates; both components are always finite
    pub coords: [f64; 2],
    /// Category tag, e.g. "code" or "prose"
    pub category: String,
}

/// A typed edge between two nodes of the same payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node id (must exist in `nodes`)
    pub source: String,
    /// Target node id (must exist in `nodes`, never equal to `source`)
    pub target: String,
    /// Relationship type
    #[serde(rename = "type")]
    pub kind: RelationType,
    /// Normalized strength in [0, 1]
    pub weight: f64,
}

/// The versioned graph payload returned for every successful request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    /// Ordered node list (ascending id)
    pub nodes: Vec<ChunkNode>,
    /// Edge list in deterministic (source, target, type) order
    pub edges: Vec<Edge>,
    /// Wall-clock time spent serving the request
    pub elapsed_ms: u64,
    /// Schema version, currently 1
    pub v: u32,
    /// Whether the node set was truncated to `max_nodes`
    pub truncated: bool,
    /// Relation types dropped because a non-essential collaborator was
    /// unavailable (e.g. `["entity"]`). Absent when nothing degraded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub degraded: Option<Vec<String>>,
}

impl GraphPayload {
    /// An empty payload (empty corpus or empty filter match).
    pub fn empty(elapsed_ms: u64) -> Self {
        GraphPayload {
            nodes: Vec::new(),
            edges: Vec::new(),
            elapsed_ms,
            v: GRAPH_SCHEMA_VERSION,
            truncated: false,
            degraded: None,
        }
    }

    /// Check the structural invariants of a payload.
    ///
    /// Returns the first violation found. Used by the test suite; the
    /// service constructs payloads that satisfy these by construction.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut ids = BTreeSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(format!("duplicate node id: {}", node.id));
            }
            if !node.coords[0].is_finite() || !node.coords[1].is_finite() {
                return Err(format!("non-finite coords for node {}", node.id));
            }
        }

        let mut triples = BTreeSet::new();
        for edge in &self.edges {
            if edge.source == edge.target {
                return Err(format!("self-loop on node {}", edge.source));
            }
            if !ids.contains(edge.source.as_str()) {
                return Err(format!("edge source not in nodes: {}", edge.source));
            }
            if !ids.contains(edge.target.as_str()) {
                return Err(format!("edge target not in nodes: {}", edge.target));
            }
            if !(0.0..=1.0).contains(&edge.weight) {
                return Err(format!(
                    "edge weight out of [0,1]: {} -> {} = {}",
                    edge.source, edge.target, edge.weight
                ));
            }
            if !triples.insert((edge.source.as_str(), edge.target.as_str(), edge.kind)) {
                return Err(format!(
                    "duplicate edge triple: ({}, {}, {})",
                    edge.source,
                    edge.target,
                    edge.kind.as_str()
                ));
            }
        }

        Ok(())
    }
}

/// A validated-eagerly request for graph data.
///
/// This replaces loose parameter dicts with a structured type enumerating
/// exactly the accepted parameters. Validation lives in
/// [`crate::validation::validate_request`] and runs before any other work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRequest {
    /// Restrict nodes to chunks of these documents
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub document_filter: Option<Vec<String>>,
    /// Relation types to compute; defaults to all
    #[serde(default = "RelationType::all_set")]
    pub relation_types: BTreeSet<RelationType>,
    /// Maximum node count; positive, capped at [`MAX_NODES_HARD_CAP`]
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Restrict nodes to chunks carrying this anchor
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub anchor_filter: Option<String>,
}

fn default_max_nodes() -> usize {
    MAX_NODES_HARD_CAP
}

impl Default for GraphRequest {
    fn default() -> Self {
        GraphRequest {
            document_filter: None,
            relation_types: RelationType::all_set(),
            max_nodes: MAX_NODES_HARD_CAP,
            anchor_filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_type_wire_names_round_trip() {
        for rt in RelationType::ALL {
            assert_eq!(RelationType::parse(rt.as_str()), Some(rt));
            let json = serde_json::to_string(&rt).unwrap();
            assert_eq!(json, format!("\"{}\"", rt.as_str()));
        }
        assert_eq!(RelationType::parse("KNN"), None);
        assert_eq!(RelationType::parse("semantic"), None);
    }

    #[test]
    fn test_payload_serializes_to_v1_shape() {
        let payload = GraphPayload {
            nodes: vec![ChunkNode {
                id: "chunk_123".into(),
                label: "file.md:45-67".into(),
                anchor: Some("tldr".into()),
                coords: [0.12, -0.87],
                category: "code".into(),
            }],
            edges: vec![Edge {
                source: "chunk_123".into(),
                target: "chunk_456".into(),
                kind: RelationType::Knn,
                weight: 0.85,
            }],
            elapsed_ms: 145,
            v: GRAPH_SCHEMA_VERSION,
            truncated: false,
            degraded: None,
        };

        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["v"], 1);
        assert_eq!(json["truncated"], false);
        assert_eq!(json["nodes"][0]["id"], "chunk_123");
        assert_eq!(json["nodes"][0]["coords"][1], -0.87);
        assert_eq!(json["edges"][0]["type"], "knn");
        // degraded is skipped entirely when absent (exact v1 shape)
        assert!(json.get("degraded").is_none());
    }

    #[test]
    fn test_invariant_check_flags_violations() {
        let node = |id: &str| ChunkNode {
            id: id.into(),
            label: id.into(),
            anchor: None,
            coords: [0.0, 0.0],
            category: "prose".into(),
        };

        let mut payload = GraphPayload::empty(0);
        payload.nodes = vec![node("a"), node("a")];
        assert!(payload.check_invariants().unwrap_err().contains("duplicate node id"));

        let mut payload = GraphPayload::empty(0);
        payload.nodes = vec![node("a"), node("b")];
        payload.edges = vec![Edge {
            source: "a".into(),
            target: "a".into(),
            kind: RelationType::Anchor,
            weight: 1.0,
        }];
        assert!(payload.check_invariants().unwrap_err().contains("self-loop"));

        let mut payload = GraphPayload::empty(0);
        payload.nodes = vec![node("a"), node("b")];
        payload.edges = vec![Edge {
            source: "a".into(),
            target: "c".into(),
            kind: RelationType::Knn,
            weight: 0.5,
        }];
        assert!(payload.check_invariants().unwrap_err().contains("not in nodes"));
    }

    #[test]
    fn test_request_defaults() {
        let req = GraphRequest::default();
        assert_eq!(req.max_nodes, MAX_NODES_HARD_CAP);
        assert_eq!(req.relation_types.len(), 3);
        assert!(req.document_filter.is_none());
        assert!(req.anchor_filter.is_none());
    }
}
