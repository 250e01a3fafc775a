//! Wire formats for a whole knowledge graph.
//!
//! The graph is flattened into a pointer-free record before encoding:
//!
//! ```text
//! { nodes: { id -> { id, label } }, edges: [ { fromID, toID, label } ], currentID }
//! ```
//!
//! The binary profile writes that record with bincode, the textual profile
//! with serde_json. The payloads are structurally identical but a file must be
//! read back with the profile that wrote it.
//!
//! Bincode output is not self-describing: a reader must use the same record
//! layout and the same bincode options. Adding, removing or reordering a
//! field of the record makes older binary files unreadable, so such a change
//! needs a new profile. Both codecs reject bytes left over after the record.

use std::collections::BTreeMap;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::graph::index::{GraphInner, KnowledgeGraph};
use crate::graph::{Node, NodeId, Predicate};

use super::StoreResult;

/// One edge of the flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SerializedEdge {
    #[serde(rename = "fromID")]
    from_id: NodeId,
    #[serde(rename = "toID")]
    to_id: NodeId,
    label: String,
}

/// The flat, persisted form of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SerializedGraph {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<SerializedEdge>,
    #[serde(rename = "currentID")]
    current_id: i64,
}

impl SerializedGraph {
    fn flatten(inner: &GraphInner) -> Self {
        Self {
            nodes: inner.nodes.clone(),
            edges: inner
                .edges()
                .map(|p| SerializedEdge {
                    from_id: p.from,
                    to_id: p.to,
                    label: p.label.clone(),
                })
                .collect(),
            current_id: inner.current_id,
        }
    }

    /// Rebuild both adjacency maps. Edges whose endpoints are missing from
    /// the node map are dropped.
    fn restore(self) -> KnowledgeGraph {
        let mut inner = GraphInner {
            current_id: self.current_id,
            ..GraphInner::default()
        };
        for (id, mut node) in self.nodes {
            node.id = id;
            inner.insert_node(node);
        }
        if inner.current_id != self.current_id {
            tracing::warn!(
                stored = self.current_id,
                adjusted = inner.current_id,
                "stored ID counter was behind the node IDs, moved it forward"
            );
        }

        let total = self.edges.len();
        let mut skipped = 0usize;
        for edge in self.edges {
            if !inner.nodes.contains_key(&edge.from_id) || !inner.nodes.contains_key(&edge.to_id) {
                skipped += 1;
                continue;
            }
            inner.link(Predicate::new(edge.from_id, edge.to_id, edge.label));
        }
        if skipped > 0 {
            tracing::warn!(skipped, total, "dropped edges with unknown endpoints while decoding");
        }
        KnowledgeGraph::from_inner(inner)
    }
}

/// Bincode settings used in both directions.
///
/// Fixed-width little-endian integers, the layout `bincode::serialize`
/// writes. Trailing bytes after the record fail the decode.
fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Which wire format a graph file uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecProfile {
    /// Compact bincode encoding.
    #[default]
    Binary,
    /// Pretty-printed JSON with the field names of the flat record.
    Json,
}

impl CodecProfile {
    /// Encode a graph into a byte buffer.
    pub fn encode(self, graph: &KnowledgeGraph) -> StoreResult<Vec<u8>> {
        let flat = SerializedGraph::flatten(&graph.read());
        let encoded = match self {
            CodecProfile::Binary => bincode_options()
                .serialize(&flat)
                .map_err(|e| e.to_string()),
            CodecProfile::Json => serde_json::to_vec_pretty(&flat).map_err(|e| e.to_string()),
        };
        encoded.map_err(|message| StoreError::Encode { message })
    }

    /// Decode a graph from bytes.
    ///
    /// Returns [`StoreError::EmptyInput`] when there is nothing to decode
    /// (for the json profile, whitespace counts as nothing) and
    /// [`StoreError::Decode`] when the data is malformed or followed by
    /// trailing bytes.
    pub fn decode(self, bytes: &[u8]) -> StoreResult<KnowledgeGraph> {
        let empty = match self {
            CodecProfile::Binary => bytes.is_empty(),
            CodecProfile::Json => bytes.iter().all(u8::is_ascii_whitespace),
        };
        if empty {
            return Err(StoreError::EmptyInput);
        }
        let flat: SerializedGraph = match self {
            CodecProfile::Binary => bincode_options()
                .deserialize(bytes)
                .map_err(|e| e.to_string()),
            CodecProfile::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
        }
        .map_err(|message| StoreError::Decode { message })?;
        Ok(flat.restore())
    }
}

impl std::fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecProfile::Binary => write!(f, "binary"),
            CodecProfile::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for CodecProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" | "bincode" => Ok(CodecProfile::Binary),
            "json" | "text" => Ok(CodecProfile::Json),
            other => Err(format!("unknown codec \"{other}\", expected \"binary\" or \"json\"")),
        }
    }
}
