//! Knowledge graph data model.
//!
//! The graph stores facts as labelled, directed edges between labelled nodes:
//!
//! - [`Node`]: an entity, identified by a [`NodeId`] and named by its label
//! - [`Predicate`]: a relation from one node to another, named by its label
//! - [`Triple`]: the label-level view `(subject, predicate, object)` of a predicate
//!
//! The in-memory store lives in [`index`], the lookups built on it in [`query`].
//! Both accept any value with the [`GraphNode`] / [`GraphEdge`] capabilities and
//! normalize it to the native records on insertion.

pub mod index;
pub mod query;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Opaque node identifier, unique within one graph instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(i64);

impl NodeId {
    pub fn new(raw: i64) -> Self {
        NodeId(raw)
    }

    /// Get the underlying `i64` value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Anything that can identify a node.
///
/// Values that only know their ID report an empty label.
pub trait GraphNode {
    fn id(&self) -> NodeId;

    fn label(&self) -> &str {
        ""
    }
}

/// Anything with a source and a target node.
///
/// The store only keeps the endpoint IDs, the edge label, and (for endpoints
/// it has not seen yet) the endpoint labels.
pub trait GraphEdge {
    type Node: GraphNode;

    fn from(&self) -> &Self::Node;

    fn to(&self) -> &Self::Node;

    fn label(&self) -> &str {
        ""
    }
}

impl GraphNode for NodeId {
    fn id(&self) -> NodeId {
        *self
    }
}

/// A graph vertex: one entity of the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Human-readable entity name. Unlabelled nodes are invisible to label queries.
    pub label: String,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

impl GraphNode for Node {
    fn id(&self) -> NodeId {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// A directed, labelled edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub from: NodeId,
    pub to: NodeId,
    /// The relation name, e.g. `worksFor`.
    pub label: String,
}

impl Predicate {
    pub fn new(from: NodeId, to: NodeId, label: impl Into<String>) -> Self {
        Self {
            from,
            to,
            label: label.into(),
        }
    }

    /// The same edge pointing the other way. The label is not carried over.
    pub fn reversed(&self) -> Predicate {
        Predicate {
            from: self.to,
            to: self.from,
            label: String::new(),
        }
    }
}

impl GraphEdge for Predicate {
    type Node = NodeId;

    fn from(&self) -> &NodeId {
        &self.from
    }

    fn to(&self) -> &NodeId {
        &self.to
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// A `(subject, predicate, object)` fact expressed with labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

/// Compare two labels, optionally ignoring case.
///
/// Case-insensitive comparison applies Unicode simple case folding to each
/// character, so `ς`, `σ` and `Σ` match, as do `ſ`, `s` and `S`. Folding is
/// one character to one character: `ß` does not match `ss`. The locale is
/// never consulted, so `İ` folds only to itself.
pub fn labels_match(value: &str, pattern: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        return value == pattern;
    }
    if value.len() == pattern.len() && value.eq_ignore_ascii_case(pattern) {
        return true;
    }
    value.chars().map(fold_char).eq(pattern.chars().map(fold_char))
}

/// Simple case fold of one character.
///
/// The single-character lowercase mapping, then the folds where lowercase
/// leaves a character that still has a case variant.
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    let lowered = match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    };
    match lowered {
        '\u{00B5}' => '\u{03BC}',
        '\u{017F}' => 's',
        '\u{0345}' | '\u{1FBE}' => '\u{03B9}',
        '\u{03C2}' => '\u{03C3}',
        '\u{03D0}' => '\u{03B2}',
        '\u{03D1}' => '\u{03B8}',
        '\u{03D5}' => '\u{03C6}',
        '\u{03D6}' => '\u{03C0}',
        '\u{03F0}' => '\u{03BA}',
        '\u{03F1}' => '\u{03C1}',
        '\u{03F5}' => '\u{03B5}',
        '\u{1C80}' => '\u{0432}',
        '\u{1C81}' => '\u{0434}',
        '\u{1C82}' => '\u{043E}',
        '\u{1C83}' => '\u{0441}',
        '\u{1C84}' | '\u{1C85}' => '\u{0442}',
        '\u{1C86}' => '\u{044A}',
        '\u{1C87}' => '\u{0463}',
        '\u{1C88}' => '\u{A64B}',
        '\u{1E9B}' => '\u{1E61}',
        other => other,
    }
}

/// Like [`labels_match`], but an empty pattern matches everything.
pub(crate) fn matches_pattern(value: &str, pattern: &str, case_sensitive: bool) -> bool {
    pattern.is_empty() || labels_match(value, pattern, case_sensitive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_swaps_endpoints_and_drops_label() {
        let pred = Predicate::new(NodeId::new(1), NodeId::new(2), "knows");
        let rev = pred.reversed();
        assert_eq!(rev.from, NodeId::new(2));
        assert_eq!(rev.to, NodeId::new(1));
        assert!(rev.label.is_empty());
    }

    #[test]
    fn case_insensitive_ascii() {
        assert!(labels_match("Paris", "PARIS", false));
        assert!(!labels_match("Paris", "PARIS", true));
        assert!(labels_match("Paris", "Paris", true));
    }

    #[test]
    fn case_insensitive_unicode() {
        assert!(labels_match("ÉCOLE", "école", false));
        assert!(labels_match("Straße", "STRAßE", false));
        assert!(!labels_match("Paris", "Pari", false));
    }

    #[test]
    fn case_insensitive_uses_simple_folding() {
        // Final sigma and long s fold onto their ordinary forms.
        assert!(labels_match("ΟΔΟΣ", "οδος", false));
        assert!(labels_match("ΟΔΟΣ", "οδοσ", false));
        assert!(labels_match("οδος", "οδοσ", false));
        assert!(labels_match("ſ", "S", false));
        assert!(labels_match("ſ", "s", false));
        // Micro sign and Greek mu.
        assert!(labels_match("\u{00B5}", "\u{039C}", false));
        assert!(labels_match("\u{00B5}", "\u{03BC}", false));
        // Kelvin sign.
        assert!(labels_match("\u{212A}", "k", false));
        assert!(!labels_match("οδος", "οδοσ", true));
    }

    #[test]
    fn folding_maps_one_char_to_one_char() {
        assert!(!labels_match("Straße", "STRASSE", false));
        // Dotted capital I folds to itself, without a locale.
        assert!(!labels_match("\u{0130}", "i", false));
        assert!(!labels_match("\u{0130}", "I", false));
        assert!(labels_match("\u{0130}", "\u{0130}", false));
    }

    #[test]
    fn empty_pattern_is_wildcard() {
        assert!(matches_pattern("anything", "", true));
        assert!(matches_pattern("anything", "", false));
        assert!(!matches_pattern("anything", "other", false));
    }

    #[test]
    fn node_id_display() {
        assert_eq!(NodeId::new(42).to_string(), "node:42");
    }

    #[test]
    fn triple_display() {
        let t = Triple::new("Paris", "is_capital_of", "France");
        assert_eq!(t.to_string(), "(Paris, is_capital_of, France)");
    }
}
