//! Label-level queries and triple mutations.
//!
//! Lookups are linear scans over nodes or edges. Maps iterate in ID order, so
//! when several nodes share a label the first one created wins.
//!
//! [`TripleQuery`] is implemented for [`KnowledgeGraph`] and for
//! `Option<&G>`: a missing graph answers every query like an empty one.

use std::collections::{BTreeMap, BTreeSet};

use super::index::{GraphInner, KnowledgeGraph};
use super::{GraphResult, Node, NodeId, Predicate, Triple, labels_match, matches_pattern};

/// Read-only lookups over a knowledge graph.
pub trait TripleQuery {
    /// First labelled node whose label matches.
    fn find_node(&self, label: &str, case_sensitive: bool) -> Option<Node>;

    /// First labelled predicate whose label matches.
    fn find_predicate(&self, label: &str, case_sensitive: bool) -> Option<Predicate>;

    /// Labels of all labelled nodes.
    fn list_nodes(&self) -> Vec<String>;

    /// Distinct predicate labels.
    fn list_all_predicates(&self) -> BTreeSet<String>;

    /// Outgoing predicates of a node; `None` if no node has this label.
    fn list_predicates_from_node(&self, label: &str, case_sensitive: bool) -> Option<Vec<Predicate>>;

    /// Incoming predicates of a node; `None` if no node has this label.
    fn list_predicates_to_node(&self, label: &str, case_sensitive: bool) -> Option<Vec<Predicate>>;

    /// The predicate joining two nodes, as a one-element list.
    ///
    /// `None` if either node is missing or no edge points from `from` to `to`.
    fn predicates_from_to(
        &self,
        from: &str,
        to: &str,
        case_sensitive: bool,
    ) -> Option<Vec<Predicate>>;

    /// Predicate label → object labels for every edge leaving `subject`.
    fn query_by_subject(
        &self,
        subject: &str,
        case_sensitive: bool,
    ) -> Option<BTreeMap<String, Vec<String>>>;

    /// Predicate label → subject labels for every edge reaching `object`.
    fn query_by_object(
        &self,
        object: &str,
        case_sensitive: bool,
    ) -> Option<BTreeMap<String, Vec<String>>>;

    /// `(subject, object)` pairs joined by `predicate`; `None` if no edge
    /// carries that label.
    fn query_by_predicate(
        &self,
        predicate: &str,
        case_sensitive: bool,
    ) -> Option<Vec<(String, String)>>;

    /// Triples matching all three filters. An empty filter matches anything.
    fn find_triples(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> Vec<Triple>;

    /// Triples where `entity` is the subject or the object.
    fn describe_entity(&self, entity: &str, case_sensitive: bool) -> Vec<Triple>;

    /// Every triple in the graph.
    fn triples(&self) -> Vec<Triple> {
        self.find_triples("", "", "", true)
    }
}

impl GraphInner {
    pub(crate) fn find_node(&self, label: &str, case_sensitive: bool) -> Option<&Node> {
        self.nodes
            .values()
            .filter(|n| !n.label.is_empty())
            .find(|n| labels_match(&n.label, label, case_sensitive))
    }

    fn find_predicate(&self, label: &str, case_sensitive: bool) -> Option<&Predicate> {
        self.edges()
            .map(|p| &**p)
            .filter(|p| !p.label.is_empty())
            .find(|p| labels_match(&p.label, label, case_sensitive))
    }

    fn label_of(&self, id: NodeId) -> Option<&str> {
        self.nodes
            .get(&id)
            .map(|n| n.label.as_str())
            .filter(|l| !l.is_empty())
    }

    /// The label-level triple of a predicate, skipping unlabelled parts.
    fn triple_of(&self, predicate: &Predicate) -> Option<Triple> {
        if predicate.label.is_empty() {
            return None;
        }
        let subject = self.label_of(predicate.from)?;
        let object = self.label_of(predicate.to)?;
        Some(Triple::new(subject, predicate.label.as_str(), object))
    }

    fn adjacent(
        &self,
        outgoing: bool,
        label: &str,
        case_sensitive: bool,
    ) -> Option<Vec<Predicate>> {
        let node = self.find_node(label, case_sensitive)?;
        let adjacency = if outgoing { &self.from } else { &self.to };
        Some(
            adjacency
                .get(&node.id)
                .map(|peers| peers.values().map(|p| Predicate::clone(p)).collect())
                .unwrap_or_default(),
        )
    }

    fn grouped_peers(
        &self,
        outgoing: bool,
        label: &str,
        case_sensitive: bool,
    ) -> Option<BTreeMap<String, Vec<String>>> {
        let node = self.find_node(label, case_sensitive)?;
        let adjacency = if outgoing { &self.from } else { &self.to };
        let mut result: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (peer, predicate) in adjacency.get(&node.id).into_iter().flatten() {
            if predicate.label.is_empty() {
                continue;
            }
            if let Some(peer_label) = self.label_of(*peer) {
                result
                    .entry(predicate.label.clone())
                    .or_default()
                    .push(peer_label.to_string());
            }
        }
        Some(result)
    }

    fn predicates_from_to(
        &self,
        from: &str,
        to: &str,
        case_sensitive: bool,
    ) -> Option<Vec<Predicate>> {
        let from = self.find_node(from, case_sensitive)?.id;
        let to = self.find_node(to, case_sensitive)?.id;
        self.edge(from, to).map(|p| vec![Predicate::clone(p)])
    }

    fn query_by_predicate(
        &self,
        predicate: &str,
        case_sensitive: bool,
    ) -> Option<Vec<(String, String)>> {
        let mut found = false;
        let mut pairs = Vec::new();
        for edge in self.edges() {
            if edge.label.is_empty() || !labels_match(&edge.label, predicate, case_sensitive) {
                continue;
            }
            found = true;
            if let (Some(s), Some(o)) = (self.label_of(edge.from), self.label_of(edge.to)) {
                pairs.push((s.to_string(), o.to_string()));
            }
        }
        found.then_some(pairs)
    }

    fn scan_triples(&self, keep: impl Fn(&Triple) -> bool) -> Vec<Triple> {
        self.edges()
            .filter_map(|p| self.triple_of(p))
            .filter(|t| keep(t))
            .collect()
    }

    fn insert_triple(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> GraphResult<()> {
        let (subject_id, subject_created) =
            match self.find_node(subject, case_sensitive).map(|n| n.id) {
                Some(id) => (id, false),
                None => (self.create_node(subject)?, true),
            };
        let object_id = match self.find_node(object, case_sensitive).map(|n| n.id) {
            Some(id) => id,
            None => match self.create_node(object) {
                Ok(id) => id,
                Err(e) => {
                    // Leave no half-inserted triple behind.
                    if subject_created {
                        self.nodes.remove(&subject_id);
                    }
                    return Err(e);
                }
            },
        };
        self.link(Predicate::new(subject_id, object_id, predicate));
        Ok(())
    }

    fn remove_triple(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> bool {
        let Some(subject_id) = self.find_node(subject, case_sensitive).map(|n| n.id) else {
            return false;
        };
        let Some(object_id) = self.find_node(object, case_sensitive).map(|n| n.id) else {
            return false;
        };
        let matches = self
            .edge(subject_id, object_id)
            .is_some_and(|p| labels_match(&p.label, predicate, case_sensitive));
        matches && self.unlink(subject_id, object_id).is_some()
    }
}

impl KnowledgeGraph {
    /// Record the fact `(subject, predicate, object)`.
    ///
    /// Subject and object nodes are reused when a node with a matching label
    /// exists and created otherwise. The new predicate replaces whatever
    /// predicate already joined the two nodes in that direction.
    ///
    /// Fails with [`GraphError::IdsExhausted`](crate::error::GraphError::IdsExhausted)
    /// when a node must be created and no ID is left. The graph is unchanged
    /// in that case.
    pub fn insert_triple(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> GraphResult<()> {
        self.write()
            .insert_triple(subject, predicate, object, case_sensitive)
    }

    /// Remove the fact `(subject, predicate, object)`.
    ///
    /// Returns `true` only if both nodes exist and the predicate joining them
    /// matches `predicate`. Nodes left without edges stay in the graph.
    pub fn remove_triple(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> bool {
        self.write()
            .remove_triple(subject, predicate, object, case_sensitive)
    }
}

impl TripleQuery for KnowledgeGraph {
    fn find_node(&self, label: &str, case_sensitive: bool) -> Option<Node> {
        self.read().find_node(label, case_sensitive).cloned()
    }

    fn find_predicate(&self, label: &str, case_sensitive: bool) -> Option<Predicate> {
        self.read().find_predicate(label, case_sensitive).cloned()
    }

    fn list_nodes(&self) -> Vec<String> {
        self.read()
            .nodes
            .values()
            .filter(|n| !n.label.is_empty())
            .map(|n| n.label.clone())
            .collect()
    }

    fn list_all_predicates(&self) -> BTreeSet<String> {
        self.read()
            .edges()
            .filter(|p| !p.label.is_empty())
            .map(|p| p.label.clone())
            .collect()
    }

    fn list_predicates_from_node(&self, label: &str, case_sensitive: bool) -> Option<Vec<Predicate>> {
        self.read().adjacent(true, label, case_sensitive)
    }

    fn list_predicates_to_node(&self, label: &str, case_sensitive: bool) -> Option<Vec<Predicate>> {
        self.read().adjacent(false, label, case_sensitive)
    }

    fn predicates_from_to(
        &self,
        from: &str,
        to: &str,
        case_sensitive: bool,
    ) -> Option<Vec<Predicate>> {
        self.read().predicates_from_to(from, to, case_sensitive)
    }

    fn query_by_subject(
        &self,
        subject: &str,
        case_sensitive: bool,
    ) -> Option<BTreeMap<String, Vec<String>>> {
        self.read().grouped_peers(true, subject, case_sensitive)
    }

    fn query_by_object(
        &self,
        object: &str,
        case_sensitive: bool,
    ) -> Option<BTreeMap<String, Vec<String>>> {
        self.read().grouped_peers(false, object, case_sensitive)
    }

    fn query_by_predicate(
        &self,
        predicate: &str,
        case_sensitive: bool,
    ) -> Option<Vec<(String, String)>> {
        self.read().query_by_predicate(predicate, case_sensitive)
    }

    fn find_triples(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> Vec<Triple> {
        self.read().scan_triples(|t| {
            matches_pattern(&t.subject, subject, case_sensitive)
                && matches_pattern(&t.predicate, predicate, case_sensitive)
                && matches_pattern(&t.object, object, case_sensitive)
        })
    }

    fn describe_entity(&self, entity: &str, case_sensitive: bool) -> Vec<Triple> {
        self.read().scan_triples(|t| {
            matches_pattern(&t.subject, entity, case_sensitive)
                || matches_pattern(&t.object, entity, case_sensitive)
        })
    }
}

impl<G: TripleQuery + ?Sized> TripleQuery for Option<&G> {
    fn find_node(&self, label: &str, case_sensitive: bool) -> Option<Node> {
        self.and_then(|g| g.find_node(label, case_sensitive))
    }

    fn find_predicate(&self, label: &str, case_sensitive: bool) -> Option<Predicate> {
        self.and_then(|g| g.find_predicate(label, case_sensitive))
    }

    fn list_nodes(&self) -> Vec<String> {
        self.map(|g| g.list_nodes()).unwrap_or_default()
    }

    fn list_all_predicates(&self) -> BTreeSet<String> {
        self.map(|g| g.list_all_predicates()).unwrap_or_default()
    }

    fn list_predicates_from_node(&self, label: &str, case_sensitive: bool) -> Option<Vec<Predicate>> {
        self.and_then(|g| g.list_predicates_from_node(label, case_sensitive))
    }

    fn list_predicates_to_node(&self, label: &str, case_sensitive: bool) -> Option<Vec<Predicate>> {
        self.and_then(|g| g.list_predicates_to_node(label, case_sensitive))
    }

    fn predicates_from_to(
        &self,
        from: &str,
        to: &str,
        case_sensitive: bool,
    ) -> Option<Vec<Predicate>> {
        self.and_then(|g| g.predicates_from_to(from, to, case_sensitive))
    }

    fn query_by_subject(
        &self,
        subject: &str,
        case_sensitive: bool,
    ) -> Option<BTreeMap<String, Vec<String>>> {
        self.and_then(|g| g.query_by_subject(subject, case_sensitive))
    }

    fn query_by_object(
        &self,
        object: &str,
        case_sensitive: bool,
    ) -> Option<BTreeMap<String, Vec<String>>> {
        self.and_then(|g| g.query_by_object(object, case_sensitive))
    }

    fn query_by_predicate(
        &self,
        predicate: &str,
        case_sensitive: bool,
    ) -> Option<Vec<(String, String)>> {
        self.and_then(|g| g.query_by_predicate(predicate, case_sensitive))
    }

    fn find_triples(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> Vec<Triple> {
        self.map(|g| g.find_triples(subject, predicate, object, case_sensitive))
            .unwrap_or_default()
    }

    fn describe_entity(&self, entity: &str, case_sensitive: bool) -> Vec<Triple> {
        self.map(|g| g.describe_entity(entity, case_sensitive))
            .unwrap_or_default()
    }
}
