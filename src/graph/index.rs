//! In-memory knowledge graph with mirrored adjacency maps.
//!
//! All state sits behind a single `RwLock`: queries take the read lock,
//! mutations the write lock, for the whole call. Methods that need other
//! operations go through the lock-free helpers on [`GraphInner`] so no call
//! ever re-acquires the lock it already holds.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::GraphError;

use super::{GraphEdge, GraphNode, GraphResult, Node, NodeId, Predicate};

/// Outgoing or incoming adjacency: node → peer node → shared predicate.
pub(crate) type Adjacency = BTreeMap<NodeId, BTreeMap<NodeId, Arc<Predicate>>>;

/// Unlocked graph state.
///
/// Every predicate reachable through `from[a][b]` is the same instance as
/// `to[b][a]`. Only [`GraphInner::link`] and [`GraphInner::unlink`] touch the
/// adjacency maps.
#[derive(Debug, Clone, Default)]
pub(crate) struct GraphInner {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) from: Adjacency,
    pub(crate) to: Adjacency,
    pub(crate) current_id: i64,
}

impl GraphInner {
    /// Hand out the next node ID.
    ///
    /// Once the counter reaches `i64::MAX` it stops moving. That last ID is
    /// handed out at most once; every later request fails while it is taken.
    pub(crate) fn allocate_id(&mut self) -> GraphResult<NodeId> {
        let id = NodeId::new(self.current_id);
        if self.nodes.contains_key(&id) {
            return Err(GraphError::IdsExhausted {
                next: self.current_id,
            });
        }
        self.current_id = self.current_id.checked_add(1).unwrap_or(i64::MAX);
        Ok(id)
    }

    /// Register a node and keep the allocator ahead of it.
    pub(crate) fn insert_node(&mut self, node: Node) {
        let next = node.id.get().checked_add(1).unwrap_or(i64::MAX);
        self.current_id = self.current_id.max(next);
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn create_node(&mut self, label: &str) -> GraphResult<NodeId> {
        let id = self.allocate_id()?;
        self.nodes.insert(id, Node::new(id, label));
        Ok(id)
    }

    fn ensure_node<N: GraphNode>(&mut self, node: &N) {
        if !self.nodes.contains_key(&node.id()) {
            self.insert_node(Node::new(node.id(), node.label()));
        }
    }

    /// Insert a predicate into both adjacency maps, replacing any predicate
    /// between the same ordered pair.
    pub(crate) fn link(&mut self, predicate: Predicate) {
        let (from, to) = (predicate.from, predicate.to);
        let shared = Arc::new(predicate);
        self.from
            .entry(from)
            .or_default()
            .insert(to, Arc::clone(&shared));
        self.to.entry(to).or_default().insert(from, shared);
    }

    /// Remove the predicate `from → to` from both maps, dropping adjacency
    /// entries that become empty. Nodes are never removed.
    pub(crate) fn unlink(&mut self, from: NodeId, to: NodeId) -> Option<Arc<Predicate>> {
        let removed = self.from.get_mut(&from)?.remove(&to)?;
        if self.from.get(&from).is_some_and(BTreeMap::is_empty) {
            self.from.remove(&from);
        }
        if let Some(incoming) = self.to.get_mut(&to) {
            incoming.remove(&from);
            if incoming.is_empty() {
                self.to.remove(&to);
            }
        }
        Some(removed)
    }

    pub(crate) fn edge(&self, from: NodeId, to: NodeId) -> Option<&Arc<Predicate>> {
        self.from.get(&from)?.get(&to)
    }

    /// Every predicate once, in `(from, to)` order.
    pub(crate) fn edges(&self) -> impl Iterator<Item = &Arc<Predicate>> {
        self.from.values().flat_map(BTreeMap::values)
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.from.values().map(BTreeMap::len).sum()
    }

    fn peers<'a>(&'a self, adjacency: &'a Adjacency, id: NodeId) -> Vec<Node> {
        adjacency
            .get(&id)
            .map(|peers| {
                peers
                    .keys()
                    .filter_map(|peer| self.nodes.get(peer).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-memory knowledge graph: labelled nodes joined by at most one labelled
/// predicate per ordered node pair.
///
/// Safe to share across threads; every method takes `&self`.
pub struct KnowledgeGraph {
    inner: RwLock<GraphInner>,
}

impl KnowledgeGraph {
    /// Create a new empty knowledge graph.
    pub fn new() -> Self {
        Self::from_inner(GraphInner::default())
    }

    pub(crate) fn from_inner(inner: GraphInner) -> Self {
        Self {
            inner: RwLock::new(inner),
        }
    }

    // A panic under the lock cannot leave the maps half-linked: link and
    // unlink never unwind between their two map updates.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, GraphInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a node with a fresh ID and an empty label.
    ///
    /// # Panics
    ///
    /// Panics if the ID space is exhausted, see [`KnowledgeGraph::new_labeled_node`].
    pub fn new_node(&self) -> Node {
        self.new_labeled_node("")
    }

    /// Allocate a node with a fresh ID and the given label.
    ///
    /// # Panics
    ///
    /// Panics if no ID is left: a node already holds `i64::MAX` and the
    /// counter has reached it. Nothing is inserted in that case. Use
    /// [`KnowledgeGraph::try_new_labeled_node`] to handle exhaustion.
    pub fn new_labeled_node(&self, label: impl Into<String>) -> Node {
        match self.try_new_labeled_node(label) {
            Ok(node) => node,
            Err(e) => panic!("KnowledgeGraph::new_labeled_node: {e}"),
        }
    }

    /// Allocate a node with a fresh ID and the given label, failing with
    /// [`GraphError::IdsExhausted`] when no ID is left.
    pub fn try_new_labeled_node(&self, label: impl Into<String>) -> GraphResult<Node> {
        let mut inner = self.write();
        let id = inner.allocate_id()?;
        let node = Node::new(id, label);
        inner.nodes.insert(id, node.clone());
        Ok(node)
    }

    /// Relabel an existing node. Returns `false` if no node has this ID.
    pub fn set_label(&self, id: NodeId, label: impl Into<String>) -> bool {
        match self.write().nodes.get_mut(&id) {
            Some(node) => {
                node.label = label.into();
                true
            }
            None => false,
        }
    }

    /// Insert a node under its own ID.
    ///
    /// Values other than [`Node`] are stored with their ID and label only.
    ///
    /// # Panics
    ///
    /// Panics if a node with the same ID is already present. Callers that
    /// bypass [`KnowledgeGraph::new_node`] are responsible for ID uniqueness.
    pub fn add_node<N: GraphNode>(&self, node: &N) {
        let mut inner = self.write();
        let id = node.id();
        if inner.nodes.contains_key(&id) {
            drop(inner);
            panic!("KnowledgeGraph::add_node: node ID collision on {id}");
        }
        inner.insert_node(Node::new(id, node.label()));
    }

    /// Build an unlabelled predicate between two nodes without registering it.
    pub fn new_edge<F: GraphNode, T: GraphNode>(&self, from: &F, to: &T) -> Predicate {
        Predicate::new(from.id(), to.id(), "")
    }

    /// Register an edge in both adjacency maps.
    ///
    /// Missing endpoints are created from the edge's endpoint values. An edge
    /// already joining the same ordered pair is replaced.
    pub fn set_edge<E: GraphEdge>(&self, edge: &E) {
        let mut inner = self.write();
        inner.ensure_node(edge.from());
        inner.ensure_node(edge.to());
        inner.link(Predicate::new(
            edge.from().id(),
            edge.to().id(),
            edge.label(),
        ));
    }

    /// Look up a node by ID.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.read().nodes.get(&id).cloned()
    }

    /// All nodes, unlabelled ones included.
    pub fn nodes(&self) -> Vec<Node> {
        self.read().nodes.values().cloned().collect()
    }

    /// Nodes reachable by an edge leaving `id`.
    pub fn from(&self, id: NodeId) -> Vec<Node> {
        let inner = self.read();
        inner.peers(&inner.from, id)
    }

    /// Nodes with an edge pointing at `id`.
    pub fn to(&self, id: NodeId) -> Vec<Node> {
        let inner = self.read();
        inner.peers(&inner.to, id)
    }

    /// The predicate `u → v`, if any.
    pub fn edge(&self, u: NodeId, v: NodeId) -> Option<Predicate> {
        self.read().edge(u, v).map(|p| Predicate::clone(p))
    }

    pub fn has_edge_from_to(&self, u: NodeId, v: NodeId) -> bool {
        self.read().edge(u, v).is_some()
    }

    /// Whether an edge joins `x` and `y` in either direction.
    pub fn has_edge_between(&self, x: NodeId, y: NodeId) -> bool {
        let inner = self.read();
        inner.edge(x, y).is_some() || inner.edge(y, x).is_some()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    /// Number of predicates (edges).
    pub fn edge_count(&self) -> usize {
        self.read().edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.read().nodes.is_empty()
    }

    /// The ID the next [`KnowledgeGraph::new_node`] call will try to hand out.
    pub fn current_id(&self) -> i64 {
        self.read().current_id
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for KnowledgeGraph {
    fn clone(&self) -> Self {
        Self::from_inner(self.read().clone())
    }
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("KnowledgeGraph")
            .field("nodes", &inner.nodes.len())
            .field("edges", &inner.edge_count())
            .field("current_id", &inner.current_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An edge type the store does not know about.
    struct PlainEdge {
        from: Node,
        to: Node,
    }

    impl GraphEdge for PlainEdge {
        type Node = Node;

        fn from(&self) -> &Node {
            &self.from
        }

        fn to(&self) -> &Node {
            &self.to
        }
    }

    fn id(raw: i64) -> NodeId {
        NodeId::new(raw)
    }

    fn mirrors_agree(kg: &KnowledgeGraph) -> bool {
        let inner = kg.read();
        let forward = inner.from.iter().all(|(f, peers)| {
            peers.iter().all(|(t, p)| {
                inner
                    .to
                    .get(t)
                    .and_then(|back| back.get(f))
                    .is_some_and(|q| Arc::ptr_eq(p, q))
            })
        });
        let backward = inner.to.iter().all(|(t, peers)| {
            peers
                .keys()
                .all(|f| inner.from.get(f).is_some_and(|m| m.contains_key(t)))
        });
        forward && backward
    }

    #[test]
    fn new_node_ids_are_sequential() {
        let kg = KnowledgeGraph::new();
        let a = kg.new_node();
        let b = kg.new_node();
        let c = kg.new_labeled_node("c");
        assert_eq!(a.id, id(0));
        assert_eq!(b.id, id(1));
        assert_eq!(c.id, id(2));
        assert_eq!(kg.node_count(), 3);
        assert_eq!(kg.current_id(), 3);
        assert!(a.label.is_empty());
        assert_eq!(kg.node(c.id).unwrap().label, "c");
    }

    #[test]
    fn set_label_updates_stored_node() {
        let kg = KnowledgeGraph::new();
        let n = kg.new_node();
        assert!(kg.set_label(n.id, "Person"));
        assert_eq!(kg.node(n.id).unwrap().label, "Person");
        assert!(!kg.set_label(id(99), "ghost"));
    }

    #[test]
    fn add_node_keeps_allocator_ahead() {
        let kg = KnowledgeGraph::new();
        kg.add_node(&Node::new(id(10), "Node 10"));
        kg.add_node(&id(3));
        assert_eq!(kg.node(id(3)).unwrap().label, "");
        let fresh = kg.new_node();
        assert_eq!(fresh.id, id(11));
    }

    #[test]
    fn explicit_max_id_exhausts_allocator() {
        let kg = KnowledgeGraph::new();
        kg.add_node(&Node::new(id(i64::MAX), "a"));
        assert_eq!(kg.current_id(), i64::MAX);

        let err = kg.try_new_labeled_node("b").unwrap_err();
        assert!(matches!(err, GraphError::IdsExhausted { next: i64::MAX }));
        assert_eq!(kg.node(id(i64::MAX)).unwrap().label, "a");
        assert_eq!(kg.node_count(), 1);
    }

    #[test]
    fn counter_at_max_hands_out_last_id_once() {
        let kg = KnowledgeGraph::from_inner(GraphInner {
            current_id: i64::MAX,
            ..GraphInner::default()
        });
        assert_eq!(kg.try_new_labeled_node("last").unwrap().id, id(i64::MAX));
        assert!(kg.try_new_labeled_node("extra").is_err());
        assert_eq!(kg.node(id(i64::MAX)).unwrap().label, "last");
        assert_eq!(kg.node_count(), 1);
    }

    #[test]
    #[should_panic(expected = "ID space exhausted")]
    fn new_node_panics_when_ids_run_out() {
        let kg = KnowledgeGraph::new();
        kg.add_node(&Node::new(id(i64::MAX), "a"));
        kg.new_node();
    }

    #[test]
    fn exhaustion_leaves_graph_usable() {
        let kg = KnowledgeGraph::new();
        kg.add_node(&Node::new(id(i64::MAX), "a"));
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| kg.new_node()));
        assert_eq!(kg.node_count(), 1);
        kg.set_edge(&Predicate::new(id(i64::MAX), id(i64::MAX), "self"));
        assert!(kg.has_edge_from_to(id(i64::MAX), id(i64::MAX)));
    }

    #[test]
    #[should_panic(expected = "node ID collision")]
    fn add_node_duplicate_panics() {
        let kg = KnowledgeGraph::new();
        kg.add_node(&Node::new(id(1), "a"));
        kg.add_node(&Node::new(id(1), "b"));
    }

    #[test]
    fn new_edge_is_not_registered() {
        let kg = KnowledgeGraph::new();
        let a = kg.new_node();
        let b = kg.new_node();
        let e = kg.new_edge(&a, &b);
        assert_eq!((e.from, e.to), (a.id, b.id));
        assert!(!kg.has_edge_from_to(a.id, b.id));
        assert_eq!(kg.edge_count(), 0);
    }

    #[test]
    fn set_edge_registers_both_directions() {
        let kg = KnowledgeGraph::new();
        let a = kg.new_labeled_node("a");
        let b = kg.new_labeled_node("b");
        let mut e = kg.new_edge(&a, &b);
        e.label = "knows".into();
        kg.set_edge(&e);

        assert!(kg.has_edge_from_to(a.id, b.id));
        assert!(!kg.has_edge_from_to(b.id, a.id));
        assert!(kg.has_edge_between(a.id, b.id));
        assert!(kg.has_edge_between(b.id, a.id));
        assert_eq!(kg.edge(a.id, b.id).unwrap().label, "knows");
        assert!(kg.edge(b.id, a.id).is_none());
        assert_eq!(kg.from(a.id), vec![b.clone()]);
        assert_eq!(kg.to(b.id), vec![a.clone()]);
        assert!(kg.from(b.id).is_empty());
        assert!(mirrors_agree(&kg));
    }

    #[test]
    fn set_edge_auto_creates_endpoints() {
        let kg = KnowledgeGraph::new();
        let edge = PlainEdge {
            from: Node::new(id(30), "Node 30"),
            to: Node::new(id(40), "Node 40"),
        };
        kg.set_edge(&edge);
        assert_eq!(kg.node(id(30)).unwrap().label, "Node 30");
        assert_eq!(kg.node(id(40)).unwrap().label, "Node 40");
        assert!(kg.has_edge_from_to(id(30), id(40)));
        // Foreign edges carry no label once normalized.
        assert_eq!(kg.edge(id(30), id(40)).unwrap().label, "");
        assert_eq!(kg.new_node().id, id(41));
    }

    #[test]
    fn set_edge_by_id_creates_unlabelled_nodes() {
        let kg = KnowledgeGraph::new();
        kg.set_edge(&Predicate::new(id(5), id(6), "rel"));
        assert_eq!(kg.node(id(5)).unwrap().label, "");
        assert_eq!(kg.node_count(), 2);
    }

    #[test]
    fn second_edge_between_pair_overwrites() {
        let kg = KnowledgeGraph::new();
        let a = kg.new_node();
        let b = kg.new_node();
        kg.set_edge(&Predicate::new(a.id, b.id, "first"));
        kg.set_edge(&Predicate::new(a.id, b.id, "second"));
        assert_eq!(kg.edge_count(), 1);
        assert_eq!(kg.edge(a.id, b.id).unwrap().label, "second");
        assert_eq!(kg.read().to[&b.id][&a.id].label, "second");
        assert!(mirrors_agree(&kg));
    }

    #[test]
    fn unlink_prunes_empty_entries() {
        let kg = KnowledgeGraph::new();
        let a = kg.new_node();
        let b = kg.new_node();
        kg.set_edge(&Predicate::new(a.id, b.id, "r"));
        let removed = kg.write().unlink(a.id, b.id);
        assert_eq!(removed.unwrap().label, "r");
        let inner = kg.read();
        assert!(inner.from.is_empty());
        assert!(inner.to.is_empty());
        assert_eq!(inner.nodes.len(), 2);
    }

    #[test]
    fn unlink_missing_edge_is_none() {
        let kg = KnowledgeGraph::new();
        let a = kg.new_node();
        let b = kg.new_node();
        kg.set_edge(&Predicate::new(a.id, b.id, "r"));
        assert!(kg.write().unlink(b.id, a.id).is_none());
        assert_eq!(kg.edge_count(), 1);
        assert!(mirrors_agree(&kg));
    }

    #[test]
    fn empty_graph_queries() {
        let kg = KnowledgeGraph::new();
        assert!(kg.is_empty());
        assert!(kg.nodes().is_empty());
        assert!(kg.from(id(0)).is_empty());
        assert!(kg.to(id(0)).is_empty());
        assert!(kg.edge(id(0), id(1)).is_none());
        assert!(!kg.has_edge_between(id(0), id(1)));
    }

    #[test]
    fn clone_is_independent() {
        let kg = KnowledgeGraph::new();
        let a = kg.new_labeled_node("a");
        let copy = kg.clone();
        kg.set_label(a.id, "changed");
        assert_eq!(copy.node(a.id).unwrap().label, "a");
    }

    #[test]
    fn concurrent_node_creation_yields_unique_ids() {
        let kg = Arc::new(KnowledgeGraph::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let kg = Arc::clone(&kg);
                std::thread::spawn(move || (0..50).map(|_| kg.new_node().id).collect::<Vec<_>>())
            })
            .collect();
        let mut ids: Vec<NodeId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(kg.node_count(), 400);
    }
}
