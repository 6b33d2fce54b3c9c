use crate::model::{
    document::{Document, DocumentId},
    tree::NodeId,
};
use std::collections::BTreeSet;

///
/// NodeProxy
///
/// A node addressed by (document, node id). Orders by document first, then
/// document order.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeProxy {
    pub doc: DocumentId,
    pub node: NodeId,
}

impl NodeProxy {
    #[must_use]
    pub const fn new(doc: DocumentId, node: NodeId) -> Self {
        Self { doc, node }
    }
}

///
/// NodeSet
///
/// Ordered, duplicate-free set of nodes. Used both for query results and as
/// the context a query is evaluated against.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeSet {
    nodes: BTreeSet<NodeProxy>,
}

impl NodeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: NodeProxy) -> bool {
        self.nodes.insert(node)
    }

    #[must_use]
    pub fn contains(&self, node: NodeProxy) -> bool {
        self.nodes.contains(&node)
    }

    #[must_use]
    pub fn contains_doc(&self, doc: DocumentId) -> bool {
        self.nodes
            .range(NodeProxy::new(doc, NodeId::new(0))..=NodeProxy::new(doc, NodeId::new(u64::MAX)))
            .next()
            .is_some()
    }

    /// Nearest node of this set that is `node` itself or one of its
    /// ancestors in `doc`.
    #[must_use]
    pub fn parent_with_child(&self, doc: &Document, node: NodeId) -> Option<NodeProxy> {
        doc.self_and_ancestors(node)
            .map(|candidate| NodeProxy::new(doc.id(), candidate))
            .find(|candidate| self.nodes.contains(candidate))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeProxy> {
        self.nodes.iter()
    }

    /// Node ids of one document, in document order.
    pub fn nodes_of(&self, doc: DocumentId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .range(NodeProxy::new(doc, NodeId::new(0))..=NodeProxy::new(doc, NodeId::new(u64::MAX)))
            .map(|proxy| proxy.node)
    }
}

impl FromIterator<NodeProxy> for NodeSet {
    fn from_iter<I: IntoIterator<Item = NodeProxy>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

///
/// TESTS
///
