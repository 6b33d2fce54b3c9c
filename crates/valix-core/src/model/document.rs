use crate::model::tree::{NodeId, TreeNumbering};
use derive_more::{Display, From};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

///
/// CollectionId
///

#[derive(Clone, Copy, Debug, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd)]
pub struct CollectionId(u16);

impl CollectionId {
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

///
/// DocumentId
///

#[derive(Clone, Copy, Debug, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd)]
pub struct DocumentId(u32);

impl DocumentId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

///
/// Document
///
/// The parts of a stored document the value index needs: identity, owning
/// collection, and the node numbering used for ancestry tests.
///

#[derive(Clone, Debug)]
pub struct Document {
    id: DocumentId,
    collection: CollectionId,
    tree: Arc<TreeNumbering>,
    reindex_level: Option<u32>,
}

impl Document {
    #[must_use]
    pub const fn new(id: DocumentId, collection: CollectionId, tree: Arc<TreeNumbering>) -> Self {
        Self {
            id,
            collection,
            tree,
            reindex_level: None,
        }
    }

    /// Mark the tree level from which a structural edit requires reindexing.
    /// Nodes above that level keep their index entries during `reindex`.
    #[must_use]
    pub const fn with_reindex_level(mut self, level: u32) -> Self {
        self.reindex_level = Some(level);
        self
    }

    #[must_use]
    pub const fn id(&self) -> DocumentId {
        self.id
    }

    #[must_use]
    pub const fn collection(&self) -> CollectionId {
        self.collection
    }

    #[must_use]
    pub const fn reindex_level(&self) -> Option<u32> {
        self.reindex_level
    }

    #[must_use]
    pub fn tree_level(&self, node: NodeId) -> u32 {
        self.tree.level(node)
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.parent(node)
    }

    #[must_use]
    pub fn is_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.tree.is_descendant(ancestor, node)
    }

    /// `node` followed by its ancestors up to the root.
    pub fn self_and_ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), |current| self.parent(*current))
    }
}

///
/// DocumentSet
///
/// Documents a query is restricted to, grouped by collection.
///

#[derive(Clone, Debug, Default)]
pub struct DocumentSet {
    docs: BTreeMap<DocumentId, Arc<Document>>,
}

impl DocumentSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc: Arc<Document>) {
        self.docs.insert(doc.id(), doc);
    }

    #[must_use]
    pub fn get(&self, id: DocumentId) -> Option<&Arc<Document>> {
        self.docs.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: DocumentId) -> bool {
        self.docs.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Distinct collections of the member documents, ascending.
    #[must_use]
    pub fn collections(&self) -> BTreeSet<CollectionId> {
        self.docs.values().map(|doc| doc.collection()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.docs.values()
    }
}

impl FromIterator<Arc<Document>> for DocumentSet {
    fn from_iter<I: IntoIterator<Item = Arc<Document>>>(iter: I) -> Self {
        let mut set = Self::new();
        for doc in iter {
            set.insert(doc);
        }
        set
    }
}
