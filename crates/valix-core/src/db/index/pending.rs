use crate::{
    model::NodeId,
    value::{AtomicType, IndexableValue},
};
use std::collections::{BTreeMap, btree_map};
use tracing::warn;

///
/// PendingTable
///
/// Values staged for the document currently being processed, in index-key
/// order. Ids are kept as staged; sorting and deduplication happen when a
/// segment is encoded.
///

#[derive(Clone, Debug, Default)]
pub struct PendingTable {
    entries: BTreeMap<IndexableValue, Vec<NodeId>>,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomize `content` as `ty` and stage it for `node`. Values that do not
    /// convert are logged and skipped; returns whether the value was staged.
    pub fn stage(&mut self, content: &str, ty: AtomicType, node: NodeId) -> bool {
        match IndexableValue::convert(ty, content) {
            Ok(value) => {
                self.insert(value, node);
                true
            }
            Err(err) => {
                warn!(node = %node, ty = %ty, error = %err, "value not indexable; skipped");
                false
            }
        }
    }

    /// Stage the text content of an element node.
    pub fn stage_element(&mut self, content: &str, ty: AtomicType, node: NodeId) -> bool {
        self.stage(content, ty, node)
    }

    /// Stage the value of an attribute node.
    pub fn stage_attribute(&mut self, value: &str, ty: AtomicType, node: NodeId) -> bool {
        self.stage(value, ty, node)
    }

    /// Stage an already-typed value.
    pub fn insert(&mut self, value: IndexableValue, node: NodeId) {
        self.entries.entry(value).or_default().push(node);
    }

    /// Take every staged entry, leaving the table empty.
    pub fn drain(&mut self) -> BTreeMap<IndexableValue, Vec<NodeId>> {
        std::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn get(&self, value: &IndexableValue) -> Option<&[NodeId]> {
        self.entries.get(value).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, IndexableValue, Vec<NodeId>> {
        self.entries.iter()
    }
}

///
/// TESTS
///
