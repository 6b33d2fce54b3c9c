use crate::{
    db::index::pending::PendingTable,
    model::{Document, NodeId},
    value::AtomicType,
};
use std::sync::Arc;

///
/// IndexSession
///
/// Per-document indexing context: the document being processed and the
/// values staged for it. Owned by one processing thread and handed to the
/// maintenance calls of `ValueIndex`.
///

#[derive(Debug)]
pub struct IndexSession {
    document: Arc<Document>,
    pending: PendingTable,
}

impl IndexSession {
    #[must_use]
    pub fn new(document: Arc<Document>) -> Self {
        Self {
            document,
            pending: PendingTable::new(),
        }
    }

    #[must_use]
    pub const fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// Switch to another document. Anything still staged is discarded.
    pub fn set_document(&mut self, document: Arc<Document>) {
        self.pending.clear();
        self.document = document;
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub const fn pending_mut(&mut self) -> &mut PendingTable {
        &mut self.pending
    }

    pub fn stage_element(&mut self, content: &str, ty: AtomicType, node: NodeId) -> bool {
        self.pending.stage_element(content, ty, node)
    }

    pub fn stage_attribute(&mut self, value: &str, ty: AtomicType, node: NodeId) -> bool {
        self.pending.stage_attribute(value, ty, node)
    }
}
