use crate::{
    config::ValueIndexConfig,
    db::{
        index::{ValueIndex, decode_segments},
        store::{BlobStore, MemoryBlobStore},
    },
    model::{CollectionId, Document, DocumentId, DocumentSet, NodeId, TreeNumbering},
};
use std::sync::Arc;

pub(crate) const STORE_NAME: &str = "values.dbx";
pub(crate) const COLLECTION: CollectionId = CollectionId::new(1);

/// Four children per node, four levels:
/// root 1, level 1 = 2..=5, level 2 = 6..=21, level 3 = 22..=85.
/// Children of 2 are 6..=9, of 3 are 10..=13.
pub(crate) fn tree() -> Arc<TreeNumbering> {
    Arc::new(TreeNumbering::new(&[4, 4, 4]))
}

pub(crate) fn document(id: u32) -> Arc<Document> {
    document_in(id, COLLECTION)
}

pub(crate) fn document_in(id: u32, collection: CollectionId) -> Arc<Document> {
    Arc::new(Document::new(DocumentId::new(id), collection, tree()))
}

pub(crate) fn doc_set(docs: &[&Arc<Document>]) -> DocumentSet {
    docs.iter().map(|doc| Arc::clone(doc)).collect()
}

pub(crate) fn ids(raw: &[u64]) -> Vec<NodeId> {
    raw.iter().copied().map(NodeId::new).collect()
}

pub(crate) fn memory_index() -> (Arc<MemoryBlobStore>, ValueIndex<MemoryBlobStore>) {
    memory_index_with(&ValueIndexConfig::default())
}

pub(crate) fn memory_index_with(
    config: &ValueIndexConfig,
) -> (Arc<MemoryBlobStore>, ValueIndex<MemoryBlobStore>) {
    let store = Arc::new(MemoryBlobStore::new(STORE_NAME));
    let index = ValueIndex::new(Arc::clone(&store), config);

    (store, index)
}

/// Decoded segments stored under `key`; empty when the key is absent.
pub(crate) fn segments(store: &MemoryBlobStore, key: &[u8]) -> Vec<(DocumentId, Vec<NodeId>)> {
    store
        .get(key)
        .expect("store read")
        .map(|blob| decode_segments(&blob.data).expect("well-formed posting blob"))
        .unwrap_or_default()
}
