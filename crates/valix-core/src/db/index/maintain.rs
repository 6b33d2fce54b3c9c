//! Module: index::maintain
//! Responsibility: posting-list mutation: flush, remove, drops, reindex, sync.
//! Does not own: value conversion (done at staging) or scan decoding.
//! Boundary: every store failure is logged here and never returned.

use crate::{
    db::{
        index::{
            ValueIndex,
            posting::{PostingReader, PostingWriter, SEGMENT_HEADER_LEN, sorted_unique},
            session::IndexSession,
        },
        store::{Address, BlobStore, IndexQuery, StoredBlob},
    },
    error::InternalError,
    model::{CollectionId, Document, DocumentId, NodeId},
    value::{IndexableValue, collection_prefix},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tracing::{debug, error, warn};

///
/// ReindexReport
///
/// Outcome of `ValueIndex::reindex`. Ids of the old document that lie
/// outside the reindexed subtree are collected in `discarded`; they are
/// dropped from the rewritten posting lists and not written back.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReindexReport {
    pub keys_written: usize,
    pub discarded: BTreeMap<IndexableValue, Vec<NodeId>>,
    /// False when a lock timeout abandoned the run. Staged values are then
    /// left in the session.
    pub completed: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum WriteOutcome {
    Written,
    Failed,
    ReadOnly,
}

impl<S: BlobStore> ValueIndex<S> {
    /// Append one segment per staged value for the session document.
    /// Intended for documents with no existing entries. The staged values
    /// are always cleared.
    pub fn flush(&self, session: &mut IndexSession) {
        let staged = session.pending_mut().drain();
        if staged.is_empty() {
            return;
        }

        let document = Arc::clone(session.document());
        let mut written = 0usize;

        for (key, (value, nodes)) in self.group_by_key(staged, document.collection()) {
            let nodes = sorted_unique(nodes);
            let mut writer = PostingWriter::with_capacity(SEGMENT_HEADER_LEN + nodes.len() * 2);
            writer.write_segment(document.id(), &nodes);

            let Some(_guard) = self.write_guard("flush") else {
                continue;
            };

            let result = self.store.append(&key, writer.as_bytes());
            match self.settle_write(result, &value, "flush") {
                WriteOutcome::Written => written += 1,
                WriteOutcome::Failed => {}
                WriteOutcome::ReadOnly => break,
            }
        }

        debug!(store = self.store.name(), doc = %document.id(), written, "value index flush");
    }

    /// Remove the staged (value, node) pairs of the session document.
    ///
    /// Staged values are kept when the store turns out to be read-only.
    pub fn remove(&self, session: &mut IndexSession) {
        if session.pending().is_empty() {
            return;
        }

        let document = Arc::clone(session.document());
        let staged = session
            .pending()
            .iter()
            .map(|(value, nodes)| (value.clone(), nodes.clone()));

        for (key, (value, nodes)) in self.group_by_key(staged, document.collection()) {
            let removed: BTreeSet<NodeId> = nodes.into_iter().collect();

            let Some(_guard) = self.write_guard("remove") else {
                continue;
            };
            let Some(prior) = self.read_blob(&key, &value) else {
                continue;
            };

            let mut writer = PostingWriter::new();
            let mut kept = Vec::new();
            if let Some(blob) = &prior {
                self.rebuild_segments(&blob.data, &value, document.id(), &mut writer, |node| {
                    if !removed.contains(&node) {
                        kept.push(node);
                    }
                });
            }
            writer.write_segment(document.id(), &sorted_unique(kept));

            let address = prior.map(|blob| blob.address);
            if self.write_back(&key, address, writer.as_bytes(), &value, "remove")
                == WriteOutcome::ReadOnly
            {
                return;
            }
        }

        session.pending_mut().clear();
    }

    /// Delete every index key of `collection`. Returns the number of keys
    /// removed; zero when the store refused or nothing matched.
    pub fn drop_index_for_collection(&self, collection: CollectionId) -> usize {
        let Some(_guard) = self.write_guard("drop_collection") else {
            return 0;
        };

        let query = IndexQuery::trunc_right(collection_prefix(collection).to_vec());
        match self.store.remove_all(&query) {
            Ok(removed) => {
                debug!(store = self.store.name(), %collection, removed, "value index collection dropped");
                removed
            }
            Err(err) => {
                self.log_store_error(&err, "drop_collection");
                0
            }
        }
    }

    /// Strip `document`'s segment from every posting list of its collection.
    /// Lists left empty are deleted.
    pub fn drop_index_for_document(&self, document: &Document) {
        let Some(_guard) = self.write_guard("drop_document") else {
            return;
        };

        // Full collection scan; document drops are rare.
        let query = IndexQuery::trunc_right(collection_prefix(document.collection()).to_vec());
        let keys = match self.store.find_keys(&query) {
            Ok(keys) => keys,
            Err(err) => {
                self.log_store_error(&err, "drop_document");
                return;
            }
        };

        let mut rewritten = 0usize;
        for key in keys {
            let blob = match self.store.get(&key) {
                Ok(Some(blob)) => blob,
                Ok(None) => continue,
                Err(err) => {
                    self.log_store_error(&err, "drop_document");
                    continue;
                }
            };

            let mut writer = PostingWriter::with_capacity(blob.data.len());
            let mut changed = false;
            for segment in PostingReader::new(&blob.data) {
                match segment {
                    Ok(segment) if segment.doc() == document.id() => changed = true,
                    Ok(segment) => writer.copy_segment(&segment),
                    Err(err) => {
                        warn!(store = self.store.name(), key = ?key, error = %err, "corrupt posting blob; remaining bytes skipped");
                        break;
                    }
                }
            }
            if !changed {
                continue;
            }

            let outcome = if writer.is_empty() {
                match self.store.remove(&key) {
                    Ok(_) => WriteOutcome::Written,
                    Err(err) => self.log_store_error(&err, "drop_document"),
                }
            } else {
                let result = self.store.put(&key, writer.as_bytes());
                self.settle_write_key(result, &key, "drop_document")
            };

            match outcome {
                WriteOutcome::Written => rewritten += 1,
                WriteOutcome::Failed => {}
                WriteOutcome::ReadOnly => return,
            }
        }

        debug!(store = self.store.name(), doc = %document.id(), rewritten, "value index document dropped");
    }

    /// Rewrite the posting lists of the staged values after a structural
    /// edit of `old_document`.
    ///
    /// Without `node`, old entries above the document's reindex level are
    /// folded into the new segment. With `node`, old entries outside that
    /// subtree are reported as discarded.
    pub fn reindex(
        &self,
        session: &mut IndexSession,
        old_document: &Document,
        node: Option<NodeId>,
    ) -> ReindexReport {
        let mut report = ReindexReport::default();
        if session.pending().is_empty() {
            report.completed = true;
            return report;
        }

        let target = session.document().id();
        let staged = session
            .pending()
            .iter()
            .map(|(value, nodes)| (value.clone(), nodes.clone()));

        for (key, (value, mut nodes)) in self.group_by_key(staged, old_document.collection()) {
            let Some(_guard) = self.write_guard("reindex") else {
                return report;
            };
            let Some(prior) = self.read_blob(&key, &value) else {
                continue;
            };

            let mut writer = PostingWriter::new();
            let mut discarded = Vec::new();
            if let Some(blob) = &prior {
                self.rebuild_segments(&blob.data, &value, old_document.id(), &mut writer, |id| {
                    match node {
                        None => {
                            if old_document
                                .reindex_level()
                                .is_some_and(|level| old_document.tree_level(id) < level)
                            {
                                nodes.push(id);
                            }
                        }
                        Some(root) => {
                            if !old_document.is_descendant(root, id) {
                                discarded.push(id);
                            }
                        }
                    }
                });
            }
            writer.write_segment(target, &sorted_unique(nodes));

            if !discarded.is_empty() {
                report.discarded.insert(value.clone(), discarded);
            }

            let address = prior.map(|blob| blob.address);
            match self.write_back(&key, address, writer.as_bytes(), &value, "reindex") {
                WriteOutcome::Written => report.keys_written += 1,
                WriteOutcome::Failed => {}
                WriteOutcome::ReadOnly => break,
            }
        }

        session.pending_mut().clear();
        report.completed = true;

        report
    }

    /// Ask the store to persist buffered writes.
    pub fn sync(&self) {
        let Some(_guard) = self.write_guard("sync") else {
            return;
        };

        if let Err(err) = self.store.flush() {
            error!(store = self.store.name(), error = %err, "value index sync failed");
        }
    }

    // Copy other documents' segments into `writer` and hand each node id of
    // `doc`'s segments to `on_node`. Corruption ends the walk.
    fn rebuild_segments(
        &self,
        data: &[u8],
        value: &IndexableValue,
        doc: DocumentId,
        writer: &mut PostingWriter,
        mut on_node: impl FnMut(NodeId),
    ) {
        for segment in PostingReader::new(data) {
            let segment = match segment {
                Ok(segment) => segment,
                Err(err) => {
                    warn!(store = self.store.name(), %value, error = %err, "corrupt posting blob; remaining bytes skipped");
                    return;
                }
            };

            if segment.doc() != doc {
                writer.copy_segment(&segment);
                continue;
            }

            for node in segment.nodes() {
                match node {
                    Ok(node) => on_node(node),
                    Err(err) => {
                        warn!(store = self.store.name(), %value, error = %err, "corrupt posting blob; remaining bytes skipped");
                        return;
                    }
                }
            }
        }
    }

    // Outer `None`: the read failed and the step is abandoned.
    fn read_blob(&self, key: &[u8], value: &IndexableValue) -> Option<Option<StoredBlob>> {
        match self.store.get(key) {
            Ok(blob) => Some(blob),
            Err(err) => {
                error!(store = self.store.name(), %value, error = %err, "posting blob unreadable");
                None
            }
        }
    }

    fn write_back(
        &self,
        key: &[u8],
        prior: Option<Address>,
        data: &[u8],
        value: &IndexableValue,
        op: &'static str,
    ) -> WriteOutcome {
        let result = match prior {
            Some(address) => self.store.update(address, key, data),
            None => self.store.put(key, data),
        };

        self.settle_write(result, value, op)
    }

    fn settle_write(
        &self,
        result: Result<Address, InternalError>,
        value: &IndexableValue,
        op: &'static str,
    ) -> WriteOutcome {
        match result {
            Ok(address) if address.is_unknown() => {
                error!(store = self.store.name(), op, %value, "posting blob write failed; entry dropped");
                WriteOutcome::Failed
            }
            Ok(_) => WriteOutcome::Written,
            Err(err) => self.log_store_error(&err, op),
        }
    }

    fn settle_write_key(
        &self,
        result: Result<Address, InternalError>,
        key: &[u8],
        op: &'static str,
    ) -> WriteOutcome {
        match result {
            Ok(address) if address.is_unknown() => {
                error!(store = self.store.name(), op, key = ?key, "posting blob write failed; entry dropped");
                WriteOutcome::Failed
            }
            Ok(_) => WriteOutcome::Written,
            Err(err) => self.log_store_error(&err, op),
        }
    }

    fn log_store_error(&self, err: &InternalError, op: &'static str) -> WriteOutcome {
        if err.is_read_only() {
            warn!(store = self.store.name(), op, "store is read-only; value index update aborted");
            return WriteOutcome::ReadOnly;
        }

        error!(store = self.store.name(), op, error = %err.display_with_class(), "value index store error");
        WriteOutcome::Failed
    }
}
