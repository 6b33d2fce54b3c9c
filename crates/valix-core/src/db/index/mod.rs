//! Module: index
//! Responsibility: the value index engine: staging, posting-list maintenance
//! and index scans over a `BlobStore`.
//! Does not own: key byte layout (`value`) or storage (`db::store`).
//! Boundary: maintenance never surfaces store failures to callers; they are
//! logged and the affected step is abandoned.

mod maintain;
mod matcher;
mod occurrences;
mod pending;
mod posting;
mod query;
mod session;


pub use maintain::ReindexReport;
pub use matcher::{MatchError, MatchFlags, MatchSyntax, TermMatcher, start_term};
pub use occurrences::ValueOccurrences;
pub use pending::PendingTable;
pub use posting::{
    PostingDecodeError, PostingReader, PostingWriter, Segment, SegmentNodes, decode_segments,
    sorted_unique,
};
pub use query::{AncestorPolicy, QueryContext};
pub use session::IndexSession;

use crate::{
    config::ValueIndexConfig,
    db::store::BlobStore,
    model::{CollectionId, Document, NodeId},
    value::IndexableValue,
};
use parking_lot::RwLockWriteGuard;
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tracing::warn;

///
/// ValueIndex
///
/// Secondary index from typed node values to the nodes carrying them.
/// Keys are `IndexableValue::serialize`; blobs are posting lists holding
/// one segment per document.
///

#[derive(Debug)]
pub struct ValueIndex<S: BlobStore> {
    store: Arc<S>,
    case_sensitive: bool,
    lock_timeout: Duration,
}

impl<S: BlobStore> ValueIndex<S> {
    #[must_use]
    pub fn new(store: Arc<S>, config: &ValueIndexConfig) -> Self {
        Self {
            store,
            case_sensitive: config.case_sensitive,
            lock_timeout: config.lock_timeout(),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub const fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Open a staging session for `document`.
    #[must_use]
    pub fn begin(&self, document: Arc<Document>) -> IndexSession {
        IndexSession::new(document)
    }

    #[must_use]
    pub fn key_for(&self, value: &IndexableValue, collection: CollectionId) -> Vec<u8> {
        value.serialize(collection, self.case_sensitive)
    }

    // Group staged ids by index key. Distinct values can share a key once
    // strings are case folded.
    fn group_by_key(
        &self,
        entries: impl IntoIterator<Item = (IndexableValue, Vec<NodeId>)>,
        collection: CollectionId,
    ) -> BTreeMap<Vec<u8>, (IndexableValue, Vec<NodeId>)> {
        let mut grouped: BTreeMap<Vec<u8>, (IndexableValue, Vec<NodeId>)> = BTreeMap::new();

        for (value, nodes) in entries {
            let key = self.key_for(&value, collection);
            match grouped.get_mut(&key) {
                Some((_, merged)) => merged.extend(nodes),
                None => {
                    grouped.insert(key, (value, nodes));
                }
            }
        }

        grouped
    }

    // Write lock for one maintenance step; timeouts are logged and the step
    // is abandoned by the caller.
    fn write_guard(&self, op: &'static str) -> Option<RwLockWriteGuard<'_, ()>> {
        match self.store.lock().write(self.lock_timeout) {
            Ok(guard) => Some(guard),
            Err(err) => {
                warn!(store = self.store.name(), op, error = %err, "value index lock unavailable");
                None
            }
        }
    }
}
