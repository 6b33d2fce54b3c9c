//! Secondary value index for an embedded XML document store: stages typed
//! node values per document, keeps them as delta-encoded posting lists in an
//! ordered blob store, and answers comparison, match and frequency scans.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Domain vocabulary plus the index entry points.
///

pub mod prelude {
    pub use crate::{
        config::ValueIndexConfig,
        db::{
            index::{AncestorPolicy, IndexSession, MatchFlags, MatchSyntax, QueryContext, ValueIndex},
            store::{BlobStore, IndexOp, MemoryBlobStore},
        },
        model::{
            CollectionId, Document, DocumentId, DocumentSet, NodeId, NodeProxy, NodeSet,
            TreeNumbering,
        },
        value::{AtomicType, IndexableValue},
    };
}
