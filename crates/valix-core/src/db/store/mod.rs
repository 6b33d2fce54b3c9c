//! Module: store
//! Responsibility: the ordered blob-store contract the value index persists into.
//! Does not own: posting-list encoding or index-key layout.
//! Boundary: the index engine talks to storage only through `BlobStore`.

mod lock;
mod memory;
mod query;

pub use lock::StoreLock;
pub use memory::MemoryBlobStore;
pub use query::{IndexOp, IndexQuery, envelope_is_empty, prefix_successor};

use crate::error::InternalError;
use derive_more::Display;

///
/// Address
///
/// Stable location of a stored blob. `UNKNOWN` is the failure sentinel of
/// `put`, `update` and `append`.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("@{_0:#x}")]
pub struct Address(u64);

impl Address {
    pub const UNKNOWN: Self = Self(u64::MAX);

    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == Self::UNKNOWN.0
    }
}

///
/// StoredBlob
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredBlob {
    pub address: Address,
    pub data: Vec<u8>,
}

///
/// ScanControl
///
/// Visitor verdict for the rest of a range scan.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// Callback invoked by `BlobStore::query` for every matching key, in key order.
pub type ScanVisitor<'a> = dyn FnMut(&[u8], Address) -> Result<ScanControl, InternalError> + 'a;

///
/// BlobStore
///
/// Persistent ordered key/blob map. Implementations keep their own state
/// consistent under concurrent calls; logical multi-step operations are
/// serialized by callers through `lock()`.
///

pub trait BlobStore: Send + Sync {
    /// Name used in log fields and error messages.
    fn name(&self) -> &str;

    /// Store-wide lock serializing logical read-modify-write cycles.
    fn lock(&self) -> &StoreLock;

    fn get(&self, key: &[u8]) -> Result<Option<StoredBlob>, InternalError>;

    fn get_at(&self, address: Address) -> Result<Option<Vec<u8>>, InternalError>;

    /// Insert or overwrite the blob under `key`.
    fn put(&self, key: &[u8], data: &[u8]) -> Result<Address, InternalError>;

    /// Replace the blob stored at `address`, which must currently hold `key`.
    fn update(&self, address: Address, key: &[u8], data: &[u8]) -> Result<Address, InternalError>;

    /// Append `data` to the blob under `key`, creating it when absent.
    fn append(&self, key: &[u8], data: &[u8]) -> Result<Address, InternalError>;

    fn remove(&self, key: &[u8]) -> Result<bool, InternalError>;

    /// Remove every key matching `query`; returns the number removed.
    fn remove_all(&self, query: &IndexQuery) -> Result<usize, InternalError>;

    fn find_keys(&self, query: &IndexQuery) -> Result<Vec<Vec<u8>>, InternalError>;

    /// Visit every key matching `query` and starting with `prefix`, in
    /// ascending key order, until the visitor stops or fails.
    fn query(
        &self,
        query: &IndexQuery,
        prefix: Option<&[u8]>,
        visitor: &mut ScanVisitor<'_>,
    ) -> Result<(), InternalError>;

    fn flush(&self) -> Result<(), InternalError>;
}
