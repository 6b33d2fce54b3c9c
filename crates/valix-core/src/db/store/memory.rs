use crate::{
    db::store::{
        Address, BlobStore, IndexQuery, ScanControl, ScanVisitor, StoreLock, StoredBlob,
        envelope_is_empty,
    },
    error::InternalError,
};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

///
/// MemoryBlobStore
///
/// Thread-safe in-memory `BlobStore`. Keys stay ordered and addresses are
/// stable for the lifetime of a key, so it behaves like a paged B-tree file
/// without persistence. An optional blob size limit makes writes fail with
/// `Address::UNKNOWN` the way a full page would, and `set_io_failure`
/// makes every mutation fail with an `Io` error.
///

#[derive(Debug)]
pub struct MemoryBlobStore {
    name: String,
    lock: StoreLock,
    inner: Mutex<Entries>,
    read_only: AtomicBool,
    io_failure: AtomicBool,
    max_blob_bytes: Option<usize>,
    mutations: AtomicU64,
    flushes: AtomicU64,
}

#[derive(Debug, Default)]
struct Entries {
    by_key: BTreeMap<Vec<u8>, Slot>,
    by_address: BTreeMap<Address, Vec<u8>>,
    next_address: u64,
}

#[derive(Debug)]
struct Slot {
    address: Address,
    data: Vec<u8>,
}

impl Entries {
    fn allocate(&mut self, key: &[u8], data: Vec<u8>) -> Address {
        let address = Address::new(self.next_address);
        self.next_address += 1;
        self.by_address.insert(address, key.to_vec());
        self.by_key.insert(key.to_vec(), Slot { address, data });

        address
    }

    fn drop_key(&mut self, key: &[u8]) -> bool {
        match self.by_key.remove(key) {
            Some(slot) => {
                self.by_address.remove(&slot.address);
                true
            }
            None => false,
        }
    }

    fn matching_keys(&self, query: &IndexQuery, prefix: Option<&[u8]>) -> Vec<(Vec<u8>, Address)> {
        let (lower, upper) = query.key_range(prefix);
        if envelope_is_empty(&lower, &upper) {
            return Vec::new();
        }

        self.by_key
            .range((lower, upper))
            .filter(|(key, _)| query.matches(key) && prefix.is_none_or(|p| key.starts_with(p)))
            .map(|(key, slot)| (key.clone(), slot.address))
            .collect()
    }
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            lock: StoreLock::new(name.clone()),
            name,
            inner: Mutex::new(Entries::default()),
            read_only: AtomicBool::new(false),
            io_failure: AtomicBool::new(false),
            max_blob_bytes: None,
            mutations: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    /// Reject writes that would leave a blob larger than `limit` bytes.
    #[must_use]
    pub const fn with_max_blob_bytes(mut self, limit: usize) -> Self {
        self.max_blob_bytes = Some(limit);
        self
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    /// Fail every mutation and flush with an I/O error until cleared.
    pub fn set_io_failure(&self, failing: bool) {
        self.io_failure.store(failing, Ordering::SeqCst);
    }

    /// Successful writes and removals since construction.
    #[must_use]
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().by_key.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().by_key.is_empty()
    }

    /// Snapshot of all keys in ascending order (diagnostics only).
    #[must_use]
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.inner.lock().by_key.keys().cloned().collect()
    }

    fn ensure_writable(&self) -> Result<(), InternalError> {
        if self.is_read_only() {
            return Err(InternalError::store_read_only(&self.name));
        }
        self.ensure_io()
    }

    fn ensure_io(&self) -> Result<(), InternalError> {
        if self.io_failure.load(Ordering::SeqCst) {
            return Err(InternalError::store_io(format!(
                "store '{}' failed to write a page",
                self.name
            )));
        }

        Ok(())
    }

    fn fits(&self, len: usize) -> bool {
        self.max_blob_bytes.is_none_or(|limit| len <= limit)
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> &StoreLock {
        &self.lock
    }

    fn get(&self, key: &[u8]) -> Result<Option<StoredBlob>, InternalError> {
        let inner = self.inner.lock();

        Ok(inner.by_key.get(key).map(|slot| StoredBlob {
            address: slot.address,
            data: slot.data.clone(),
        }))
    }

    fn get_at(&self, address: Address) -> Result<Option<Vec<u8>>, InternalError> {
        let inner = self.inner.lock();

        Ok(inner
            .by_address
            .get(&address)
            .and_then(|key| inner.by_key.get(key))
            .map(|slot| slot.data.clone()))
    }

    fn put(&self, key: &[u8], data: &[u8]) -> Result<Address, InternalError> {
        self.ensure_writable()?;
        if !self.fits(data.len()) {
            return Ok(Address::UNKNOWN);
        }

        let mut inner = self.inner.lock();
        let entries = &mut *inner;
        let address = match entries.by_key.get_mut(key) {
            Some(slot) => {
                slot.data = data.to_vec();
                slot.address
            }
            None => entries.allocate(key, data.to_vec()),
        };
        self.record_mutation();

        Ok(address)
    }

    fn update(&self, address: Address, key: &[u8], data: &[u8]) -> Result<Address, InternalError> {
        self.ensure_writable()?;
        if !self.fits(data.len()) {
            return Ok(Address::UNKNOWN);
        }

        let mut inner = self.inner.lock();
        match inner.by_key.get_mut(key) {
            Some(slot) if slot.address == address => {
                slot.data = data.to_vec();
                self.record_mutation();

                Ok(address)
            }
            // stale address
            _ => Ok(Address::UNKNOWN),
        }
    }

    fn append(&self, key: &[u8], data: &[u8]) -> Result<Address, InternalError> {
        self.ensure_writable()?;

        let mut inner = self.inner.lock();
        let entries = &mut *inner;
        let existing = entries.by_key.get(key).map_or(0, |slot| slot.data.len());
        if !self.fits(existing + data.len()) {
            return Ok(Address::UNKNOWN);
        }

        let address = match entries.by_key.get_mut(key) {
            Some(slot) => {
                slot.data.extend_from_slice(data);
                slot.address
            }
            None => entries.allocate(key, data.to_vec()),
        };
        self.record_mutation();

        Ok(address)
    }

    fn remove(&self, key: &[u8]) -> Result<bool, InternalError> {
        self.ensure_writable()?;

        let removed = self.inner.lock().drop_key(key);
        if removed {
            self.record_mutation();
        }

        Ok(removed)
    }

    fn remove_all(&self, query: &IndexQuery) -> Result<usize, InternalError> {
        self.ensure_writable()?;

        let mut inner = self.inner.lock();
        let keys = inner.matching_keys(query, None);
        for (key, _) in &keys {
            inner.drop_key(key);
            self.record_mutation();
        }

        Ok(keys.len())
    }

    fn find_keys(&self, query: &IndexQuery) -> Result<Vec<Vec<u8>>, InternalError> {
        let inner = self.inner.lock();

        Ok(inner
            .matching_keys(query, None)
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    fn query(
        &self,
        query: &IndexQuery,
        prefix: Option<&[u8]>,
        visitor: &mut ScanVisitor<'_>,
    ) -> Result<(), InternalError> {
        // Snapshot first: visitors read blobs back through `get_at`.
        let matches = self.inner.lock().matching_keys(query, prefix);

        for (key, address) in matches {
            if visitor(&key, address)? == ScanControl::Stop {
                break;
            }
        }

        Ok(())
    }

    fn flush(&self) -> Result<(), InternalError> {
        self.ensure_io()?;
        self.flushes.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::MemoryBlobStore;
    use crate::{
        db::store::{Address, BlobStore, IndexOp, IndexQuery, ScanControl},
        error::ErrorClass,
    };

    #[test]
    fn append_preserves_address_and_concatenates() {
        let store = MemoryBlobStore::new("values.dbx");

        let first = store.append(b"k", &[1, 2]).expect("append");
        let second = store.append(b"k", &[3]).expect("append");

        assert_eq!(first, second);
        assert_eq!(store.get_at(first).expect("get_at"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn update_with_stale_address_returns_unknown() {
        let store = MemoryBlobStore::new("values.dbx");
        let address = store.put(b"k", &[1]).expect("put");

        let stale = Address::new(address.get() + 10);
        assert!(store.update(stale, b"k", &[2]).expect("update").is_unknown());
        assert_eq!(store.update(address, b"k", &[2]).expect("update"), address);
    }

    #[test]
    fn oversized_writes_fail_with_unknown_address() {
        let store = MemoryBlobStore::new("values.dbx").with_max_blob_bytes(4);

        assert!(!store.append(b"k", &[0; 4]).expect("append").is_unknown());
        assert!(store.append(b"k", &[0]).expect("append").is_unknown());
        assert!(store.put(b"j", &[0; 5]).expect("put").is_unknown());
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let store = MemoryBlobStore::new("values.dbx");
        store.set_read_only(true);

        let err = store.put(b"k", &[1]).expect_err("read-only put");
        assert!(err.is_read_only());
        assert_eq!(store.mutation_count(), 0);
    }

    #[test]
    fn io_failure_rejects_mutations_until_cleared() {
        let store = MemoryBlobStore::new("values.dbx");
        store.put(b"k", &[1]).expect("put");
        store.set_io_failure(true);

        let err = store.append(b"k", &[2]).expect_err("failing append");
        assert_eq!(err.class, ErrorClass::Io);
        assert!(!err.is_read_only());
        assert!(store.flush().is_err());
        assert_eq!(store.get_at(Address::new(0)).expect("reads still work"), Some(vec![1]));

        store.set_io_failure(false);
        assert!(!store.append(b"k", &[2]).expect("append").is_unknown());
    }

    #[test]
    fn query_respects_prefix_and_stop() {
        let store = MemoryBlobStore::new("values.dbx");
        for key in [&b"aa"[..], b"ab", b"ac", b"b"] {
            store.put(key, &[0]).expect("put");
        }

        let mut seen = Vec::new();
        store
            .query(
                &IndexQuery::new(IndexOp::Geq, b"ab".to_vec()),
                Some(b"a"),
                &mut |key, _| {
                    seen.push(key.to_vec());
                    Ok(ScanControl::Continue)
                },
            )
            .expect("query");
        assert_eq!(seen, vec![b"ab".to_vec(), b"ac".to_vec()]);

        let mut count = 0;
        store
            .query(&IndexQuery::trunc_right(b"a".to_vec()), None, &mut |_, _| {
                count += 1;
                Ok(ScanControl::Stop)
            })
            .expect("query");
        assert_eq!(count, 1);
    }

    #[test]
    fn remove_all_counts_removed_keys() {
        let store = MemoryBlobStore::new("values.dbx");
        for key in [&b"aa"[..], b"ab", b"b"] {
            store.put(key, &[0]).expect("put");
        }

        let query = IndexQuery::trunc_right(b"a".to_vec());
        assert_eq!(store.remove_all(&query).expect("remove_all"), 2);
        assert_eq!(store.remove_all(&query).expect("remove_all"), 0);
        assert_eq!(store.keys(), vec![b"b".to_vec()]);
    }
}
