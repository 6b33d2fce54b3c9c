use crate::error::InternalError;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

///
/// StoreLock
///
/// Coarse reader/writer lock for one store instance. Acquisition is bounded
/// by a timeout; expiry surfaces as a `LockTimeout` error.
///

#[derive(Debug)]
pub struct StoreLock {
    name: String,
    inner: RwLock<()>,
}

impl StoreLock {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(()),
        }
    }

    /// Shared acquisition. Recursive, so a thread already holding a read
    /// guard is not blocked behind a queued writer.
    pub fn read(&self, timeout: Duration) -> Result<RwLockReadGuard<'_, ()>, InternalError> {
        self.inner
            .try_read_recursive_for(timeout)
            .ok_or_else(|| InternalError::lock_timeout(&self.name, "read"))
    }

    pub fn write(&self, timeout: Duration) -> Result<RwLockWriteGuard<'_, ()>, InternalError> {
        self.inner
            .try_write_for(timeout)
            .ok_or_else(|| InternalError::lock_timeout(&self.name, "write"))
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::StoreLock;
    use crate::error::ErrorClass;
    use std::time::Duration;

    const SHORT: Duration = Duration::from_millis(10);

    #[test]
    fn write_times_out_while_reader_holds_lock() {
        let lock = StoreLock::new("values.dbx");
        let _reader = lock.read(SHORT).expect("first reader");

        let err = lock.write(SHORT).expect_err("writer must time out");
        assert_eq!(err.class, ErrorClass::LockTimeout);
    }

    #[test]
    fn recursive_read_succeeds_alongside_existing_reader() {
        let lock = StoreLock::new("values.dbx");
        let _outer = lock.read(SHORT).expect("outer reader");

        assert!(lock.read(SHORT).is_ok());
    }

    #[test]
    fn guards_release_on_drop() {
        let lock = StoreLock::new("values.dbx");
        {
            let _writer = lock.write(SHORT).expect("writer");
            assert!(lock.is_locked());
        }

        assert!(!lock.is_locked());
        assert!(lock.write(SHORT).is_ok());
    }
}
