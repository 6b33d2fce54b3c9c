use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Maintenance paths log these and carry on; only query termination is
/// surfaced to callers.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a store-origin read-only violation.
    pub(crate) fn store_read_only(store: &str) -> Self {
        Self::new(
            ErrorClass::ReadOnly,
            ErrorOrigin::Store,
            format!("store '{store}' is read-only"),
        )
    }

    /// Construct a store-origin I/O failure.
    pub(crate) fn store_io(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Io, ErrorOrigin::Store, message)
    }

    /// Construct a store-origin lock acquisition timeout.
    pub(crate) fn lock_timeout(store: &str, mode: &str) -> Self {
        Self::new(
            ErrorClass::LockTimeout,
            ErrorOrigin::Store,
            format!("failed to acquire {mode} lock for '{store}'"),
        )
    }

    /// Construct an index-origin corruption error.
    pub(crate) fn index_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Index, message)
    }

    /// Construct a query-origin termination signal.
    pub(crate) fn query_terminated() -> Self {
        Self::new(
            ErrorClass::Terminated,
            ErrorOrigin::Query,
            "query terminated before the index scan completed",
        )
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self.class, ErrorClass::ReadOnly)
    }

    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self.class, ErrorClass::Terminated)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Corruption,
    Unsupported,
    ReadOnly,
    Io,
    LockTimeout,
    Terminated,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Corruption => "corruption",
            Self::Unsupported => "unsupported",
            Self::ReadOnly => "read_only",
            Self::Io => "io",
            Self::LockTimeout => "lock_timeout",
            Self::Terminated => "terminated",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Store,
    Index,
    Value,
    Query,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Store => "store",
            Self::Index => "index",
            Self::Value => "value",
            Self::Query => "query",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{ErrorClass, ErrorOrigin, InternalError};

    #[test]
    fn display_with_class_prefixes_origin_and_class() {
        let err = InternalError::store_read_only("values.dbx");

        assert!(err.is_read_only());
        assert_eq!(
            err.display_with_class(),
            "store:read_only: store 'values.dbx' is read-only"
        );
    }

    #[test]
    fn terminated_is_query_origin() {
        let err = InternalError::query_terminated();

        assert!(err.is_terminated());
        assert_eq!(err.origin, ErrorOrigin::Query);
        assert_eq!(err.class, ErrorClass::Terminated);
    }
}
