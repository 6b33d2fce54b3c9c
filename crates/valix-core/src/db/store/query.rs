//! Module: store::query
//! Responsibility: lowering of index queries to raw key-range bounds.
//! Does not own: scanning or blob decoding.

use derive_more::Display;
use std::ops::Bound;

///
/// IndexOp
///
/// Comparison applied by a range scan. `TruncRight` matches every key that
/// starts with the query bytes.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum IndexOp {
    #[display("eq")]
    Eq,
    #[display("neq")]
    Neq,
    #[display("lt")]
    Lt,
    #[display("leq")]
    Leq,
    #[display("gt")]
    Gt,
    #[display("geq")]
    Geq,
    #[display("trunc-right")]
    TruncRight,
}

///
/// IndexQuery
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexQuery {
    op: IndexOp,
    value: Vec<u8>,
}

impl IndexQuery {
    #[must_use]
    pub fn new(op: IndexOp, value: impl Into<Vec<u8>>) -> Self {
        Self {
            op,
            value: value.into(),
        }
    }

    /// Query matching every key that starts with `prefix`.
    #[must_use]
    pub fn trunc_right(prefix: impl Into<Vec<u8>>) -> Self {
        Self::new(IndexOp::TruncRight, prefix)
    }

    #[must_use]
    pub const fn op(&self) -> IndexOp {
        self.op
    }

    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Whether `key` satisfies the query comparison.
    #[must_use]
    pub fn matches(&self, key: &[u8]) -> bool {
        let value = self.value.as_slice();
        match self.op {
            IndexOp::Eq => key == value,
            IndexOp::Neq => key != value,
            IndexOp::Lt => key < value,
            IndexOp::Leq => key <= value,
            IndexOp::Gt => key > value,
            IndexOp::Geq => key >= value,
            IndexOp::TruncRight => key.starts_with(value),
        }
    }

    /// Raw key bounds covering every candidate key of this query, further
    /// restricted to keys starting with `prefix` when one is given.
    #[must_use]
    pub fn key_range(&self, prefix: Option<&[u8]>) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        let value = self.value.clone();
        let (lower, upper) = match self.op {
            IndexOp::Eq => (Bound::Included(value.clone()), Bound::Included(value)),
            IndexOp::Neq => (Bound::Unbounded, Bound::Unbounded),
            IndexOp::Lt => (Bound::Unbounded, Bound::Excluded(value)),
            IndexOp::Leq => (Bound::Unbounded, Bound::Included(value)),
            IndexOp::Gt => (Bound::Excluded(value), Bound::Unbounded),
            IndexOp::Geq => (Bound::Included(value), Bound::Unbounded),
            IndexOp::TruncRight => prefix_bounds(&value),
        };

        match prefix {
            Some(prefix) => {
                let (prefix_lower, prefix_upper) = prefix_bounds(prefix);
                (
                    tighter_lower(lower, prefix_lower),
                    tighter_upper(upper, prefix_upper),
                )
            }
            None => (lower, upper),
        }
    }
}

/// Smallest key greater than every key that starts with `prefix`, or `None`
/// when no such key exists (empty or all-`0xFF` prefix).
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.pop() {
        if last < u8::MAX {
            next.push(last + 1);
            return Some(next);
        }
    }

    None
}

/// Check whether raw bounds describe an empty traversal envelope.
#[must_use]
pub fn envelope_is_empty(lower: &Bound<Vec<u8>>, upper: &Bound<Vec<u8>>) -> bool {
    // Unbounded envelopes are never empty by construction.
    let (Some(lower_key), Some(upper_key)) = (bound_key_ref(lower), bound_key_ref(upper)) else {
        return false;
    };

    if lower_key < upper_key {
        return false;
    }
    if lower_key > upper_key {
        return true;
    }

    !matches!(lower, Bound::Included(_)) || !matches!(upper, Bound::Included(_))
}

fn prefix_bounds(prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let upper = prefix_successor(prefix).map_or(Bound::Unbounded, Bound::Excluded);

    (Bound::Included(prefix.to_vec()), upper)
}

const fn bound_key_ref(bound: &Bound<Vec<u8>>) -> Option<&Vec<u8>> {
    match bound {
        Bound::Included(value) | Bound::Excluded(value) => Some(value),
        Bound::Unbounded => None,
    }
}

fn tighter_lower(a: Bound<Vec<u8>>, b: Bound<Vec<u8>>) -> Bound<Vec<u8>> {
    match (&a, &b) {
        (Bound::Unbounded, _) => b,
        (_, Bound::Unbounded) => a,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            if x > y || (x == y && matches!(a, Bound::Excluded(_))) {
                a
            } else {
                b
            }
        }
    }
}

fn tighter_upper(a: Bound<Vec<u8>>, b: Bound<Vec<u8>>) -> Bound<Vec<u8>> {
    match (&a, &b) {
        (Bound::Unbounded, _) => b,
        (_, Bound::Unbounded) => a,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            if x < y || (x == y && matches!(a, Bound::Excluded(_))) {
                a
            } else {
                b
            }
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{IndexOp, IndexQuery, envelope_is_empty, prefix_successor};
    use std::ops::Bound;

    #[test]
    fn prefix_successor_carries_over_ff_bytes() {
        assert_eq!(prefix_successor(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_successor(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_successor(&[]), None);
    }

    #[test]
    fn trunc_right_range_stops_before_prefix_successor() {
        let query = IndexQuery::trunc_right(b"abc".to_vec());
        let (lower, upper) = query.key_range(None);

        assert_eq!(lower, Bound::Included(b"abc".to_vec()));
        assert_eq!(upper, Bound::Excluded(b"abd".to_vec()));
        assert!(query.matches(b"abcz"));
        assert!(!query.matches(b"abd"));
    }

    #[test]
    fn prefix_restricts_open_comparisons() {
        let query = IndexQuery::new(IndexOp::Lt, vec![0, 1, 9, 5]);
        let (lower, upper) = query.key_range(Some(&[0, 1, 9]));

        assert_eq!(lower, Bound::Included(vec![0, 1, 9]));
        assert_eq!(upper, Bound::Excluded(vec![0, 1, 9, 5]));

        let query = IndexQuery::new(IndexOp::Geq, vec![0, 1, 9, 5]);
        let (lower, upper) = query.key_range(Some(&[0, 1, 9]));

        assert_eq!(lower, Bound::Included(vec![0, 1, 9, 5]));
        assert_eq!(upper, Bound::Excluded(vec![0, 1, 10]));
    }

    #[test]
    fn envelope_emptiness_identifies_empty_equal_exclusive_bounds() {
        let lower = Bound::Included(vec![0x10]);
        let upper = Bound::Excluded(vec![0x10]);

        assert!(envelope_is_empty(&lower, &upper));
        assert!(!envelope_is_empty(
            &Bound::Included(vec![0x10]),
            &Bound::Included(vec![0x10])
        ));
        assert!(!envelope_is_empty(&Bound::Unbounded, &Bound::Excluded(vec![0])));
    }
}
