use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::CollectionId,
    value::{AtomicType, IndexableValue, canonical_zero},
};
use thiserror::Error as ThisError;

///
/// Constants
///

/// Bytes of the `[collection:u16]` key prefix.
pub const COLLECTION_PREFIX_LEN: usize = 2;

/// Bytes of the `[collection:u16][type:u8]` key prefix.
pub const KEY_PREFIX_LEN: usize = COLLECTION_PREFIX_LEN + 1;

///
/// ValueDecodeError
///
/// Index key bytes that do not decode to an `IndexableValue`.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum ValueDecodeError {
    #[error("index key shorter than its {KEY_PREFIX_LEN}-byte prefix: {len} bytes")]
    MissingPrefix { len: usize },

    #[error("index key carries unknown type tag {tag:#04x}")]
    UnknownType { tag: u8 },

    #[error("index key payload for {ty} has invalid length {len}")]
    PayloadLength { ty: AtomicType, len: usize },

    #[error("index key payload for xs:boolean must be 0 or 1, found {byte}")]
    InvalidBoolean { byte: u8 },

    #[error("index key payload for xs:string is not valid utf-8")]
    InvalidUtf8,
}

impl From<ValueDecodeError> for InternalError {
    fn from(err: ValueDecodeError) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Value, err.to_string())
    }
}

/// Two-byte prefix shared by every key of one collection.
#[must_use]
pub const fn collection_prefix(collection: CollectionId) -> [u8; COLLECTION_PREFIX_LEN] {
    collection.get().to_be_bytes()
}

/// Three-byte prefix shared by every key of one (collection, type) pair.
#[must_use]
pub const fn type_prefix(collection: CollectionId, ty: AtomicType) -> [u8; KEY_PREFIX_LEN] {
    let [hi, lo] = collection_prefix(collection);

    [hi, lo, ty.tag()]
}

// Encode the prefix plus an order-preserving payload.
pub(super) fn encode_key(
    value: &IndexableValue,
    collection: CollectionId,
    case_sensitive: bool,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(KEY_PREFIX_LEN + 8);
    out.extend_from_slice(&type_prefix(collection, value.atomic_type()));

    match value {
        IndexableValue::Boolean(v) => out.push(u8::from(*v)),
        IndexableValue::Integer(v) => out.extend_from_slice(&ordered_i64_bytes(*v)),
        IndexableValue::Double(v) => {
            out.extend_from_slice(&ordered_f64_bytes(canonical_zero(*v)));
        }
        // Strings are stored unterminated: a key is one whole store key, and
        // prefix scans rely on "abc" being a byte prefix of "abcd".
        IndexableValue::String(v) if case_sensitive => out.extend_from_slice(v.as_bytes()),
        IndexableValue::String(v) => out.extend_from_slice(v.to_lowercase().as_bytes()),
    }

    out
}

/// Decode an index key back into its collection and value.
/// Case-folded strings decode to their folded form.
pub fn decode_key(bytes: &[u8]) -> Result<(CollectionId, IndexableValue), ValueDecodeError> {
    if bytes.len() < KEY_PREFIX_LEN {
        return Err(ValueDecodeError::MissingPrefix { len: bytes.len() });
    }

    let collection = CollectionId::new(u16::from_be_bytes([bytes[0], bytes[1]]));
    let tag = bytes[COLLECTION_PREFIX_LEN];
    let ty = AtomicType::from_tag(tag).ok_or(ValueDecodeError::UnknownType { tag })?;
    let payload = &bytes[KEY_PREFIX_LEN..];

    let value = match ty {
        AtomicType::Boolean => match payload {
            [0] => IndexableValue::Boolean(false),
            [1] => IndexableValue::Boolean(true),
            [byte] => return Err(ValueDecodeError::InvalidBoolean { byte: *byte }),
            _ => {
                return Err(ValueDecodeError::PayloadLength {
                    ty,
                    len: payload.len(),
                });
            }
        },
        AtomicType::Integer => IndexableValue::Integer(i64_from_ordered(fixed8(ty, payload)?)),
        AtomicType::Double => IndexableValue::Double(f64_from_ordered(fixed8(ty, payload)?)),
        AtomicType::String => IndexableValue::String(
            String::from_utf8(payload.to_vec()).map_err(|_| ValueDecodeError::InvalidUtf8)?,
        ),
        AtomicType::UntypedAtomic => return Err(ValueDecodeError::UnknownType { tag }),
    };

    Ok((collection, value))
}

fn fixed8(ty: AtomicType, payload: &[u8]) -> Result<[u8; 8], ValueDecodeError> {
    payload
        .try_into()
        .map_err(|_| ValueDecodeError::PayloadLength {
            ty,
            len: payload.len(),
        })
}

const fn ordered_i64_bytes(value: i64) -> [u8; 8] {
    let biased = value.cast_unsigned() ^ (1u64 << 63);
    biased.to_be_bytes()
}

const fn i64_from_ordered(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ (1u64 << 63)).cast_signed()
}

const fn ordered_f64_bytes(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & 0x8000_0000_0000_0000 == 0 {
        bits ^ 0x8000_0000_0000_0000
    } else {
        !bits
    };

    ordered.to_be_bytes()
}

const fn f64_from_ordered(bytes: [u8; 8]) -> f64 {
    let ordered = u64::from_be_bytes(bytes);
    let bits = if ordered & 0x8000_0000_0000_0000 == 0 {
        !ordered
    } else {
        ordered ^ 0x8000_0000_0000_0000
    };

    f64::from_bits(bits)
}

///
/// TESTS
///
