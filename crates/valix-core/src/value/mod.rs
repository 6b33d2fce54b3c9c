//! Module: value
//! Responsibility: typed atomic values that can key the value index.
//! Does not own: index-key byte layout (see `value::ordered`).

mod ordered;

pub use ordered::{
    COLLECTION_PREFIX_LEN, KEY_PREFIX_LEN, ValueDecodeError, collection_prefix, decode_key,
    type_prefix,
};

use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::CollectionId,
};
use derive_more::Display;
use std::cmp::Ordering;
use thiserror::Error as ThisError;

///
/// AtomicType
///
/// Declared type of an indexed element or attribute.
/// The discriminant is the one-byte type tag stored in every index key.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum AtomicType {
    #[display("xs:untypedAtomic")]
    UntypedAtomic = 0x00,
    #[display("xs:boolean")]
    Boolean = 0x17,
    #[display("xs:integer")]
    Integer = 0x1F,
    #[display("xs:double")]
    Double = 0x22,
    #[display("xs:string")]
    String = 0x24,
}

impl AtomicType {
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Resolve a stored type tag. Only indexable types have a stored form.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x17 => Some(Self::Boolean),
            0x1F => Some(Self::Integer),
            0x22 => Some(Self::Double),
            0x24 => Some(Self::String),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_indexable(self) -> bool {
        !matches!(self, Self::UntypedAtomic)
    }

    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String)
    }
}

///
/// ValueConvertError
///
/// Why a raw node value could not become an index key.
///

#[derive(Debug, ThisError)]
pub enum ValueConvertError {
    #[error("node value '{value}' cannot be converted to type {ty}")]
    Cast { ty: AtomicType, value: String },

    #[error("type {ty} with value '{value}' cannot be used as index key")]
    NotIndexable { ty: AtomicType, value: String },
}

impl From<ValueConvertError> for InternalError {
    fn from(err: ValueConvertError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Value, err.to_string())
    }
}

///
/// IndexableValue
///
/// Typed, totally ordered atomic value. Ordering is type tag first, then
/// value order; it matches the byte order of `serialize` within one type.
///

#[derive(Clone, Debug)]
pub enum IndexableValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl IndexableValue {
    /// Atomize `content` as `ty`.
    pub fn convert(ty: AtomicType, content: &str) -> Result<Self, ValueConvertError> {
        let cast_error = || ValueConvertError::Cast {
            ty,
            value: content.to_string(),
        };

        match ty {
            AtomicType::String => Ok(Self::String(content.to_string())),
            AtomicType::Integer => content
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| cast_error()),
            AtomicType::Double => {
                let value = parse_xs_double(content.trim()).ok_or_else(cast_error)?;
                if value.is_nan() {
                    return Err(ValueConvertError::NotIndexable {
                        ty,
                        value: content.to_string(),
                    });
                }

                Ok(Self::Double(canonical_zero(value)))
            }
            AtomicType::Boolean => match content.trim() {
                "true" | "1" => Ok(Self::Boolean(true)),
                "false" | "0" => Ok(Self::Boolean(false)),
                _ => Err(cast_error()),
            },
            AtomicType::UntypedAtomic => Err(ValueConvertError::NotIndexable {
                ty,
                value: content.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    #[must_use]
    pub const fn atomic_type(&self) -> AtomicType {
        match self {
            Self::Boolean(_) => AtomicType::Boolean,
            Self::Integer(_) => AtomicType::Integer,
            Self::Double(_) => AtomicType::Double,
            Self::String(_) => AtomicType::String,
        }
    }

    /// Serialize into an index key: `[collection:u16][type:u8][payload]`.
    #[must_use]
    pub fn serialize(&self, collection: CollectionId, case_sensitive: bool) -> Vec<u8> {
        ordered::encode_key(self, collection, case_sensitive)
    }
}

impl PartialEq for IndexableValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexableValue {}

impl PartialOrd for IndexableValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexableValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Double(a), Self::Double(b)) => {
                canonical_zero(*a).total_cmp(&canonical_zero(*b))
            }
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.atomic_type().tag().cmp(&other.atomic_type().tag()),
        }
    }
}

impl std::fmt::Display for IndexableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value}"),
        }
    }
}

// -0 and 0 are equal doubles; both order and key as 0.
pub(crate) fn canonical_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

// xs:double lexical space: decimal/scientific notation plus INF, -INF and NaN.
fn parse_xs_double(text: &str) -> Option<f64> {
    match text {
        "INF" | "+INF" => return Some(f64::INFINITY),
        "-INF" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }

    if text.is_empty()
        || !text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return None;
    }

    text.parse::<f64>().ok()
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{AtomicType, IndexableValue, ValueConvertError};
    use crate::model::CollectionId;

    #[test]
    fn convert_integer_trims_whitespace() {
        let value = IndexableValue::convert(AtomicType::Integer, " 42\n").expect("integer");

        assert_eq!(value, IndexableValue::Integer(42));
    }

    #[test]
    fn convert_rejects_malformed_integer() {
        let err = IndexableValue::convert(AtomicType::Integer, "forty-two")
            .expect_err("text is not an integer");

        assert!(matches!(err, ValueConvertError::Cast { .. }));
    }

    #[test]
    fn convert_double_accepts_xs_special_values() {
        assert_eq!(
            IndexableValue::convert(AtomicType::Double, "-INF").expect("-INF"),
            IndexableValue::Double(f64::NEG_INFINITY)
        );
        assert_eq!(
            IndexableValue::convert(AtomicType::Double, "1.5e3").expect("scientific"),
            IndexableValue::Double(1500.0)
        );
        assert!(IndexableValue::convert(AtomicType::Double, "infinity").is_err());
    }

    #[test]
    fn negative_zero_equals_zero() {
        let negative = IndexableValue::convert(AtomicType::Double, "-0").expect("-0");

        assert_eq!(negative, IndexableValue::Double(0.0));
        assert_eq!(IndexableValue::Double(-0.0), IndexableValue::Double(0.0));
        assert!(IndexableValue::Double(-0.0) > IndexableValue::Double(-1.0));
        assert_eq!(
            IndexableValue::Double(-0.0).serialize(CollectionId::new(1), true),
            IndexableValue::Double(0.0).serialize(CollectionId::new(1), true)
        );
    }

    #[test]
    fn convert_double_nan_is_not_indexable() {
        let err = IndexableValue::convert(AtomicType::Double, "NaN").expect_err("NaN");

        assert!(matches!(err, ValueConvertError::NotIndexable { .. }));
    }

    #[test]
    fn convert_boolean_lexical_forms() {
        assert_eq!(
            IndexableValue::convert(AtomicType::Boolean, "1").expect("1"),
            IndexableValue::Boolean(true)
        );
        assert_eq!(
            IndexableValue::convert(AtomicType::Boolean, "false").expect("false"),
            IndexableValue::Boolean(false)
        );
        assert!(IndexableValue::convert(AtomicType::Boolean, "yes").is_err());
    }

    #[test]
    fn untyped_values_are_not_indexable() {
        let err = IndexableValue::convert(AtomicType::UntypedAtomic, "abc").expect_err("untyped");

        assert!(matches!(err, ValueConvertError::NotIndexable { .. }));
        assert!(!AtomicType::UntypedAtomic.is_indexable());
        assert_eq!(AtomicType::from_tag(AtomicType::UntypedAtomic.tag()), None);
    }

    #[test]
    fn ordering_groups_by_type_before_value() {
        let mut values = vec![
            IndexableValue::string("a"),
            IndexableValue::Integer(7),
            IndexableValue::Boolean(true),
            IndexableValue::Integer(-3),
            IndexableValue::Double(0.5),
        ];
        values.sort();

        assert_eq!(
            values,
            vec![
                IndexableValue::Boolean(true),
                IndexableValue::Integer(-3),
                IndexableValue::Integer(7),
                IndexableValue::Double(0.5),
                IndexableValue::string("a"),
            ]
        );
    }
}
