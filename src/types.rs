//! Core type definitions for index entries and property values.
//!
//! The index maps property values to entity identifiers. Entity ids are
//! plain `u64` handles assigned by the host database; the engine never
//! generates or interprets them.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifier of an indexed entity, assigned by the host database.
pub type EntityId = u64;

/// Identifier of the property a predicate constrains.
///
/// An index covers exactly one property, so the key id carried by a
/// predicate is descriptive rather than checked against stored entries.
pub type PropertyKeyId = u32;

/// A single indexed property value.
///
/// Values are either numeric (stored as `f64`, which covers the host's
/// integer and floating point properties) or text. Equality between a
/// query term and a stored value uses [`PropertyValue::term_eq`];
/// the derived-style `PartialEq`/`Hash` impls below are structural
/// (bit-pattern for numbers) so values can live in hash sets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PropertyValue {
    /// A numeric property value.
    Number(f64),
    /// A text property value.
    Text(String),
}

impl PropertyValue {
    /// Creates a numeric value.
    #[inline]
    pub fn number(n: impl Into<f64>) -> Self {
        Self::Number(n.into())
    }

    /// Creates a text value.
    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Term equality between a stored value and a query term.
    ///
    /// Numbers compare under IEEE-754 total ordering, so NaN is equal to
    /// itself and -0.0 and +0.0 are distinct index terms. Values of
    /// different kinds are never equal.
    pub fn term_eq(&self, other: &PropertyValue) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b) == Ordering::Equal,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }

    /// Returns the numeric value, if this is a number.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Returns the text value, if this is text.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

// Structural equality: numbers compare by bit pattern so that NaN == NaN
// and the impl can be Eq + Hash. Used by the sampler's distinct-value set
// and by predicate equality in tests, never on a query hot path.
impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Number(n) => {
                state.write_u8(0);
                state.write_u64(n.to_bits());
            }
            Self::Text(s) => {
                state.write_u8(1);
                s.hash(state);
            }
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// A single index posting: one entity carrying one property value.
///
/// An entity appears once per value it carries on the indexed property,
/// so the same id can occur in multiple entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// The entity this entry refers to.
    pub entity_id: EntityId,
    /// The indexed value.
    pub value: PropertyValue,
}

impl IndexEntry {
    /// Creates an entry for the given entity and value.
    pub fn new(entity_id: EntityId, value: impl Into<PropertyValue>) -> Self {
        Self {
            entity_id,
            value: value.into(),
        }
    }
}

/// Unix timestamp in milliseconds, used by persisted index metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Returns the current time.
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the Unix epoch.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_term_eq_numbers() {
        assert!(PropertyValue::number(1.5).term_eq(&PropertyValue::number(1.5)));
        assert!(!PropertyValue::number(1.5).term_eq(&PropertyValue::number(2.5)));
    }

    #[test]
    fn test_term_eq_nan_is_self_equal() {
        let nan = PropertyValue::Number(f64::NAN);
        assert!(nan.term_eq(&PropertyValue::Number(f64::NAN)));
    }

    #[test]
    fn test_term_eq_signed_zero_distinct() {
        let pos = PropertyValue::Number(0.0);
        let neg = PropertyValue::Number(-0.0);
        assert!(!pos.term_eq(&neg));
        assert!(pos.term_eq(&PropertyValue::Number(0.0)));
    }

    #[test]
    fn test_term_eq_cross_kind_never_matches() {
        assert!(!PropertyValue::text("1").term_eq(&PropertyValue::number(1.0)));
    }

    #[test]
    fn test_structural_eq_and_hash_in_set() {
        let mut set = HashSet::new();
        set.insert(PropertyValue::Number(f64::NAN));
        set.insert(PropertyValue::Number(f64::NAN));
        set.insert(PropertyValue::text("a"));
        set.insert(PropertyValue::text("a"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_entry_serialization_roundtrip() {
        let entry = IndexEntry::new(42, "value");
        let bytes = bincode::serialize(&entry).unwrap();
        let restored: IndexEntry = bincode::deserialize(&bytes).unwrap();
        assert_eq!(entry, restored);
    }

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_millis(1000);
        let t2 = Timestamp::from_millis(2000);
        assert!(t1 < t2);
        assert_eq!(t1.as_millis(), 1000);
    }
}
