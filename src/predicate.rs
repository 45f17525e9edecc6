//! The predicate algebra: immutable descriptions of single-property
//! search conditions.
//!
//! A [`Predicate`] is pure data — it performs no I/O and holds no handle
//! to the index. The [`crate::query`] module translates predicates into
//! executable backend queries; this module only describes them.
//!
//! Every predicate carries the id of the property it constrains. An index
//! covers exactly one property, so the key id is descriptive: it is not
//! validated against the index the predicate is executed on.

use std::hash::{Hash, Hasher};

use crate::types::{PropertyKeyId, PropertyValue};

/// A single-property search condition.
///
/// One variant per query kind the engine supports. Construct with the
/// factory methods ([`Predicate::exists`], [`Predicate::exact`], ...)
/// rather than struct literals.
///
/// Equality and hashing are structural over all fields (numeric bounds
/// compare by bit pattern so NaN bounds are self-equal). They exist for
/// testing and debugging and are never used on a query hot path.
#[derive(Clone, Debug)]
pub enum Predicate {
    /// Matches any entity with an entry on the property.
    Exists {
        /// The property this predicate constrains.
        property_key_id: PropertyKeyId,
    },

    /// Matches entities whose value is term-equal to `value`.
    Exact {
        /// The property this predicate constrains.
        property_key_id: PropertyKeyId,
        /// The value to search for.
        value: PropertyValue,
    },

    /// Matches numeric values inside the given interval.
    ///
    /// A `None` bound is unbounded on that side. Comparison follows
    /// IEEE-754 total ordering, under which NaN sorts above every other
    /// number; see [`crate::query`] for the exact consequences.
    NumericRange {
        /// The property this predicate constrains.
        property_key_id: PropertyKeyId,
        /// Lower bound, or `None` for unbounded.
        from: Option<f64>,
        /// Whether the lower bound itself matches.
        from_inclusive: bool,
        /// Upper bound, or `None` for unbounded.
        to: Option<f64>,
        /// Whether the upper bound itself matches.
        to_inclusive: bool,
    },

    /// Matches text values inside the given lexicographic interval.
    ///
    /// A `None` bound is unbounded on that side. The empty string is a
    /// real boundary value, distinct from unbounded.
    StringRange {
        /// The property this predicate constrains.
        property_key_id: PropertyKeyId,
        /// Lower bound, or `None` for unbounded.
        from: Option<String>,
        /// Whether the lower bound itself matches.
        from_inclusive: bool,
        /// Upper bound, or `None` for unbounded.
        to: Option<String>,
        /// Whether the upper bound itself matches.
        to_inclusive: bool,
    },

    /// Matches text values starting with `prefix` (literal, no wildcards).
    StringPrefix {
        /// The property this predicate constrains.
        property_key_id: PropertyKeyId,
        /// The literal prefix to search for.
        prefix: String,
    },

    /// Matches text values ending with `suffix` (literal, no wildcards).
    StringSuffix {
        /// The property this predicate constrains.
        property_key_id: PropertyKeyId,
        /// The literal suffix to search for.
        suffix: String,
    },

    /// Matches text values containing `contains` (literal, no wildcards).
    StringContains {
        /// The property this predicate constrains.
        property_key_id: PropertyKeyId,
        /// The literal substring to search for.
        contains: String,
    },
}

impl Predicate {
    /// Searches the index for all entries on the given property.
    pub fn exists(property_key_id: PropertyKeyId) -> Self {
        Self::Exists { property_key_id }
    }

    /// Searches the index for a certain value.
    pub fn exact(property_key_id: PropertyKeyId, value: impl Into<PropertyValue>) -> Self {
        Self::Exact {
            property_key_id,
            value: value.into(),
        }
    }

    /// Searches the index for numeric values between `from` and `to`.
    pub fn numeric_range(
        property_key_id: PropertyKeyId,
        from: Option<f64>,
        from_inclusive: bool,
        to: Option<f64>,
        to_inclusive: bool,
    ) -> Self {
        Self::NumericRange {
            property_key_id,
            from,
            from_inclusive,
            to,
            to_inclusive,
        }
    }

    /// Searches the index for string values between `from` and `to`.
    pub fn string_range(
        property_key_id: PropertyKeyId,
        from: Option<&str>,
        from_inclusive: bool,
        to: Option<&str>,
        to_inclusive: bool,
    ) -> Self {
        Self::StringRange {
            property_key_id,
            from: from.map(str::to_string),
            from_inclusive,
            to: to.map(str::to_string),
            to_inclusive,
        }
    }

    /// Searches the index for string values starting with `prefix`.
    pub fn string_prefix(property_key_id: PropertyKeyId, prefix: impl Into<String>) -> Self {
        Self::StringPrefix {
            property_key_id,
            prefix: prefix.into(),
        }
    }

    /// Searches the index for string values ending with `suffix`.
    pub fn string_suffix(property_key_id: PropertyKeyId, suffix: impl Into<String>) -> Self {
        Self::StringSuffix {
            property_key_id,
            suffix: suffix.into(),
        }
    }

    /// Searches the index for string values containing `contains`.
    pub fn string_contains(property_key_id: PropertyKeyId, contains: impl Into<String>) -> Self {
        Self::StringContains {
            property_key_id,
            contains: contains.into(),
        }
    }

    /// Returns the id of the property this predicate constrains.
    pub fn property_key_id(&self) -> PropertyKeyId {
        match self {
            Self::Exists { property_key_id }
            | Self::Exact {
                property_key_id, ..
            }
            | Self::NumericRange {
                property_key_id, ..
            }
            | Self::StringRange {
                property_key_id, ..
            }
            | Self::StringPrefix {
                property_key_id, ..
            }
            | Self::StringSuffix {
                property_key_id, ..
            }
            | Self::StringContains {
                property_key_id, ..
            } => *property_key_id,
        }
    }
}

// Optional f64 bounds block derived Eq/Hash, and derived PartialEq would
// make NaN bounds unequal to themselves. Structural equality compares
// numeric bounds by bit pattern instead.
fn bound_bits(bound: &Option<f64>) -> Option<u64> {
    bound.map(f64::to_bits)
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        use Predicate::*;
        match (self, other) {
            (
                Exists {
                    property_key_id: a,
                },
                Exists {
                    property_key_id: b,
                },
            ) => a == b,
            (
                Exact {
                    property_key_id: ka,
                    value: va,
                },
                Exact {
                    property_key_id: kb,
                    value: vb,
                },
            ) => ka == kb && va == vb,
            (
                NumericRange {
                    property_key_id: ka,
                    from: fa,
                    from_inclusive: fia,
                    to: ta,
                    to_inclusive: tia,
                },
                NumericRange {
                    property_key_id: kb,
                    from: fb,
                    from_inclusive: fib,
                    to: tb,
                    to_inclusive: tib,
                },
            ) => {
                ka == kb
                    && bound_bits(fa) == bound_bits(fb)
                    && fia == fib
                    && bound_bits(ta) == bound_bits(tb)
                    && tia == tib
            }
            (
                StringRange {
                    property_key_id: ka,
                    from: fa,
                    from_inclusive: fia,
                    to: ta,
                    to_inclusive: tia,
                },
                StringRange {
                    property_key_id: kb,
                    from: fb,
                    from_inclusive: fib,
                    to: tb,
                    to_inclusive: tib,
                },
            ) => ka == kb && fa == fb && fia == fib && ta == tb && tia == tib,
            (
                StringPrefix {
                    property_key_id: ka,
                    prefix: pa,
                },
                StringPrefix {
                    property_key_id: kb,
                    prefix: pb,
                },
            ) => ka == kb && pa == pb,
            (
                StringSuffix {
                    property_key_id: ka,
                    suffix: sa,
                },
                StringSuffix {
                    property_key_id: kb,
                    suffix: sb,
                },
            ) => ka == kb && sa == sb,
            (
                StringContains {
                    property_key_id: ka,
                    contains: ca,
                },
                StringContains {
                    property_key_id: kb,
                    contains: cb,
                },
            ) => ka == kb && ca == cb,
            _ => false,
        }
    }
}

impl Eq for Predicate {}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Predicate::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Exists { property_key_id } => property_key_id.hash(state),
            Exact {
                property_key_id,
                value,
            } => {
                property_key_id.hash(state);
                value.hash(state);
            }
            NumericRange {
                property_key_id,
                from,
                from_inclusive,
                to,
                to_inclusive,
            } => {
                property_key_id.hash(state);
                bound_bits(from).hash(state);
                from_inclusive.hash(state);
                bound_bits(to).hash(state);
                to_inclusive.hash(state);
            }
            StringRange {
                property_key_id,
                from,
                from_inclusive,
                to,
                to_inclusive,
            } => {
                property_key_id.hash(state);
                from.hash(state);
                from_inclusive.hash(state);
                to.hash(state);
                to_inclusive.hash(state);
            }
            StringPrefix {
                property_key_id,
                prefix,
            } => {
                property_key_id.hash(state);
                prefix.hash(state);
            }
            StringSuffix {
                property_key_id,
                suffix,
            } => {
                property_key_id.hash(state);
                suffix.hash(state);
            }
            StringContains {
                property_key_id,
                contains,
            } => {
                property_key_id.hash(state);
                contains.hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structural_equality() {
        assert_eq!(Predicate::exists(1), Predicate::exists(1));
        assert_ne!(Predicate::exists(1), Predicate::exists(2));

        assert_eq!(Predicate::exact(1, "a"), Predicate::exact(1, "a"));
        assert_ne!(Predicate::exact(1, "a"), Predicate::exact(1, "b"));
        assert_ne!(
            Predicate::exact(1, "a"),
            Predicate::exists(1),
            "different kinds are never equal"
        );
    }

    #[test]
    fn test_nan_bounds_are_self_equal() {
        let p1 = Predicate::numeric_range(1, Some(f64::NAN), true, Some(f64::NAN), true);
        let p2 = Predicate::numeric_range(1, Some(f64::NAN), true, Some(f64::NAN), true);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_inclusivity_is_part_of_identity() {
        let incl = Predicate::string_range(1, Some("a"), true, Some("b"), true);
        let excl = Predicate::string_range(1, Some("a"), false, Some("b"), true);
        assert_ne!(incl, excl);
    }

    #[test]
    fn test_empty_string_bound_distinct_from_unbounded() {
        let empty = Predicate::string_range(1, Some(""), true, None, false);
        let unbounded = Predicate::string_range(1, None, true, None, false);
        assert_ne!(empty, unbounded);
    }

    #[test]
    fn test_predicates_usable_in_hash_set() {
        let mut set = HashSet::new();
        set.insert(Predicate::exists(1));
        set.insert(Predicate::exists(1));
        set.insert(Predicate::exact(1, 5i64));
        set.insert(Predicate::numeric_range(1, Some(f64::NAN), true, None, false));
        set.insert(Predicate::numeric_range(1, Some(f64::NAN), true, None, false));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_property_key_id_accessor() {
        assert_eq!(Predicate::exists(7).property_key_id(), 7);
        assert_eq!(Predicate::string_prefix(3, "ab").property_key_id(), 3);
        assert_eq!(
            Predicate::numeric_range(9, None, false, None, false).property_key_id(),
            9
        );
    }
}
