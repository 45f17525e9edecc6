//! Query translation: maps [`Predicate`]s onto the query model the
//! search backend executes.
//!
//! All type-specific comparison semantics live here, so backends stay
//! dumb filters:
//!
//! - Numeric comparison follows IEEE-754 total ordering
//!   ([`f64::total_cmp`]), under which NaN sorts above every other
//!   number. The observable consequences: a finite-to-NaN-inclusive
//!   range includes NaN values, a NaN-to-NaN inclusive range matches
//!   only NaN values, and a NaN-to-finite range matches nothing.
//! - String bounds are lexicographic; a `None` bound is unbounded and
//!   the empty string is a real boundary value.
//! - Prefix/suffix/contains match literally. Search-syntax characters
//!   like `*` have no special meaning, so a `contains("apa*")` query
//!   only matches values that literally contain `apa*`.
//!
//! Translation is a pure function; it never touches the index.

use std::cmp::Ordering;

use crate::error::{Result, StrataError};
use crate::predicate::Predicate;
use crate::types::{EntityId, IndexEntry, PropertyValue};

/// A translated query, ready for the search backend to execute.
///
/// This is a closed model: backends execute it by filtering entries
/// through [`BackendQuery::matches`] (or something smarter with the same
/// semantics), never by interpreting pattern syntax.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendQuery {
    /// Matches every entry (the scan behind `Exists`).
    MatchAll,
    /// Matches entries whose value is term-equal to the given term.
    Term(PropertyValue),
    /// Matches numeric entries inside the interval, under total ordering.
    NumericRange {
        /// Lower bound, or `None` for unbounded.
        from: Option<f64>,
        /// Whether the lower bound itself matches.
        from_inclusive: bool,
        /// Upper bound, or `None` for unbounded.
        to: Option<f64>,
        /// Whether the upper bound itself matches.
        to_inclusive: bool,
    },
    /// Matches text entries inside the lexicographic interval.
    StringRange {
        /// Lower bound, or `None` for unbounded.
        from: Option<String>,
        /// Whether the lower bound itself matches.
        from_inclusive: bool,
        /// Upper bound, or `None` for unbounded.
        to: Option<String>,
        /// Whether the upper bound itself matches.
        to_inclusive: bool,
    },
    /// Matches text entries starting with the literal prefix.
    StringPrefix(String),
    /// Matches text entries ending with the literal suffix.
    StringSuffix(String),
    /// Matches text entries containing the literal substring.
    StringContains(String),
    /// Matches entries belonging to one entity.
    EntityTerm(EntityId),
    /// Matches entries satisfying every sub-query (boolean AND).
    And(Vec<BackendQuery>),
}

/// Translates a predicate list into a backend query.
///
/// Exactly one predicate is supported per lookup. Passing zero or more
/// than one fails fast with [`StrataError::UnsupportedQuery`] rather than
/// silently executing a subset.
pub fn translate(predicates: &[Predicate]) -> Result<BackendQuery> {
    let predicate = match predicates {
        [single] => single,
        [] => {
            return Err(StrataError::unsupported_query(
                "at least one predicate is required",
            ))
        }
        _ => {
            return Err(StrataError::unsupported_query(
                "composite queries are not yet supported",
            ))
        }
    };

    Ok(match predicate {
        Predicate::Exists { .. } => BackendQuery::MatchAll,
        Predicate::Exact { value, .. } => BackendQuery::Term(value.clone()),
        Predicate::NumericRange {
            from,
            from_inclusive,
            to,
            to_inclusive,
            ..
        } => BackendQuery::NumericRange {
            from: *from,
            from_inclusive: *from_inclusive,
            to: *to,
            to_inclusive: *to_inclusive,
        },
        Predicate::StringRange {
            from,
            from_inclusive,
            to,
            to_inclusive,
            ..
        } => BackendQuery::StringRange {
            from: from.clone(),
            from_inclusive: *from_inclusive,
            to: to.clone(),
            to_inclusive: *to_inclusive,
        },
        Predicate::StringPrefix { prefix, .. } => BackendQuery::StringPrefix(prefix.clone()),
        Predicate::StringSuffix { suffix, .. } => BackendQuery::StringSuffix(suffix.clone()),
        Predicate::StringContains { contains, .. } => {
            BackendQuery::StringContains(contains.clone())
        }
    })
}

impl BackendQuery {
    /// Builds the entity-AND-value conjunction used by exact-match
    /// counting: one entity term, one value term, both required.
    pub fn exact_match_count(entity_id: EntityId, value: &PropertyValue) -> Self {
        BackendQuery::And(vec![
            BackendQuery::EntityTerm(entity_id),
            BackendQuery::Term(value.clone()),
        ])
    }

    /// Returns true if the entry satisfies this query.
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        match self {
            Self::MatchAll => true,
            Self::Term(term) => entry.value.term_eq(term),
            Self::NumericRange {
                from,
                from_inclusive,
                to,
                to_inclusive,
            } => match entry.value.as_number() {
                Some(n) => {
                    in_bound(from.map(|b| n.total_cmp(&b)), *from_inclusive, true)
                        && in_bound(to.map(|b| n.total_cmp(&b)), *to_inclusive, false)
                }
                None => false,
            },
            Self::StringRange {
                from,
                from_inclusive,
                to,
                to_inclusive,
            } => match entry.value.as_text() {
                Some(s) => {
                    in_bound(
                        from.as_deref().map(|b| s.cmp(b)),
                        *from_inclusive,
                        true,
                    ) && in_bound(to.as_deref().map(|b| s.cmp(b)), *to_inclusive, false)
                }
                None => false,
            },
            Self::StringPrefix(prefix) => entry
                .value
                .as_text()
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Self::StringSuffix(suffix) => entry
                .value
                .as_text()
                .is_some_and(|s| s.ends_with(suffix.as_str())),
            Self::StringContains(contains) => entry
                .value
                .as_text()
                .is_some_and(|s| s.contains(contains.as_str())),
            Self::EntityTerm(entity_id) => entry.entity_id == *entity_id,
            Self::And(queries) => queries.iter().all(|q| q.matches(entry)),
        }
    }
}

/// Checks one side of an interval. `ordering` is the value compared to
/// the bound, `None` when that side is unbounded; `lower` selects which
/// direction is in-range.
fn in_bound(ordering: Option<Ordering>, inclusive: bool, lower: bool) -> bool {
    match ordering {
        None => true,
        Some(Ordering::Equal) => inclusive,
        Some(Ordering::Greater) => lower,
        Some(Ordering::Less) => !lower,
    }
}
