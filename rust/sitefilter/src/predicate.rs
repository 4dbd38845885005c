//! Atomic store conditions emitted by the predicate compilers.
//!
//! The pipeline accumulates these into an immutable list; the count and data
//! queries are both materialized from the same list, so they cannot drift
//! apart. Conjunction across predicates is implicit (every predicate must
//! hold); any OR semantics live inside a single variant (`EqAny`,
//! `Overlaps`).

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// column >= value
    Gte { column: String, value: f64 },
    /// column <= value
    Lte { column: String, value: f64 },
    /// column <> value; used to exclude the 0.0 "distance not computed"
    /// sentinel on POI columns.
    NeNumber { column: String, value: f64 },
    /// column = value (exact, never a substring match)
    Eq { column: String, value: String },
    /// column equals any of the values
    EqAny { column: String, values: Vec<String> },
    /// column case-insensitively contains the needle
    IlikeContains { column: String, needle: String },
    /// array column is a superset of the values
    ContainsAll { column: String, values: Vec<String> },
    /// array column shares at least one element with the values
    Overlaps { column: String, values: Vec<String> },
}

impl Predicate {
    /// The store column this condition reads.
    pub fn column(&self) -> &str {
        match self {
            Predicate::Gte { column, .. }
            | Predicate::Lte { column, .. }
            | Predicate::NeNumber { column, .. }
            | Predicate::Eq { column, .. }
            | Predicate::EqAny { column, .. }
            | Predicate::IlikeContains { column, .. }
            | Predicate::ContainsAll { column, .. }
            | Predicate::Overlaps { column, .. } => column,
        }
    }
}
