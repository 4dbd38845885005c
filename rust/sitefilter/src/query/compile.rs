//! Predicate compilers: one pure function per filter kind.
//!
//! Each compiler turns a validated descriptor into the atomic predicates the
//! store understands. An empty result means the filter is a no-op (nothing
//! is added to the accumulator). Compilers never talk to the store; failure
//! handling against live schema lives in the pipeline.

use crate::{
    descriptor::{
        DistanceToPoiPayload, FilterDescriptor, FilterKind, RangePayload, SingleValuePayload,
        SupplyDemandRatioPayload, ZonePayload,
    },
    predicate::Predicate,
    schema,
};
use tracing::warn;

pub fn compile(descriptor: &FilterDescriptor) -> Vec<Predicate> {
    // Column presence for the kinds that need one is enforced at descriptor
    // validation; the fallback here keeps the pipeline permissive regardless.
    let column = descriptor.column.as_deref();

    match (&descriptor.kind, column) {
        (FilterKind::Range(payload), Some(column)) => range(column, payload),
        (FilterKind::Zone(payload), Some(column)) => zone(column, payload),
        (FilterKind::SingleValue(payload), Some(column)) => single_value(column, payload),
        (FilterKind::ExactMatch(payload), Some(column)) => exact_match(column, &payload.value),
        (FilterKind::SupplyDemandRatio(payload), Some(column)) => {
            supply_demand_ratio(column, payload)
        }
        (FilterKind::DistanceToPoi(payload), _) => distance_to_poi(payload),
        (kind, None) => {
            warn!(filter = kind.label(), "filter has no target column, skipping");
            Vec::new()
        }
    }
}

/// `min`/`max` are independently optional; both bounds are inclusive.
fn range(column: &str, payload: &RangePayload) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    if let Some(min) = payload.min {
        predicates.push(Predicate::Gte {
            column: column.to_string(),
            value: min,
        });
    }
    if let Some(max) = payload.max {
        predicates.push(Predicate::Lte {
            column: column.to_string(),
            value: max,
        });
    }
    predicates
}

/// Matches rows whose zone array shares at least one code with the request
/// (OR across requested values). Codes are normalized to uppercase to match
/// the stored format.
fn zone(column: &str, payload: &ZonePayload) -> Vec<Predicate> {
    if payload.values.is_empty() {
        return Vec::new();
    }

    vec![Predicate::Overlaps {
        column: column.to_string(),
        values: payload
            .values
            .iter()
            .map(|value| value.to_uppercase())
            .collect(),
    }]
}

/// Dual semantics by column identity: on the zones array column the row must
/// contain every requested value (superset); on any scalar column the value
/// must case-insensitively contain every requested token (a conjunction of
/// substring matches).
fn single_value(column: &str, payload: &SingleValuePayload) -> Vec<Predicate> {
    if payload.values.is_empty() {
        return Vec::new();
    }

    if column == schema::ZONES_COLUMN {
        vec![Predicate::ContainsAll {
            column: column.to_string(),
            values: payload
                .values
                .iter()
                .map(|value| value.to_uppercase())
                .collect(),
        }]
    } else {
        payload
            .values
            .iter()
            .map(|value| Predicate::IlikeContains {
                column: column.to_string(),
                needle: value.clone(),
            })
            .collect()
    }
}

/// Splits the raw value on commas: one token is exact equality, several are
/// a membership test. Never a substring match, so "for-sale" cannot match a
/// stored "for-sale, for-lease".
pub fn exact_match(column: &str, raw: &str) -> Vec<Predicate> {
    let tokens: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();

    match tokens.as_slice() {
        [] => Vec::new(),
        [token] => vec![Predicate::Eq {
            column: column.to_string(),
            value: (*token).to_string(),
        }],
        tokens => vec![Predicate::EqAny {
            column: column.to_string(),
            values: tokens.iter().map(|token| (*token).to_string()).collect(),
        }],
    }
}

/// Each entry excludes the 0.0 "distance not computed" sentinel, then bounds
/// the distance from the requested side. Incomplete entries are skipped
/// individually.
fn distance_to_poi(payload: &DistanceToPoiPayload) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    for entry in &payload.values {
        let (Some(column), Some(threshold)) = (entry.target_column.as_deref(), entry.value) else {
            warn!("distance filter entry missing column or threshold, skipping entry");
            continue;
        };

        predicates.push(Predicate::NeNumber {
            column: column.to_string(),
            value: 0.0,
        });
        predicates.push(if entry.is_closer_to {
            Predicate::Lte {
                column: column.to_string(),
                value: threshold,
            }
        } else {
            Predicate::Gte {
                column: column.to_string(),
                value: threshold,
            }
        });
    }
    predicates
}

fn supply_demand_ratio(column: &str, payload: &SupplyDemandRatioPayload) -> Vec<Predicate> {
    if payload.is_higher_than {
        vec![Predicate::Gte {
            column: column.to_string(),
            value: payload.value,
        }]
    } else {
        vec![Predicate::Lte {
            column: column.to_string(),
            value: payload.value,
        }]
    }
}
