//! Typed filter descriptor model for the property search surface.
//!
//! Incoming filters arrive as loosely-typed `{filter_type, db_column_name,
//! filter_data}` objects; this module turns each one into a closed tagged
//! union so the rest of the engine can dispatch with an exhaustive match.
//! Validation here is structural only: required keys and primitive types.
//! Business rules (e.g. `min <= max`) are deliberately not checked.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Wire shape of one requested filter, as stored per project and posted by
/// the frontend.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterInput {
    pub filter_type: String,
    #[serde(default)]
    pub db_column_name: Option<String>,
    #[serde(default)]
    pub filter_data: Value,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub is_open: bool,
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("unknown filter type '{0}'")]
    UnknownKind(String),

    #[error("{kind} filter requires db_column_name")]
    MissingColumn { kind: &'static str },

    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: &'static str, reason: String },
}

/// A validated filter instance. `column` is the store column the filter
/// targets; it is `None` only for multi-column kinds (distance-to-POI, which
/// names its columns per entry).
#[derive(Debug, Clone)]
pub struct FilterDescriptor {
    pub kind: FilterKind,
    pub column: Option<String>,
    /// UI ordering, carried through untouched.
    pub display_order: i32,
    /// UI open/collapsed state, carried through untouched.
    pub is_open: bool,
}

#[derive(Debug, Clone)]
pub enum FilterKind {
    Range(RangePayload),
    Zone(ZonePayload),
    SingleValue(SingleValuePayload),
    ExactMatch(ExactMatchPayload),
    DistanceToPoi(DistanceToPoiPayload),
    SupplyDemandRatio(SupplyDemandRatioPayload),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangePayload {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZonePayload {
    /// Zone codes to match. Older stored filters used a `zones` key.
    #[serde(default, alias = "zones")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SingleValuePayload {
    #[serde(default)]
    pub values: Vec<String>,
}

/// Exact-match value; possibly comma-separated ("for-sale, for-lease" means
/// membership in either).
#[derive(Debug, Clone)]
pub struct ExactMatchPayload {
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistanceToPoiPayload {
    #[serde(default)]
    pub values: Vec<PoiConstraint>,
}

/// One distance constraint against a POI distance column. Fields stay
/// optional here: a structurally incomplete entry is skipped at compile time
/// rather than rejecting the whole descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct PoiConstraint {
    #[serde(default)]
    pub target_column: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(
        rename = "isCloserTo",
        alias = "is_closer_to",
        default = "default_closer_to"
    )]
    pub is_closer_to: bool,
}

const fn default_closer_to() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplyDemandRatioPayload {
    pub is_higher_than: bool,
    pub value: f64,
}

/// `filter_data` for exact-match filters is either a bare string or a
/// `{"value": ...}` object, depending on which frontend wrote it.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExactMatchWire {
    Bare(String),
    Keyed { value: String },
}

impl FilterDescriptor {
    /// Validates one wire filter into a typed descriptor. Kind matching is
    /// case-insensitive.
    pub fn from_input(input: FilterInput) -> Result<Self, DescriptorError> {
        let FilterInput {
            filter_type,
            db_column_name,
            filter_data,
            order,
            is_open,
        } = input;

        let kind = match filter_type.to_lowercase().as_str() {
            "range" => FilterKind::Range(parse_payload("range", filter_data)?),
            "zone" => FilterKind::Zone(parse_payload("zone", filter_data)?),
            "single_value" => FilterKind::SingleValue(parse_payload("single_value", filter_data)?),
            "exact_match" => {
                let wire: ExactMatchWire = serde_json::from_value(filter_data).map_err(|err| {
                    DescriptorError::MalformedPayload {
                        kind: "exact_match",
                        reason: err.to_string(),
                    }
                })?;
                let value = match wire {
                    ExactMatchWire::Bare(value) | ExactMatchWire::Keyed { value } => value,
                };
                FilterKind::ExactMatch(ExactMatchPayload { value })
            }
            "distance_to_poi" => {
                FilterKind::DistanceToPoi(parse_payload("distance_to_poi", filter_data)?)
            }
            "supply_demand_ratio" => {
                FilterKind::SupplyDemandRatio(parse_payload("supply_demand_ratio", filter_data)?)
            }
            _ => return Err(DescriptorError::UnknownKind(filter_type)),
        };

        if kind.requires_column() && db_column_name.is_none() {
            return Err(DescriptorError::MissingColumn { kind: kind.label() });
        }

        Ok(Self {
            kind,
            column: db_column_name,
            display_order: order,
            is_open,
        })
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

impl FilterKind {
    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::Range(_) => "range",
            FilterKind::Zone(_) => "zone",
            FilterKind::SingleValue(_) => "single_value",
            FilterKind::ExactMatch(_) => "exact_match",
            FilterKind::DistanceToPoi(_) => "distance_to_poi",
            FilterKind::SupplyDemandRatio(_) => "supply_demand_ratio",
        }
    }

    fn requires_column(&self) -> bool {
        !matches!(self, FilterKind::DistanceToPoi(_))
    }
}

fn parse_payload<T>(kind: &'static str, data: Value) -> Result<T, DescriptorError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(data).map_err(|err| DescriptorError::MalformedPayload {
        kind,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(filter_type: &str, column: Option<&str>, data: Value) -> FilterInput {
        FilterInput {
            filter_type: filter_type.to_string(),
            db_column_name: column.map(str::to_string),
            filter_data: data,
            order: 0,
            is_open: false,
        }
    }

    #[test]
    fn range_kind_is_case_insensitive() {
        let descriptor = FilterDescriptor::from_input(input(
            "RANGE",
            Some("asking_price"),
            json!({"min": 10.0}),
        ))
        .expect("uppercase kind should validate");

        match descriptor.kind {
            FilterKind::Range(payload) => {
                assert_eq!(payload.min, Some(10.0));
                assert_eq!(payload.max, None);
            }
            other => panic!("expected range kind, got {other:?}"),
        }
    }

    #[test]
    fn range_without_column_is_rejected() {
        let err = FilterDescriptor::from_input(input("range", None, json!({"min": 1.0})))
            .expect_err("range requires a column");
        assert!(matches!(err, DescriptorError::MissingColumn { kind: "range" }));
    }

    #[test]
    fn range_with_non_numeric_bound_is_rejected() {
        let err = FilterDescriptor::from_input(input(
            "range",
            Some("asking_price"),
            json!({"min": "cheap"}),
        ))
        .expect_err("string bound is structurally invalid");
        assert!(matches!(
            err,
            DescriptorError::MalformedPayload { kind: "range", .. }
        ));
    }

    #[test]
    fn zone_accepts_legacy_zones_key() {
        let descriptor = FilterDescriptor::from_input(input(
            "zone",
            Some("zones"),
            json!({"zones": ["z1", "z2"]}),
        ))
        .expect("legacy key should validate");

        match descriptor.kind {
            FilterKind::Zone(payload) => assert_eq!(payload.values, vec!["z1", "z2"]),
            other => panic!("expected zone kind, got {other:?}"),
        }
    }

    #[test]
    fn exact_match_accepts_bare_string_and_object() {
        for data in [json!("for-sale"), json!({"value": "for-sale"})] {
            let descriptor = FilterDescriptor::from_input(input("exact_match", Some("category"), data))
                .expect("both wire forms should validate");
            match descriptor.kind {
                FilterKind::ExactMatch(payload) => assert_eq!(payload.value, "for-sale"),
                other => panic!("expected exact_match kind, got {other:?}"),
            }
        }
    }

    #[test]
    fn distance_to_poi_needs_no_column_and_defaults_direction() {
        let descriptor = FilterDescriptor::from_input(input(
            "distance_to_poi",
            None,
            json!({"values": [{"target_column": "distance_to_train", "value": 1500.0}]}),
        ))
        .expect("distance_to_poi is valid without db_column_name");

        match descriptor.kind {
            FilterKind::DistanceToPoi(payload) => {
                assert_eq!(payload.values.len(), 1);
                assert!(payload.values[0].is_closer_to);
            }
            other => panic!("expected distance_to_poi kind, got {other:?}"),
        }
    }

    #[test]
    fn supply_demand_ratio_requires_both_fields() {
        let err = FilterDescriptor::from_input(input(
            "supply_demand_ratio",
            Some("childcare_ratio"),
            json!({"value": 1.2}),
        ))
        .expect_err("missing is_higher_than is structurally invalid");
        assert!(matches!(
            err,
            DescriptorError::MalformedPayload {
                kind: "supply_demand_ratio",
                ..
            }
        ));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = FilterDescriptor::from_input(input("frontage", Some("frontage"), json!({})))
            .expect_err("unknown kind must not validate");
        assert!(matches!(err, DescriptorError::UnknownKind(kind) if kind == "frontage"));
    }
}
