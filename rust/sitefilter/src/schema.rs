//! Column names of the property-listing table the engine relies on.

/// Column holding the per-row zone-code array. Single-value filters switch
/// to superset semantics on this column.
pub const ZONES_COLUMN: &str = "zones";

/// Categorical market-status column targeted by the implicit market-status
/// filter (for-sale / for-lease).
pub const CATEGORY_COLUMN: &str = "category";

/// Fixed projection returned for every property row. Acts as an allow-list:
/// the data query never selects beyond it.
pub const RESULT_COLUMNS: &[&str] = &[
    // listing details
    "id",
    "land_area_m2",
    "days_on_market",
    "listing_date",
    "agent_name",
    "agent_phone_number",
    "description",
    "property_images",
    "asking_price",
    "max_price_range",
    "address",
    "net_income",
    "yield_percentage",
    "sold_price",
    "sold_on",
    "lease_terms",
    // geocoordinates
    "latitude",
    "longitude",
    // filterable facets
    "property_type",
    "category",
    "area",
    "zones",
    "traffic_total",
    "overlays",
    // distance-to-POI columns
    "min_dist_to_kfc",
    "min_dist_to_mcdonalds",
    "distance_to_hj",
    "distance_to_gyg",
    "distance_to_grilld",
    "distance_to_cbd",
    "distance_to_redrooster",
    "distance_to_tram",
    "distance_to_train",
    "distance_to_primary",
    "distance_to_secondary",
];
