/// Provider name constants to ensure consistency across the codebase.
/// These names appear in `SourceAttribution`, per-provider counts, and the
/// scoring configuration, so they must never drift between modules.

pub const YELP_PROVIDER: &str = "yelp";
pub const GOOGLE_PLACES_PROVIDER: &str = "google_places";
pub const OPENSTREETMAP_PROVIDER: &str = "openstreetmap";

/// Display names used in API responses and source attribution
pub const YELP_DISPLAY_NAME: &str = "Yelp";
pub const GOOGLE_PLACES_DISPLAY_NAME: &str = "Google Places";
pub const OPENSTREETMAP_DISPLAY_NAME: &str = "OpenStreetMap";

/// Meters per mile, used for radius conversions throughout
pub const METERS_PER_MILE: f64 = 1609.34;

/// Convert internal provider name to display name used in attribution
pub fn provider_display_name(provider: &str) -> String {
    match provider {
        YELP_PROVIDER => YELP_DISPLAY_NAME.to_string(),
        GOOGLE_PLACES_PROVIDER => GOOGLE_PLACES_DISPLAY_NAME.to_string(),
        OPENSTREETMAP_PROVIDER => OPENSTREETMAP_DISPLAY_NAME.to_string(),
        other => other.to_string(),
    }
}

/// Get all supported provider names
pub fn get_supported_providers() -> Vec<&'static str> {
    vec![YELP_PROVIDER, GOOGLE_PLACES_PROVIDER, OPENSTREETMAP_PROVIDER]
}
