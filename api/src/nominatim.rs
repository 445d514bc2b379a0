/// Wire types for the Nominatim geocoding API.
/// Endpoints: https://nominatim.openstreetmap.org/search and /reverse
use serde::Deserialize;

/// One candidate from the place-search endpoint. Nominatim serializes
/// coordinates as decimal strings, not numbers.
#[derive(Deserialize, Default, Debug)]
pub struct SearchPlace {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: String,
}

/// Response body from the reverse endpoint. Both fields are absent when the
/// coordinate resolves to nothing (Nominatim answers with an `error` object).
#[derive(Deserialize, Default, Debug)]
pub struct ReversePlace {
    pub name: Option<String>,
    pub display_name: Option<String>,
}
