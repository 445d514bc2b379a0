pub mod cache;
pub mod client;
pub mod nominatim;
pub mod overpass;

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Domain types, independent of the Nominatim/Overpass wire formats
// ---------------------------------------------------------------------------

/// Display name given to a court whose tags yield no usable label. The
/// enrichment pass only ever rewrites courts still carrying this exact value.
pub const UNNAMED_COURT: &str = "Unnamed Court";

/// A place resolved from free text by the geocoder. Never mutated once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Court {
    pub id: String, // "osm-<kind>-<numeric id>", stable across repeated queries
    pub name: Option<String>, // raw name tag only, None when the element has none
    pub display_name: String, // always non-empty, see UNNAMED_COURT
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub source: CourtSource,
    pub surface: Option<String>,
    pub lighting: bool,
    pub covered: bool,
    pub tags: HashMap<String, String>, // original tag set, preserved as-is
}

impl Court {
    /// Key used to collapse duplicate elements describing the same court:
    /// name (empty when absent) plus coordinates rounded to five decimals,
    /// roughly one meter.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{:.5}|{:.5}",
            self.name.as_deref().unwrap_or(""),
            self.latitude,
            self.longitude
        )
    }

    /// Link to the source element on openstreetmap.org, derived from `id`.
    pub fn osm_url(&self) -> Option<String> {
        let mut parts = self.id.splitn(3, '-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("osm"), Some(kind), Some(id)) => {
                Some(format!("https://www.openstreetmap.org/{kind}/{id}"))
            }
            _ => None,
        }
    }
}

/// Provenance of a court record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CourtSource {
    #[default]
    Osm,
}
