/// Wire types for the Overpass map-query API.
/// Endpoint: https://overpass-api.de/api/interpreter
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Deserialize, Default, Debug)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Deserialize, Default, Debug)]
pub struct OverpassElement {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Nodes carry their own position; ways and relations only carry a
    /// `center` when the query asks for one (`out center`).
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<Center>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Deserialize, Default, Debug, Clone, Copy)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

/// OSM element kinds as spelled in the wire `type` field.
#[derive(Deserialize, Default, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    #[default]
    Node,
    Way,
    Relation,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        };
        write!(f, "{kind}")
    }
}
