use crate::cache::TtlCache;
use crate::nominatim::{ReversePlace, SearchPlace};
use crate::overpass::{OverpassElement, OverpassResponse};
use crate::{Court, CourtSource, GeocodeResult, UNNAMED_COURT};
use log::debug;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type ApiResult<T> = Result<T, ApiError>;

pub const NOMINATIM_BASE: &str = "https://nominatim.openstreetmap.org";
pub const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Radius used when the caller has no preference, in meters.
pub const DEFAULT_RADIUS_M: u32 = 20_000;

const USER_AGENT: &str = "courtfinder/0.1 (pickleball court search)";
const GEOCODE_TIMEOUT: Duration = Duration::from_secs(15);
const OVERPASS_TIMEOUT: Duration = Duration::from_secs(25);
const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const GEOCODE_CACHE_CAP: usize = 256;
const REVERSE_CACHE_CAP: usize = 512;
const COURT_CACHE_CAP: usize = 64;

/// Reverse lookups per court search are capped to keep latency and Nominatim
/// load bounded no matter how many unnamed courts come back.
const MAX_ENRICH_CLUSTERS: usize = 8;

/// Court search client backed by the public Nominatim and Overpass APIs.
///
/// All three lookup classes (geocode, reverse geocode, court search) are
/// cached for a week with lazy expiry. Clones share the underlying connection
/// pool and caches.
#[derive(Debug, Clone)]
pub struct CourtsApi {
    client: Client,
    nominatim_base: String,
    overpass_url: String,
    geocode_timeout: Duration,
    overpass_timeout: Duration,
    geocode_cache: Arc<TtlCache<GeocodeResult>>,
    reverse_cache: Arc<TtlCache<String>>,
    court_cache: Arc<TtlCache<Vec<Court>>>,
}

impl Default for CourtsApi {
    fn default() -> Self {
        Self::with_endpoints(NOMINATIM_BASE, OVERPASS_URL)
    }
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    Timeout(String),
    Cancelled,
    Other(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::Timeout(url) => write!(f, "Timed out waiting for {url}"),
            ApiError::Cancelled => write!(f, "Request cancelled"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl ApiError {
    /// True for caller-initiated aborts, which callers swallow rather than
    /// surface to the user.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

impl CourtsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client against alternate endpoints, for self-hosted Nominatim
    /// or Overpass instances. `overpass_url` is the full interpreter URL.
    pub fn with_endpoints(nominatim_base: &str, overpass_url: &str) -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            nominatim_base: nominatim_base.trim_end_matches('/').to_owned(),
            overpass_url: overpass_url.to_owned(),
            geocode_timeout: GEOCODE_TIMEOUT,
            overpass_timeout: OVERPASS_TIMEOUT,
            geocode_cache: Arc::new(TtlCache::new(CACHE_TTL, GEOCODE_CACHE_CAP)),
            reverse_cache: Arc::new(TtlCache::new(CACHE_TTL, REVERSE_CACHE_CAP)),
            court_cache: Arc::new(TtlCache::new(CACHE_TTL, COURT_CACHE_CAP)),
        }
    }

    /// Resolve a free-text place description to coordinates.
    ///
    /// `Ok(None)` means the geocoder had no candidate for the query: a valid
    /// "not found", distinct from transport failure and never cached. Hits are
    /// cached by the trimmed, lowercased query; the original text is what goes
    /// on the wire.
    pub async fn geocode(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<Option<GeocodeResult>> {
        let cache_key = query.trim().to_lowercase();
        if let Some(hit) = self.geocode_cache.get(&cache_key) {
            debug!("geocode cache hit for {cache_key:?}");
            return Ok(Some(hit));
        }

        let url = format!("{}/search", self.nominatim_base);
        let request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[("q", query), ("format", "json"), ("limit", "1")]);
        let response = self.send(request, self.geocode_timeout, &url, cancel).await?;
        let response = response
            .error_for_status()
            .map_err(|e| ApiError::Api(e, url.clone()))?;

        let places: Vec<SearchPlace> = response
            .json()
            .await
            .map_err(|e| ApiError::Parsing(e, url))?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let resolved = GeocodeResult {
            lat: parse_coordinate(&place.lat)?,
            lon: parse_coordinate(&place.lon)?,
            display_name: place.display_name,
        };
        self.geocode_cache.insert(cache_key, resolved.clone());
        Ok(Some(resolved))
    }

    /// Resolve a coordinate to a short place label, best effort.
    ///
    /// Lookups cluster to three decimal places (~100 m). A non-2xx response
    /// yields `Ok(None)` so enrichment can carry on without it; only non-empty
    /// labels are cached.
    pub async fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<Option<String>> {
        let cache_key = cluster_key(lat, lon);
        if let Some(hit) = self.reverse_cache.get(&cache_key) {
            return Ok(Some(hit));
        }

        let url = format!("{}/reverse", self.nominatim_base);
        let request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".to_owned()),
                ("zoom", "16".to_owned()),
                ("addressdetails", "1".to_owned()),
            ]);
        let response = self.send(request, self.geocode_timeout, &url, cancel).await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let place: ReversePlace = response
            .json()
            .await
            .map_err(|e| ApiError::Parsing(e, url))?;
        let label = place_label(place);
        if let Some(label) = &label {
            self.reverse_cache.insert(cache_key, label.clone());
        }
        Ok(label)
    }

    /// Search for pickleball courts within `radius_m` meters of a coordinate.
    ///
    /// Raw elements are mapped into normalized records, deduplicated by name
    /// and rounded position, and unnamed courts are enriched with a reverse
    /// geocoded place label where one can be found. Results are cached by
    /// coordinate rounded to two decimals (~1.1 km) plus the radius.
    pub async fn fetch_courts(
        &self,
        lat: f64,
        lon: f64,
        radius_m: u32,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<Vec<Court>> {
        let cache_key = format!("{lat:.2}|{lon:.2}|{radius_m}");
        if let Some(hit) = self.court_cache.get(&cache_key) {
            debug!("court cache hit for {cache_key}");
            return Ok(hit);
        }

        let url = self.overpass_url.clone();
        let request = self
            .client
            .post(&url)
            .form(&[("data", overpass_query(lat, lon, radius_m))]);
        let response = self.send(request, self.overpass_timeout, &url, cancel).await?;
        let response = response
            .error_for_status()
            .map_err(|e| ApiError::Api(e, url.clone()))?;
        let raw: OverpassResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parsing(e, url))?;

        let mut courts = dedup_courts(raw.elements.into_iter().filter_map(map_element));
        self.enrich_unnamed(&mut courts, cancel).await;
        self.court_cache.insert(cache_key, courts.clone());
        Ok(courts)
    }

    /// Drop all cached forward and reverse geocode lookups.
    pub fn clear_geocode_caches(&self) {
        self.geocode_cache.clear();
        self.reverse_cache.clear();
    }

    /// Drop all cached court search results.
    pub fn clear_court_cache(&self) {
        self.court_cache.clear();
    }

    /// Reverse geocode up to MAX_ENRICH_CLUSTERS coordinate clusters of
    /// unnamed courts and rewrite their display names with the place label
    /// found. A failed lookup skips its cluster; cancellation stops the pass
    /// early but keeps whatever was already produced.
    async fn enrich_unnamed(&self, courts: &mut [Court], cancel: Option<&CancellationToken>) {
        let mut clusters: Vec<String> = Vec::new();
        for court in courts.iter().filter(|c| needs_enrichment(c)) {
            if clusters.len() == MAX_ENRICH_CLUSTERS {
                break;
            }
            let key = cluster_key(court.latitude, court.longitude);
            if !clusters.contains(&key) {
                clusters.push(key);
            }
        }

        for key in clusters {
            if let Some(token) = cancel
                && token.is_cancelled()
            {
                break;
            }
            let Some((cluster_lat, cluster_lon)) = parse_cluster_key(&key) else {
                continue;
            };
            match self.reverse_geocode(cluster_lat, cluster_lon, cancel).await {
                Ok(Some(place)) => {
                    for court in courts.iter_mut() {
                        if court.display_name == UNNAMED_COURT
                            && cluster_key(court.latitude, court.longitude) == key
                        {
                            court.display_name = format!("Pickleball Court – {place}");
                        }
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => debug!("reverse geocode failed for cluster {key}: {e}"),
            }
        }
    }

    /// Issue a prepared request with a per-call timeout, racing it against the
    /// caller's cancellation token. Whichever fires first wins; an already
    /// cancelled token fails fast without touching the network.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<reqwest::Response> {
        if let Some(token) = cancel
            && token.is_cancelled()
        {
            return Err(ApiError::Cancelled);
        }

        let pending = request.timeout(timeout).send();
        let result = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(ApiError::Cancelled),
                result = pending => result,
            },
            None => pending.await,
        };

        result.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(url.to_owned())
            } else {
                ApiError::Network(e, url.to_owned())
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Mapping: Overpass elements → clean Court records
// ---------------------------------------------------------------------------

/// Map a raw element to a Court. Elements with neither their own position nor
/// a computed center cannot be placed on a map and are dropped.
fn map_element(element: OverpassElement) -> Option<Court> {
    let latitude = element.lat.or(element.center.map(|c| c.lat));
    let longitude = element.lon.or(element.center.map(|c| c.lon));
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return None;
    };

    let tags = element.tags;
    let name = non_empty(&tags, "name");
    let label = name.clone().or_else(|| non_empty(&tags, "facility"));

    let display_name = match label {
        Some(label) => label,
        None => {
            if let Some(operator) = non_empty(&tags, "operator") {
                format!("Court @ {operator}")
            } else if let Some(street) = non_empty(&tags, "addr:street") {
                format!("Court @ {street}")
            } else {
                UNNAMED_COURT.to_owned()
            }
        }
    };

    let components = [
        non_empty(&tags, "addr:housenumber"),
        non_empty(&tags, "addr:street"),
        non_empty(&tags, "addr:city"),
        non_empty(&tags, "addr:state").or_else(|| non_empty(&tags, "addr:province")),
        non_empty(&tags, "addr:postcode"),
    ];
    let present: Vec<String> = components.into_iter().flatten().collect();
    let address = if present.is_empty() { None } else { Some(present.join(", ")) };

    Some(Court {
        id: format!("osm-{}-{}", element.kind, element.id),
        name,
        display_name,
        address,
        latitude,
        longitude,
        source: CourtSource::Osm,
        surface: tags.get("surface").cloned(),
        lighting: tags.get("lit").map(|v| v == "yes").unwrap_or(false),
        covered: tags.get("covered").map(|v| v == "yes").unwrap_or(false),
        tags,
    })
}

fn non_empty(tags: &HashMap<String, String>, key: &str) -> Option<String> {
    tags.get(key).filter(|value| !value.is_empty()).cloned()
}

/// Collapse duplicate records, keeping the first occurrence in source order.
fn dedup_courts(mapped: impl Iterator<Item = Court>) -> Vec<Court> {
    let mut seen = HashSet::new();
    let mut courts = Vec::new();
    for court in mapped {
        if seen.insert(court.dedup_key()) {
            courts.push(court);
        }
    }
    courts
}

/// Courts still carrying the fallback label, or with nothing to identify them
/// by, are candidates for reverse geocode enrichment.
fn needs_enrichment(court: &Court) -> bool {
    court.display_name == UNNAMED_COURT || (court.name.is_none() && court.address.is_none())
}

fn cluster_key(lat: f64, lon: f64) -> String {
    format!("{lat:.3}|{lon:.3}")
}

fn parse_cluster_key(key: &str) -> Option<(f64, f64)> {
    let (lat, lon) = key.split_once('|')?;
    Some((lat.parse().ok()?, lon.parse().ok()?))
}

/// Short place label for enrichment: a non-empty `name`, else the first
/// comma-delimited segment of the full display name.
fn place_label(place: ReversePlace) -> Option<String> {
    if let Some(name) = place.name
        && !name.is_empty()
    {
        return Some(name);
    }
    let display = place.display_name?;
    let first = display.split(',').next().unwrap_or("");
    if first.is_empty() { None } else { Some(first.to_owned()) }
}

fn parse_coordinate(raw: &str) -> ApiResult<f64> {
    raw.parse::<f64>()
        .map_err(|_| ApiError::Other(format!("unparseable coordinate {raw:?} from geocoder")))
}

/// Overpass QL for pickleball facilities near a point: three element kinds
/// times two tagging conventions, unioned, with centers requested so ways and
/// relations yield a usable position.
fn overpass_query(lat: f64, lon: f64, radius_m: u32) -> String {
    let around = format!("(around:{radius_m},{lat},{lon})");
    let mut clauses = String::new();
    for kind in ["node", "way", "relation"] {
        clauses.push_str(&format!(
            "{kind}[\"leisure\"=\"pitch\"][\"sport\"=\"pickleball\"]{around};"
        ));
    }
    for kind in ["node", "way", "relation"] {
        clauses.push_str(&format!("{kind}[\"sport\"=\"pickleball\"]{around};"));
    }
    format!(
        "[out:json][timeout:{}];({clauses});out center tags;",
        OVERPASS_TIMEOUT.as_secs()
    )
}
