/// Endpoint overrides, read once at startup. Unset means the public servers.
#[derive(Debug, Default, Clone)]
pub struct Settings {
    pub nominatim_url: Option<String>,
    pub overpass_url: Option<String>,
}

impl Settings {
    pub fn load() -> Self {
        Self {
            nominatim_url: non_empty_var("COURTFINDER_NOMINATIM_URL"),
            overpass_url: non_empty_var("COURTFINDER_OVERPASS_URL"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
