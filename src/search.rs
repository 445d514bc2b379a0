use courts_api::client::{CourtsApi, DEFAULT_RADIUS_M};
use courts_api::{Court, GeocodeResult};
use log::{debug, error};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Result of one orchestrated search. This is the only place user-facing
/// text is produced; the api crate reports conditions, not wording.
#[derive(Debug)]
pub enum SearchOutcome {
    /// The location resolved and the search completed. The list may be empty.
    Courts { location: GeocodeResult, courts: Vec<Court> },
    /// The geocoder had no candidate for the query; no court search was run.
    LocationNotFound { query: String },
    /// A newer search (or an explicit cancel) superseded this one.
    Superseded,
    /// Transport-level failure in either pipeline step.
    Failed,
}

impl SearchOutcome {
    /// Status line to show the user, when this outcome warrants one.
    pub fn message(&self) -> Option<String> {
        match self {
            SearchOutcome::Courts { location, courts } if courts.is_empty() => Some(format!(
                "No pickleball courts found within {} km of {}.",
                DEFAULT_RADIUS_M / 1000,
                location.display_name
            )),
            SearchOutcome::Courts { .. } => None,
            SearchOutcome::LocationNotFound { query } => {
                Some(format!("Location not found: {query}"))
            }
            SearchOutcome::Superseded => None,
            SearchOutcome::Failed => Some("Search failed. Please try again.".to_owned()),
        }
    }
}

/// Drives the geocode → court search pipeline, one search at a time.
///
/// Each `search` call arms a fresh cancellation token and cancels the
/// previously armed one, so a newer search always supersedes an older
/// in-flight one. The superseded search resolves quietly; cancellation is
/// never reported as a failure.
pub struct SearchSession {
    api: CourtsApi,
    active: Mutex<Option<CancellationToken>>,
}

impl SearchSession {
    pub fn new(api: CourtsApi) -> Self {
        Self { api, active: Mutex::new(None) }
    }

    /// Cancel the in-flight search, if any. Harmless when none is running.
    pub fn cancel_active(&self) {
        if let Ok(mut active) = self.active.lock()
            && let Some(token) = active.take()
        {
            token.cancel();
        }
    }

    fn arm(&self) -> CancellationToken {
        self.cancel_active();
        let token = CancellationToken::new();
        if let Ok(mut active) = self.active.lock() {
            *active = Some(token.clone());
        }
        token
    }

    /// Run one search end to end. Failures fold into the outcome so callers
    /// have exactly one thing to render.
    pub async fn search(&self, location: &str) -> SearchOutcome {
        let token = self.arm();

        let resolved = match self.api.geocode(location, Some(&token)).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                return SearchOutcome::LocationNotFound { query: location.to_owned() };
            }
            Err(e) if e.is_cancelled() => {
                debug!("geocode superseded for {location:?}");
                return SearchOutcome::Superseded;
            }
            Err(e) => {
                error!("geocode failed for {location:?}: {e}");
                return SearchOutcome::Failed;
            }
        };

        match self
            .api
            .fetch_courts(resolved.lat, resolved.lon, DEFAULT_RADIUS_M, Some(&token))
            .await
        {
            Ok(courts) => SearchOutcome::Courts { location: resolved, courts },
            Err(e) if e.is_cancelled() => {
                debug!("court search superseded for {location:?}");
                SearchOutcome::Superseded
            }
            Err(e) => {
                error!("court search failed near {}: {e}", resolved.display_name);
                SearchOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn not_found_reports_without_searching_for_courts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;
        let overpass = server.mock("POST", "/").expect(0).create_async().await;
        let session =
            SearchSession::new(CourtsApi::with_endpoints(&server.url(), &server.url()));

        let outcome = session.search("Nowhere12345").await;
        let SearchOutcome::LocationNotFound { query } = &outcome else {
            panic!("expected LocationNotFound, got {outcome:?}");
        };
        assert_eq!(query, "Nowhere12345");
        assert!(outcome.message().unwrap().contains("Nowhere12345"));
        overpass.assert_async().await;
    }

    #[tokio::test]
    async fn resolved_location_yields_courts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"lat":"30.2672","lon":"-97.7431","display_name":"Austin, Texas"}]"#)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"elements":[{"type":"node","id":1,"lat":30.27,"lon":-97.74,"tags":{"name":"Shipe Park","sport":"pickleball"}}]}"#,
            )
            .create_async()
            .await;
        let session =
            SearchSession::new(CourtsApi::with_endpoints(&server.url(), &server.url()));

        let outcome = session.search("Austin, TX").await;
        let SearchOutcome::Courts { location, courts } = &outcome else {
            panic!("expected Courts, got {outcome:?}");
        };
        assert_eq!(location.display_name, "Austin, Texas");
        assert_eq!(courts.len(), 1);
        assert_eq!(courts[0].display_name, "Shipe Park");
        assert!(outcome.message().is_none(), "a populated result needs no status line");
    }

    #[tokio::test]
    async fn empty_results_carry_a_no_courts_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"lat":"48.1351","lon":"11.5820","display_name":"Munich, Germany"}]"#)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(r#"{"elements":[]}"#)
            .create_async()
            .await;
        let session =
            SearchSession::new(CourtsApi::with_endpoints(&server.url(), &server.url()));

        let outcome = session.search("Munich").await;
        let SearchOutcome::Courts { courts, .. } = &outcome else {
            panic!("expected Courts, got {outcome:?}");
        };
        assert!(courts.is_empty());
        let message = outcome.message().unwrap();
        assert!(message.contains("No pickleball courts"), "got {message:?}");
        assert!(message.contains("Munich"));
    }

    #[tokio::test]
    async fn transport_failures_surface_as_a_generic_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let session =
            SearchSession::new(CourtsApi::with_endpoints(&server.url(), &server.url()));

        let outcome = session.search("Austin").await;
        assert!(matches!(outcome, SearchOutcome::Failed));
        assert_eq!(outcome.message().as_deref(), Some("Search failed. Please try again."));
    }

    #[tokio::test]
    async fn cancelling_mid_geocode_is_silent() {
        // Bound but never served, so the geocode request hangs until cancelled.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let session = Arc::new(SearchSession::new(CourtsApi::with_endpoints(&base, &base)));

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.search("Austin").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.cancel_active();

        let outcome = pending.await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Superseded), "got {outcome:?}");
        assert!(outcome.message().is_none(), "cancellation is never user-visible");
    }

    #[tokio::test]
    async fn a_newer_search_supersedes_the_older_one() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("q".into(), "first town".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"[{"lat":"30.2672","lon":"-97.7431","display_name":"First Town"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("q".into(), "second town".into()))
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;
        // Court lookups hang, so the first search stays in flight until superseded.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let overpass = format!("http://{}", listener.local_addr().unwrap());
        let session = Arc::new(SearchSession::new(CourtsApi::with_endpoints(
            &server.url(),
            &overpass,
        )));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.search("first town").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = session.search("second town").await;
        let SearchOutcome::LocationNotFound { query } = &second else {
            panic!("expected LocationNotFound, got {second:?}");
        };
        assert_eq!(query, "second town");

        let first_outcome = first.await.unwrap();
        assert!(matches!(first_outcome, SearchOutcome::Superseded), "got {first_outcome:?}");
    }
}
