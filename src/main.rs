mod search;
mod settings;

use crate::search::{SearchOutcome, SearchSession};
use crate::settings::Settings;
use courts_api::Court;
use courts_api::client::{CourtsApi, NOMINATIM_BASE, OVERPASS_URL};
use log::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(query) = handle_cli_args() else {
        return Ok(());
    };

    env_logger::try_init()?;

    let settings = Settings::load();
    let api = CourtsApi::with_endpoints(
        settings.nominatim_url.as_deref().unwrap_or(NOMINATIM_BASE),
        settings.overpass_url.as_deref().unwrap_or(OVERPASS_URL),
    );
    let session = SearchSession::new(api);

    debug!("searching for courts near {query:?}");
    let outcome = session.search(&query).await;

    match &outcome {
        SearchOutcome::Courts { location, courts } if !courts.is_empty() => {
            println!("{} courts near {}:", courts.len(), location.display_name);
            for court in courts {
                print_court(court);
            }
        }
        _ => {
            if let Some(message) = outcome.message() {
                println!("{message}");
            }
        }
    }

    if matches!(outcome, SearchOutcome::Failed) {
        std::process::exit(1);
    }
    Ok(())
}

fn handle_cli_args() -> Option<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(first) = args.first() else {
        eprintln!("Missing location argument.\n\n{}", usage_text());
        std::process::exit(2);
    };

    match first.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            None
        }
        "-V" | "--version" => {
            println!("courtfinder {}", env!("CARGO_PKG_VERSION"));
            None
        }
        arg if arg.starts_with('-') => {
            eprintln!("Unknown argument: {arg}\n\n{}", usage_text());
            std::process::exit(2);
        }
        _ => Some(args.join(" ")),
    }
}

fn usage_text() -> &'static str {
    "courtfinder - find public pickleball courts near a location

Usage:
  courtfinder <location>
  courtfinder --help
  courtfinder --version

Environment:
  COURTFINDER_NOMINATIM_URL   Alternate Nominatim base URL (self-hosted)
  COURTFINDER_OVERPASS_URL    Alternate Overpass interpreter URL
  RUST_LOG                    Log filter (e.g. courts_api=debug)"
}

fn print_court(court: &Court) {
    let mut attributes: Vec<&str> = Vec::new();
    if let Some(surface) = &court.surface {
        attributes.push(surface);
    }
    if court.lighting {
        attributes.push("lit");
    }
    if court.covered {
        attributes.push("covered");
    }

    println!("  {}  ({:.5}, {:.5})", court.display_name, court.latitude, court.longitude);
    if let Some(address) = &court.address {
        println!("      {address}");
    }
    if !attributes.is_empty() {
        println!("      {}", attributes.join(", "));
    }
    if let Some(url) = court.osm_url() {
        println!("      {url}");
    }
}
