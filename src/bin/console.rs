use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use fleet_tracker::INGEST_LOCATION_PATH;
use fleet_tracker::client::{PersistenceClient, RouteServiceClient};
use fleet_tracker::config::{ClientConfig, IngestConfig};
use fleet_tracker::controller::{Controller, ControllerHandle};
use fleet_tracker::geo::LatLon;
use fleet_tracker::geolocation::{FixPublisher, fix_feed};
use fleet_tracker::state_machine::selection::Origin;
use fleet_tracker::vehicle::VehicleId;
use fleet_tracker::view::{Tone, ViewUpdate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

const HELP: &str = "\
commands:
  vehicle <id>                  select a vehicle of the fleet feed as origin
  origin <id> <name> <lat> <lon>  select an explicit origin
  click <lat> <lon>             click the map
  dest <lat> <lon>              set the destination directly
  clear [keep]                  clear the route, optionally keeping the origin
  pois                          toggle POIs along the stored route
  track start|stop              live tracking of TRACK_VEHICLE_ID
  live                          toggle the live location watch
  fix <lat> <lon>               feed a location sample
  refresh                       reload the fleet feed
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = config_from_env()?;
    info!(
        backend = %config.backend_url,
        tracking_vehicle = ?config.tracking_vehicle,
        ingest = config.ingest.is_some(),
        "Console client starting"
    );

    let http = reqwest::Client::new();
    let provider = Arc::new(RouteServiceClient::new(http.clone(), &config)?);
    let store = Arc::new(PersistenceClient::new(http, config.clone()));
    let (publisher, feed) = fix_feed();

    let (controller, handle, view_rx) = Controller::new(config, provider, store, Arc::new(feed));
    let controller = tokio::spawn(controller.run());
    let printer = tokio::spawn(print_updates(view_rx));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        if let Err(e) = dispatch(line, &handle, &publisher) {
            println!("! {e}");
        }
    }

    handle.shutdown()?;
    controller.await?;
    printer.abort();
    Ok(())
}

fn config_from_env() -> Result<ClientConfig> {
    let backend =
        std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8000/api/".to_string());
    let backend_url =
        Url::parse(&backend).with_context(|| format!("invalid BACKEND_URL {backend}"))?;

    let tracking_vehicle = match std::env::var("TRACK_VEHICLE_ID") {
        Ok(id) => Some(id.parse::<VehicleId>().context("invalid TRACK_VEHICLE_ID")?),
        Err(_) => None,
    };

    let tick_period = match std::env::var("TICK_PERIOD_SECS") {
        Ok(secs) => Duration::from_secs(secs.parse().context("invalid TICK_PERIOD_SECS")?),
        Err(_) => Duration::from_secs(10),
    };

    let mut config = ClientConfig::builder()
        .backend_url(backend_url)
        .maybe_tracking_vehicle(tracking_vehicle)
        .tick_period(tick_period)
        .build();

    if let Ok(token) = std::env::var("INGEST_TOKEN") {
        let url = match std::env::var("INGEST_URL") {
            Ok(url) => Url::parse(&url).context("invalid INGEST_URL")?,
            Err(_) => config.endpoint(INGEST_LOCATION_PATH)?,
        };
        config.ingest = Some(IngestConfig { url, token });
    }

    Ok(config)
}

fn dispatch(line: &str, handle: &ControllerHandle, publisher: &FixPublisher) -> Result<()> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match (command, args.as_slice()) {
        ("vehicle", [id]) => handle.select_vehicle(id.parse()?)?,
        ("origin", [id, name, lat, lon]) => {
            let origin = Origin::new(id.parse()?, *name, parse_point(lat, lon)?);
            handle.select_origin(origin)?
        }
        ("click", [lat, lon]) => handle.map_click(parse_point(lat, lon)?)?,
        ("dest", [lat, lon]) => handle.set_destination(parse_point(lat, lon)?)?,
        ("clear", []) => handle.clear_route(false)?,
        ("clear", ["keep"]) => handle.clear_route(true)?,
        ("pois", []) => handle.toggle_pois()?,
        ("track", ["start"]) => handle.start_tracking()?,
        ("track", ["stop"]) => handle.stop_tracking()?,
        ("live", []) => handle.toggle_live_location()?,
        ("fix", [lat, lon]) => publisher.publish(parse_point(lat, lon)?),
        ("refresh", []) => handle.refresh_fleet()?,
        ("help", []) => println!("{HELP}"),
        _ => bail!("unrecognised command `{line}`, type `help`"),
    }
    Ok(())
}

fn parse_point(lat: &str, lon: &str) -> Result<LatLon> {
    let point = LatLon::new(lat.parse()?, lon.parse()?);
    if !point.is_valid() {
        return Err(anyhow!("{point} is not a valid coordinate"));
    }
    Ok(point)
}

async fn print_updates(mut updates: mpsc::UnboundedReceiver<ViewUpdate>) {
    while let Some(update) = updates.recv().await {
        match update {
            ViewUpdate::Status(status) => {
                let marker = match status.tone {
                    Tone::Info => "[i]",
                    Tone::Success => "[+]",
                    Tone::Error => "[!]",
                    Tone::Muted => "[ ]",
                };
                println!("{marker} {}", status.text);
            }
            ViewUpdate::Fleet(entries) => {
                for entry in entries {
                    println!(
                        "    {} {} @ {} ({}) {}",
                        entry.vehicle_id,
                        entry.name,
                        entry.position,
                        entry.timestamp,
                        entry.eta_text()
                    );
                }
            }
            ViewUpdate::FleetUnavailable => warn!("Error loading fleet"),
            ViewUpdate::RouteInfo(Some(info)) => {
                println!("    {}: {}", info.vehicle_name, info.meta)
            }
            ViewUpdate::Pois(Some(pois)) => {
                for poi in pois {
                    println!("    {:?} {} @ {}", poi.kind, poi.name, poi.position);
                }
            }
            ViewUpdate::Tracking(phase) => println!("    tracking: {phase:?}"),
            other => tracing::debug!(update = ?other, "View update"),
        }
    }
}
