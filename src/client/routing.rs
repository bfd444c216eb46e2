use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{RouteProvider, success_body};
use crate::config::ClientConfig;
use crate::error::ServiceError;
use crate::geo::LatLon;
use crate::route::Route;

/// Routing provider reached through the backend's routing proxy.
#[derive(Debug, Clone)]
pub struct RouteServiceClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl RouteServiceClient {
    pub fn new(client: reqwest::Client, config: &ClientConfig) -> Result<Self, ServiceError> {
        let endpoint = config.endpoint(&config.routing_path)?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl RouteProvider for RouteServiceClient {
    async fn fetch_route(&self, origin: LatLon, destination: LatLon) -> Result<Route, ServiceError> {
        debug!(
            endpoint = %self.endpoint,
            origin = %origin,
            destination = %destination,
            "Requesting route"
        );

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("origin", origin.query_param()),
                ("dest", destination.query_param()),
            ])
            .send()
            .await?;

        let body = success_body(response).await?;
        parse_route(&body)
    }
}

/// Routing provider response body.
#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    routes: Vec<ProviderRoute>,
}

#[derive(Debug, Deserialize)]
struct ProviderRoute {
    #[serde(default)]
    legs: Vec<ProviderLeg>,
    #[serde(default)]
    summary: Option<ProviderSummary>,
}

#[derive(Debug, Deserialize)]
struct ProviderLeg {
    #[serde(default)]
    points: Vec<ProviderPoint>,
}

#[derive(Debug, Deserialize)]
struct ProviderPoint {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lon: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderSummary {
    #[serde(default)]
    length_in_meters: Option<f64>,
    #[serde(default)]
    travel_time_in_seconds: Option<f64>,
}

/// Normalise a provider body into a [`Route`] using its first route.
///
/// Legs are joined in order. An empty or malformed body, no routes, or no points is an error.
pub fn parse_route(body: &str) -> Result<Route, ServiceError> {
    let response: RouteResponse = serde_json::from_str(body)?;
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or(ServiceError::NoRoute)?;

    let points: Vec<LatLon> = route
        .legs
        .into_iter()
        .flat_map(|leg| leg.points)
        .map(|point| LatLon::new(point.lat, point.lon))
        .collect();
    if points.is_empty() {
        return Err(ServiceError::NoRoute);
    }

    let summary = route.summary.unwrap_or_default();
    Ok(Route {
        points,
        distance_m: summary.length_in_meters,
        duration_s: summary.travel_time_in_seconds,
    })
}
