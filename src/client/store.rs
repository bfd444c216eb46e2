use geojson::{FeatureCollection, Value};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{RouteStore, is_no_content, success_body};
use crate::config::{ClientConfig, IngestConfig};
use crate::error::ServiceError;
use crate::fleet::FleetLocation;
use crate::geo::LatLon;
use crate::route::{Poi, PoiKind, RouteRecord, StoredRoute};
use crate::vehicle::VehicleId;
use crate::{LATEST_LOCATIONS_PATH, ROUTES_PATH, pois_path, stored_route_path};

const INGEST_TOKEN_HEADER: &str = "X-INGEST-TOKEN";

/// Backend store for routes, POIs and the fleet feed.
#[derive(Debug, Clone)]
pub struct PersistenceClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl PersistenceClient {
    pub fn new(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    fn ingest(&self) -> Option<&IngestConfig> {
        self.config.ingest.as_ref()
    }
}

impl RouteStore for PersistenceClient {
    async fn load_route(&self, vehicle_id: VehicleId) -> Result<Option<StoredRoute>, ServiceError> {
        let url = self.config.endpoint(&stored_route_path(vehicle_id))?;
        let response = self.client.get(url).send().await?;
        if is_no_content(&response) {
            debug!(vehicle_id = %vehicle_id, "No stored route");
            return Ok(None);
        }

        let body = success_body(response).await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn save_route(&self, record: &RouteRecord) -> Result<(), ServiceError> {
        let url = self.config.endpoint(ROUTES_PATH)?;
        let response = self.client.post(url).json(record).send().await?;
        success_body(response).await?;
        Ok(())
    }

    async fn clear_route(&self, vehicle_id: VehicleId) -> Result<(), ServiceError> {
        let url = self.config.endpoint(&stored_route_path(vehicle_id))?;
        let response = self.client.delete(url).send().await?;
        success_body(response).await?;
        Ok(())
    }

    async fn load_pois(&self, vehicle_id: VehicleId) -> Result<Option<Vec<Poi>>, ServiceError> {
        let url = self.config.endpoint(&pois_path(vehicle_id))?;
        let response = self.client.get(url).send().await?;
        if is_no_content(&response) {
            return Ok(None);
        }

        let body = success_body(response).await?;
        parse_pois(&body).map(Some)
    }

    async fn latest_locations(&self) -> Result<Vec<FleetLocation>, ServiceError> {
        let url = self.config.endpoint(LATEST_LOCATIONS_PATH)?;
        let response = self.client.get(url).send().await?;
        let body = success_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_live_location(
        &self,
        vehicle_id: VehicleId,
        position: LatLon,
    ) -> Result<(), ServiceError> {
        let Some(ingest) = self.ingest() else {
            return Ok(());
        };

        let body = IngestBody {
            vehicle_id,
            lat: position.lat,
            lon: position.lon,
        };
        let response = self
            .client
            .post(ingest.url.clone())
            .header(INGEST_TOKEN_HEADER, &ingest.token)
            .json(&body)
            .send()
            .await?;
        success_body(response).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestBody {
    vehicle_id: VehicleId,
    lat: f64,
    lon: f64,
}

/// Parse a GeoJSON feature collection of POIs. Features without a point geometry are skipped.
///
/// Point positions are `[lon, lat, ..]`; an elevation, if present, is ignored.
pub fn parse_pois(body: &str) -> Result<Vec<Poi>, ServiceError> {
    let collection: FeatureCollection = serde_json::from_str(body)?;

    let pois = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let Some(Value::Point(position)) = feature.geometry.map(|geometry| geometry.value)
            else {
                return None;
            };
            let &[lon, lat, ..] = position.as_slice() else {
                return None;
            };

            let properties = feature.properties.unwrap_or_default();
            let text = |key: &str| properties.get(key).and_then(JsonValue::as_str);
            let tags = match properties.get("tags") {
                Some(JsonValue::Object(tags)) => tags
                    .iter()
                    .map(|(key, value)| match value {
                        JsonValue::String(text) => (key.clone(), text.clone()),
                        other => (key.clone(), other.to_string()),
                    })
                    .collect(),
                _ => Vec::new(),
            };

            Some(Poi {
                kind: PoiKind::from_tag(text("type").unwrap_or_default()),
                name: text("name").unwrap_or("POI").to_string(),
                position: LatLon::new(lat, lon),
                tags,
            })
        })
        .collect();

    Ok(pois)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pois() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-6.27, 53.32]},
                 "properties": {"type": "fuel", "name": "Circle K", "tags": {"brand": "Circle K", "hgv": "yes"}}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-6.28, 53.33]},
                 "properties": {"type": "truck_parking"}},
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
                 "properties": {"type": "fuel"}}
            ]
        }"#;

        let pois = parse_pois(body).unwrap();
        assert_eq!(pois.len(), 2);

        assert_eq!(pois[0].kind, PoiKind::Fuel);
        assert_eq!(pois[0].name, "Circle K");
        assert_eq!(pois[0].position, LatLon::new(53.32, -6.27));
        assert_eq!(
            pois[0].tags,
            vec![
                ("brand".to_string(), "Circle K".to_string()),
                ("hgv".to_string(), "yes".to_string())
            ]
        );

        assert_eq!(pois[1].kind, PoiKind::TruckParking);
        assert_eq!(pois[1].name, "POI");
    }

    #[test]
    fn test_point_with_elevation_is_kept() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-6.27, 53.32]},
                 "properties": {"type": "parking", "name": "Lot A"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-6.28, 53.33, 12.0]},
                 "properties": {"type": "fuel", "name": "Applegreen"}},
                {"type": "Feature", "geometry": null, "properties": {"type": "fuel"}}
            ]
        }"#;

        let pois = parse_pois(body).unwrap();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].kind, PoiKind::Parking);
        assert_eq!(pois[1].name, "Applegreen");
        assert_eq!(pois[1].position, LatLon::new(53.33, -6.28));
        assert!(pois[1].tags.is_empty());
    }

    #[test]
    fn test_parse_empty_collection() {
        assert!(parse_pois(r#"{"type": "FeatureCollection", "features": []}"#).unwrap().is_empty());
        assert!(parse_pois("").is_err());
    }

    #[test]
    fn test_ingest_body() {
        let body = IngestBody {
            vehicle_id: VehicleId::new(4),
            lat: 53.3,
            lon: -6.25,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"vehicleId": 4, "lat": 53.3, "lon": -6.25})
        );
    }
}
