use std::collections::HashMap;
use std::sync::Mutex;

use url::Url;

use super::*;
use crate::geolocation::{NoGeolocation, fix_feed};
use crate::route::{Poi, Route, RouteRecord, StoredRoute};
use crate::state_machine::tracking::TrackingPhase;
use crate::view::{RouteLayer, Tone};

const TRUCK: VehicleId = VehicleId::new(2);

fn truck_origin() -> Origin {
    Origin::new(TRUCK, "Truck-1", LatLon::new(53.30, -6.25))
}

fn clicked() -> LatLon {
    LatLon::new(53.35, -6.30)
}

fn config(tracking_vehicle: Option<VehicleId>) -> ClientConfig {
    ClientConfig::builder()
        .backend_url(Url::parse("http://localhost:8000/api/").unwrap())
        .maybe_tracking_vehicle(tracking_vehicle)
        .build()
}

fn stored_route(destination: LatLon) -> StoredRoute {
    StoredRoute {
        path: vec![LatLon::new(53.30, -6.25), destination],
        destination: Some(destination),
        distance_meters: Some(12_000.0),
        travel_time_seconds: Some(900.0),
    }
}

#[derive(Debug, Default)]
struct MockProvider {
    requests: Mutex<Vec<(LatLon, LatLon)>>,
}

impl MockProvider {
    fn requests(&self) -> Vec<(LatLon, LatLon)> {
        self.requests.lock().unwrap().clone()
    }
}

impl RouteProvider for MockProvider {
    async fn fetch_route(&self, origin: LatLon, destination: LatLon) -> Result<Route, ServiceError> {
        self.requests.lock().unwrap().push((origin, destination));
        Ok(Route {
            points: vec![origin, destination],
            distance_m: Some(12_000.0),
            duration_s: Some(900.0),
        })
    }
}

#[derive(Debug, Default)]
struct MockStore {
    routes: Mutex<HashMap<VehicleId, StoredRoute>>,
    fail_loads: bool,
    fleet: Vec<FleetLocation>,
    loads: Mutex<Vec<VehicleId>>,
    saved: Mutex<Vec<RouteRecord>>,
    cleared: Mutex<Vec<VehicleId>>,
    posted: Mutex<Vec<(VehicleId, LatLon)>>,
}

impl MockStore {
    fn with_route(vehicle_id: VehicleId, route: StoredRoute) -> Self {
        let store = Self::default();
        store.routes.lock().unwrap().insert(vehicle_id, route);
        store
    }

    fn saved(&self) -> Vec<RouteRecord> {
        self.saved.lock().unwrap().clone()
    }

    fn cleared(&self) -> Vec<VehicleId> {
        self.cleared.lock().unwrap().clone()
    }
}

impl RouteStore for MockStore {
    async fn load_route(&self, vehicle_id: VehicleId) -> Result<Option<StoredRoute>, ServiceError> {
        self.loads.lock().unwrap().push(vehicle_id);
        if self.fail_loads {
            return Err(ServiceError::NoRoute);
        }
        Ok(self.routes.lock().unwrap().get(&vehicle_id).cloned())
    }

    async fn save_route(&self, record: &RouteRecord) -> Result<(), ServiceError> {
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn clear_route(&self, vehicle_id: VehicleId) -> Result<(), ServiceError> {
        self.cleared.lock().unwrap().push(vehicle_id);
        self.routes.lock().unwrap().remove(&vehicle_id);
        Ok(())
    }

    async fn load_pois(&self, _vehicle_id: VehicleId) -> Result<Option<Vec<Poi>>, ServiceError> {
        Ok(None)
    }

    async fn latest_locations(&self) -> Result<Vec<FleetLocation>, ServiceError> {
        Ok(self.fleet.clone())
    }

    async fn post_live_location(
        &self,
        vehicle_id: VehicleId,
        position: LatLon,
    ) -> Result<(), ServiceError> {
        self.posted.lock().unwrap().push((vehicle_id, position));
        Ok(())
    }
}

struct Harness {
    handle: ControllerHandle,
    views: mpsc::UnboundedReceiver<ViewUpdate>,
    provider: Arc<MockProvider>,
    store: Arc<MockStore>,
}

fn start<G: GeolocationSource>(config: ClientConfig, store: MockStore, geolocation: G) -> Harness {
    let provider = Arc::new(MockProvider::default());
    let store = Arc::new(store);
    let (controller, handle, views) = Controller::new(
        config,
        Arc::clone(&provider),
        Arc::clone(&store),
        Arc::new(geolocation),
    );
    tokio::spawn(controller.run());
    Harness {
        handle,
        views,
        provider,
        store,
    }
}

impl Harness {
    /// Skip view updates until one matches `predicate`.
    async fn wait_for(&mut self, predicate: impl Fn(&ViewUpdate) -> bool) -> ViewUpdate {
        let views = &mut self.views;
        tokio::time::timeout(Duration::from_secs(300), async {
            loop {
                let update = views.recv().await.expect("controller stopped");
                if predicate(&update) {
                    return update;
                }
            }
        })
        .await
        .expect("view update never arrived")
    }

    async fn wait_for_status(&mut self, predicate: impl Fn(&Status) -> bool) -> Status {
        match self
            .wait_for(|update| matches!(update, ViewUpdate::Status(status) if predicate(status)))
            .await
        {
            ViewUpdate::Status(status) => status,
            _ => unreachable!(),
        }
    }
}

/// Let spawned fire-and-forget requests run until `done` holds.
async fn eventually(done: impl Fn() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held");
}

#[tokio::test(start_paused = true)]
async fn test_new_route_is_fetched_and_persisted_once() {
    let mut harness = start(config(None), MockStore::default(), NoGeolocation);

    harness.handle.select_origin(truck_origin()).unwrap();
    harness
        .wait_for(|u| *u == ViewUpdate::MapClickArmed(true))
        .await;

    harness.handle.map_click(clicked()).unwrap();
    let status = harness
        .wait_for_status(|s| s.tone == Tone::Success)
        .await;
    assert_eq!(status.text, "12.0 km, ~15 min from Truck-1 to destination.");

    let store = Arc::clone(&harness.store);
    eventually(|| !store.saved().is_empty()).await;
    let saved = store.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].vehicle_id, TRUCK);
    assert_eq!(saved[0].destination, clicked());
    assert_eq!(saved[0].path, vec![LatLon::new(53.30, -6.25), clicked()]);

    assert_eq!(
        harness.provider.requests(),
        vec![(LatLon::new(53.30, -6.25), clicked())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stored_route_is_restored_without_routing() {
    let store = MockStore::with_route(TRUCK, stored_route(clicked()));
    let mut harness = start(config(None), store, NoGeolocation);

    harness.handle.select_origin(truck_origin()).unwrap();
    harness
        .wait_for(|u| {
            matches!(
                u,
                ViewUpdate::DrawRoute {
                    layer: RouteLayer::Selection,
                    ..
                }
            )
        })
        .await;
    harness
        .wait_for_status(|s| s.text == "Showing stored route for Truck-1.")
        .await;

    assert!(harness.provider.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_still_arms_map_click() {
    let store = MockStore {
        fail_loads: true,
        ..MockStore::default()
    };
    let mut harness = start(config(None), store, NoGeolocation);

    harness.handle.select_origin(truck_origin()).unwrap();
    let status = harness
        .wait_for_status(|s| s.text.contains("Could not load stored route"))
        .await;
    assert_eq!(status.tone, Tone::Error);
    harness
        .wait_for(|u| *u == ViewUpdate::MapClickArmed(true))
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_switching_origin_clears_previous_route_once() {
    let mut harness = start(config(None), MockStore::default(), NoGeolocation);

    harness.handle.select_origin(truck_origin()).unwrap();
    harness
        .wait_for(|u| *u == ViewUpdate::MapClickArmed(true))
        .await;
    harness
        .handle
        .select_origin(Origin::new(VehicleId::new(3), "Van-3", LatLon::new(53.0, -6.0)))
        .unwrap();
    harness
        .wait_for(|u| *u == ViewUpdate::MapClickArmed(true))
        .await;

    let store = Arc::clone(&harness.store);
    eventually(|| !store.cleared().is_empty()).await;
    assert_eq!(store.cleared(), vec![TRUCK]);
}

#[tokio::test(start_paused = true)]
async fn test_select_vehicle_from_fleet_feed() {
    let store = MockStore {
        fleet: vec![FleetLocation {
            vehicle_id: VehicleId::new(5),
            vehicle_name: "Van-5".to_string(),
            lat: Some(53.1),
            lon: Some(-6.1),
            timestamp: "2024-01-01T10:00:00Z".to_string(),
            distance_meters: None,
            travel_time_seconds: None,
        }],
        ..MockStore::default()
    };
    let mut harness = start(config(None), store, NoGeolocation);

    harness
        .wait_for(|u| matches!(u, ViewUpdate::Fleet(entries) if entries.len() == 1))
        .await;

    harness.handle.select_vehicle(VehicleId::new(9)).unwrap();
    let status = harness.wait_for_status(|s| s.tone == Tone::Error).await;
    assert_eq!(status.text, "vehicle 9 is not in the fleet feed");

    harness.handle.select_vehicle(VehicleId::new(5)).unwrap();
    harness
        .wait_for_status(|s| s.text.starts_with("Origin set to Van-5 (53.1000, -6.1000)"))
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_tracking_without_stored_destination() {
    let (_publisher, feed) = fix_feed();
    let mut harness = start(config(Some(TRUCK)), MockStore::default(), feed);

    harness.handle.start_tracking().unwrap();
    let status = harness
        .wait_for_status(|s| s.text.contains("set a destination first"))
        .await;
    assert_eq!(status.tone, Tone::Error);
    harness
        .wait_for(|u| *u == ViewUpdate::Tracking(TrackingPhase::Stopped))
        .await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(harness.provider.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tracking_without_capability() {
    let mut harness = start(config(Some(TRUCK)), MockStore::default(), NoGeolocation);

    harness.handle.start_tracking().unwrap();
    harness
        .wait_for_status(|s| s.text == "Geolocation is not supported on this host.")
        .await;
    assert!(harness.store.loads.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tracking_reroutes_until_arrival() {
    let destination = clicked();
    let store = MockStore::with_route(TRUCK, stored_route(destination));
    let (publisher, feed) = fix_feed();
    let mut harness = start(config(Some(TRUCK)), store, feed);

    let far = LatLon::new(53.30, -6.25);
    publisher.publish(far);
    harness.handle.start_tracking().unwrap();

    harness
        .wait_for(|u| {
            matches!(
                u,
                ViewUpdate::DrawRoute {
                    layer: RouteLayer::Tracking,
                    ..
                }
            )
        })
        .await;
    assert_eq!(harness.provider.requests(), vec![(far, destination)]);

    // The next tick samples a position within the arrival threshold.
    publisher.publish(destination);
    harness
        .wait_for(|u| *u == ViewUpdate::Tracking(TrackingPhase::Arrived))
        .await;

    // No further ticks after arrival.
    let requests = harness.provider.requests().len();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.provider.requests().len(), requests);
}

#[tokio::test(start_paused = true)]
async fn test_stop_tracking_is_idempotent() {
    let store = MockStore::with_route(TRUCK, stored_route(clicked()));
    let (publisher, feed) = fix_feed();
    let mut harness = start(config(Some(TRUCK)), store, feed);

    publisher.publish(LatLon::new(53.30, -6.25));
    harness.handle.start_tracking().unwrap();
    harness
        .wait_for(|u| {
            matches!(
                u,
                ViewUpdate::DrawRoute {
                    layer: RouteLayer::Tracking,
                    ..
                }
            )
        })
        .await;

    harness.handle.stop_tracking().unwrap();
    harness
        .wait_for(|u| *u == ViewUpdate::Tracking(TrackingPhase::Stopped))
        .await;
    let requests = harness.provider.requests().len();

    harness.handle.stop_tracking().unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.provider.requests().len(), requests);

    while let Ok(update) = harness.views.try_recv() {
        assert_ne!(update, ViewUpdate::Tracking(TrackingPhase::Stopped));
    }
}

#[tokio::test(start_paused = true)]
async fn test_live_location_posts_fixes() {
    let (publisher, feed) = fix_feed();
    let mut harness = start(config(Some(VehicleId::new(7))), MockStore::default(), feed);

    harness.handle.toggle_live_location().unwrap();
    harness
        .wait_for(|u| *u == ViewUpdate::LiveLocation(true))
        .await;

    let here = LatLon::new(53.2, -6.2);
    publisher.publish(here);
    harness
        .wait_for(|u| *u == ViewUpdate::Recenter(here))
        .await;

    let store = Arc::clone(&harness.store);
    eventually(|| !store.posted.lock().unwrap().is_empty()).await;
    assert_eq!(
        *store.posted.lock().unwrap(),
        vec![(VehicleId::new(7), here)]
    );

    harness.handle.toggle_live_location().unwrap();
    harness
        .wait_for(|u| *u == ViewUpdate::LiveLocation(false))
        .await;
}
