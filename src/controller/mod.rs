//! Async runtime around the state machines.
//!
//! A [`Controller`] owns the selection, tracking and live location machines and is the only
//! place their inputs are processed. Everything that reaches a machine, user commands as well as
//! completions of requests, timer ticks and location samples, goes through one unbounded queue
//! that [`Controller::run`] drains one event at a time. Effects are executed by spawning tasks
//! whose results are posted back onto the same queue.

pub mod error;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::{RouteProvider, RouteStore};
use crate::config::ClientConfig;
use crate::error::ServiceError;
use crate::fleet::{FleetLocation, FleetMap};
use crate::geo::LatLon;
use crate::geolocation::GeolocationSource;
use crate::session::{RouteTicket, TrackingSessionId};
use crate::state_machine::live_location::{LiveLocationInput, LiveLocationMachine};
use crate::state_machine::selection::{Origin, SelectionInput, SelectionMachine};
use crate::state_machine::tracking::{TrackingInput, TrackingMachine};
use crate::state_machine::{Effect, StateMachine};
use crate::vehicle::VehicleId;
use crate::view::{Status, ViewUpdate};

use self::error::ControllerClosed;

#[derive(Debug)]
enum Event {
    Selection(SelectionInput),
    Tracking(TrackingInput),
    LiveLocation(LiveLocationInput),
    SelectVehicle(VehicleId),
    StartTracking,
    ToggleLiveLocation,
    RefreshFleet,
    FleetLoaded(Result<Vec<FleetLocation>, ServiceError>),
    Shutdown,
}

/// Cloneable sender of user commands to a running [`Controller`].
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl ControllerHandle {
    fn send(&self, event: Event) -> Result<(), ControllerClosed> {
        self.events.send(event).map_err(|_| ControllerClosed)
    }

    pub fn select_origin(&self, origin: Origin) -> Result<(), ControllerClosed> {
        self.send(Event::Selection(SelectionInput::SelectOrigin(origin)))
    }

    /// Select a vehicle of the fleet feed as origin.
    pub fn select_vehicle(&self, vehicle_id: VehicleId) -> Result<(), ControllerClosed> {
        self.send(Event::SelectVehicle(vehicle_id))
    }

    pub fn map_click(&self, position: LatLon) -> Result<(), ControllerClosed> {
        self.send(Event::Selection(SelectionInput::MapClick(position)))
    }

    pub fn set_destination(&self, position: LatLon) -> Result<(), ControllerClosed> {
        self.send(Event::Selection(SelectionInput::SelectDestination(position)))
    }

    pub fn clear_route(&self, keep_origin: bool) -> Result<(), ControllerClosed> {
        self.send(Event::Selection(SelectionInput::ClearRoute { keep_origin }))
    }

    pub fn toggle_pois(&self) -> Result<(), ControllerClosed> {
        self.send(Event::Selection(SelectionInput::TogglePois))
    }

    pub fn start_tracking(&self) -> Result<(), ControllerClosed> {
        self.send(Event::StartTracking)
    }

    pub fn stop_tracking(&self) -> Result<(), ControllerClosed> {
        self.send(Event::Tracking(TrackingInput::Stop))
    }

    pub fn toggle_live_location(&self) -> Result<(), ControllerClosed> {
        self.send(Event::ToggleLiveLocation)
    }

    pub fn refresh_fleet(&self) -> Result<(), ControllerClosed> {
        self.send(Event::RefreshFleet)
    }

    /// Stop the controller. Requests still in flight complete but their results are dropped.
    pub fn shutdown(&self) -> Result<(), ControllerClosed> {
        self.send(Event::Shutdown)
    }
}

pub struct Controller<P, S, G> {
    config: ClientConfig,
    provider: Arc<P>,
    store: Arc<S>,
    geolocation: Arc<G>,
    fleet: Arc<FleetMap>,

    selection: SelectionMachine,
    tracking: TrackingMachine,
    live_location: LiveLocationMachine,

    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    view_tx: mpsc::UnboundedSender<ViewUpdate>,

    ticks: Option<JoinHandle<()>>,
    watch: Option<JoinHandle<()>>,
}

impl<P, S, G> std::fmt::Debug for Controller<P, S, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("selection", &self.selection)
            .field("tracking", &self.tracking)
            .field("live_location", &self.live_location)
            .field("fleet", &self.fleet.len())
            .finish_non_exhaustive()
    }
}

impl<P, S, G> Controller<P, S, G>
where
    P: RouteProvider,
    S: RouteStore,
    G: GeolocationSource,
{
    /// Create a controller, the handle to command it and the stream of view updates it emits.
    pub fn new(
        config: ClientConfig,
        provider: Arc<P>,
        store: Arc<S>,
        geolocation: Arc<G>,
    ) -> (Self, ControllerHandle, mpsc::UnboundedReceiver<ViewUpdate>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = mpsc::unbounded_channel();

        let controller = Self {
            selection: SelectionMachine::new(),
            tracking: TrackingMachine::new(config.tracking_settings()),
            live_location: LiveLocationMachine::new(config.tracking_vehicle),
            config,
            provider,
            store,
            geolocation,
            fleet: Arc::new(FleetMap::new()),
            events_tx: events_tx.clone(),
            events_rx,
            view_tx,
            ticks: None,
            watch: None,
        };
        let handle = ControllerHandle { events: events_tx };
        (controller, handle, view_rx)
    }

    /// Latest fleet positions, shared with whoever renders the fleet list.
    pub fn fleet(&self) -> Arc<FleetMap> {
        Arc::clone(&self.fleet)
    }

    /// Process events until [`ControllerHandle::shutdown`] is called.
    pub async fn run(mut self) {
        info!(backend = %self.config.backend_url, "Controller started");
        let refresher = self.spawn_fleet_refresh();

        while let Some(event) = self.events_rx.recv().await {
            if matches!(event, Event::Shutdown) {
                break;
            }
            self.handle(event);
        }

        refresher.abort();
        self.cancel_ticks();
        self.stop_watch();
        info!("Controller stopped");
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Selection(input) => {
                self.selection.process_input(input);
                let effects = drain(&mut self.selection);
                self.execute_all(effects);
            }
            Event::Tracking(input) => {
                self.tracking.process_input(input);
                let effects = drain(&mut self.tracking);
                self.execute_all(effects);
            }
            Event::LiveLocation(input) => {
                self.live_location.process_input(input);
                let effects = drain(&mut self.live_location);
                self.execute_all(effects);
            }
            Event::SelectVehicle(vehicle_id) => match self.fleet.get(vehicle_id) {
                Ok(entry) => {
                    let origin = Origin::new(entry.vehicle_id, entry.name, entry.position);
                    self.handle(Event::Selection(SelectionInput::SelectOrigin(origin)));
                }
                Err(e) => {
                    warn!(error = %e, "Vehicle selection failed");
                    self.emit(ViewUpdate::Status(Status::error(e.to_string())));
                }
            },
            Event::StartTracking => {
                let capability = self.geolocation.is_available();
                self.handle(Event::Tracking(TrackingInput::Start {
                    capability,
                    session: TrackingSessionId::generate(),
                }));
            }
            Event::ToggleLiveLocation => {
                let capability = self.geolocation.is_available();
                self.handle(Event::LiveLocation(LiveLocationInput::Toggle { capability }));
            }
            Event::RefreshFleet => {
                let store = Arc::clone(&self.store);
                self.request(async move { Event::FleetLoaded(store.latest_locations().await) });
            }
            Event::FleetLoaded(Ok(feed)) => {
                let entries = self.fleet.apply_feed(feed);
                debug!(vehicles = entries.len(), "Fleet feed refreshed");
                self.emit(ViewUpdate::Fleet(entries));
            }
            Event::FleetLoaded(Err(e)) => {
                warn!(error = %e, "Fleet feed unavailable");
                self.emit(ViewUpdate::FleetUnavailable);
            }
            Event::Shutdown => {}
        }
    }

    fn execute_all(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::View(update) => self.emit(update),

            Effect::LoadStoredRoute { epoch, vehicle_id } => {
                let store = Arc::clone(&self.store);
                self.request(async move {
                    let result = store.load_route(vehicle_id).await;
                    Event::Selection(SelectionInput::StoredRouteLoaded { epoch, result })
                });
            }
            Effect::FetchRoute {
                ticket,
                origin,
                destination,
            } => {
                let provider = Arc::clone(&self.provider);
                self.request(async move {
                    let result = provider.fetch_route(origin, destination).await;
                    match ticket {
                        RouteTicket::Selection(epoch) => {
                            Event::Selection(SelectionInput::RouteFetched { epoch, result })
                        }
                        RouteTicket::Tracking(session) => {
                            Event::Tracking(TrackingInput::RouteFetched { session, result })
                        }
                    }
                });
            }
            Effect::SaveRoute(record) => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    if let Err(e) = store.save_route(&record).await {
                        warn!(vehicle_id = %record.vehicle_id, error = %e, "Failed to save route");
                    }
                });
            }
            Effect::ClearStoredRoute(vehicle_id) => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    if let Err(e) = store.clear_route(vehicle_id).await {
                        warn!(%vehicle_id, error = %e, "Failed to clear stored route");
                    }
                });
            }
            Effect::LoadPois { epoch, vehicle_id } => {
                let store = Arc::clone(&self.store);
                self.request(async move {
                    let result = store.load_pois(vehicle_id).await;
                    Event::Selection(SelectionInput::PoisLoaded { epoch, result })
                });
            }

            Effect::LoadTrackingDestination {
                session,
                vehicle_id,
            } => {
                let store = Arc::clone(&self.store);
                self.request(async move {
                    let result = store.load_route(vehicle_id).await;
                    Event::Tracking(TrackingInput::DestinationLoaded { session, result })
                });
            }
            Effect::ScheduleTicks { session, period } => self.schedule_ticks(session, period),
            Effect::CancelTicks => self.cancel_ticks(),
            Effect::RequestSample { session } => {
                let geolocation = Arc::clone(&self.geolocation);
                let options = self.config.geolocation.clone();
                self.request(async move {
                    let result = geolocation.sample(&options).await.map(|fix| fix.position);
                    Event::Tracking(TrackingInput::Sampled { session, result })
                });
            }
            Effect::Settle { session, position } => {
                let delay = self.config.settle_delay;
                self.request(async move {
                    tokio::time::sleep(delay).await;
                    Event::Tracking(TrackingInput::Settled { session, position })
                });
            }

            Effect::StartWatch => self.start_watch(),
            Effect::StopWatch => self.stop_watch(),
            Effect::PostLiveLocation {
                vehicle_id,
                position,
            } => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    if let Err(e) = store.post_live_location(vehicle_id, position).await {
                        warn!(%vehicle_id, error = %e, "Failed to post live location");
                    }
                });
            }
        }
    }

    /// Run `work` on its own task and queue the event it resolves to.
    fn request<F>(&self, work: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = work.await;
            if events.send(event).is_err() {
                debug!("Controller stopped before a request completed");
            }
        });
    }

    fn emit(&self, update: ViewUpdate) {
        if self.view_tx.send(update).is_err() {
            debug!("View receiver dropped, discarding update");
        }
    }

    fn schedule_ticks(&mut self, session: TrackingSessionId, period: Duration) {
        // Only one schedule may exist.
        self.cancel_ticks();

        let events = self.events_tx.clone();
        self.ticks = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let tick = TrackingInput::Tick {
                    session: session.clone(),
                };
                if events.send(Event::Tracking(tick)).is_err() {
                    break;
                }
            }
        }));
    }

    fn cancel_ticks(&mut self) {
        if let Some(ticks) = self.ticks.take() {
            debug!("Cancelling tracking ticks");
            ticks.abort();
        }
    }

    fn start_watch(&mut self) {
        self.stop_watch();

        let mut fixes = self.geolocation.watch(&self.config.geolocation);
        let events = self.events_tx.clone();
        self.watch = Some(tokio::spawn(async move {
            while let Some(result) = fixes.next().await {
                let fix = LiveLocationInput::Fix(result.map(|fix| fix.position));
                if events.send(Event::LiveLocation(fix)).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_watch(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.abort();
        }
    }

    fn spawn_fleet_refresh(&self) -> JoinHandle<()> {
        let events = self.events_tx.clone();
        let period = self.config.fleet_refresh;
        tokio::spawn(async move {
            if events.send(Event::RefreshFleet).is_err() || period.is_zero() {
                return;
            }
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if events.send(Event::RefreshFleet).is_err() {
                    break;
                }
            }
        })
    }
}

fn drain<M: StateMachine<Output = Effect>>(machine: &mut M) -> Vec<Effect> {
    std::iter::from_fn(|| machine.poll_output()).collect()
}

#[cfg(test)]
mod tests;
