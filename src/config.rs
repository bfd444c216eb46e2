use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::geolocation::SampleOptions;
use crate::vehicle::VehicleId;

/// Configuration for the tracking client.
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Base url of the backend api (e.g. `http://localhost:8000/api/`).
    /// All backend paths are resolved relative to it.
    pub backend_url: Url,

    /// Path of the routing proxy relative to [`backend_url`](Self::backend_url).
    #[builder(default = "route".to_string())]
    pub routing_path: String,

    /// Vehicle followed by live tracking. Live tracking refuses to start without one.
    pub tracking_vehicle: Option<VehicleId>,

    /// Period of the live tracking tick.
    #[builder(default = Duration::from_secs(10))]
    pub tick_period: Duration,

    /// Distance in meters under which live tracking reports arrival.
    #[builder(default = 50.0)]
    pub arrival_threshold_m: f64,

    /// Delay between a tracking sample and the arrival check / re-route it triggers.
    #[builder(default = Duration::from_millis(500))]
    pub settle_delay: Duration,

    /// Period of the fleet feed refresh.
    #[builder(default = Duration::from_secs(15))]
    pub fleet_refresh: Duration,

    /// Options for every location sample and watch.
    #[builder(default)]
    pub geolocation: SampleOptions,

    /// Where live location fixes are posted, if anywhere.
    pub ingest: Option<IngestConfig>,
}

/// Live location ingest endpoint and its shared token.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub url: Url,
    pub token: String,
}

impl ClientConfig {
    /// Resolve `path` against the backend base url.
    ///
    /// The base is treated as a directory even when configured without a trailing slash.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.backend_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        base.join(path.trim_start_matches('/'))
    }

    /// The subset of the configuration used by the live tracking machine.
    pub fn tracking_settings(&self) -> TrackingSettings {
        TrackingSettings {
            vehicle: self.tracking_vehicle,
            tick_period: self.tick_period,
            arrival_threshold_m: self.arrival_threshold_m,
        }
    }
}

/// Live tracking parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub vehicle: Option<VehicleId>,
    pub tick_period: Duration,
    pub arrival_threshold_m: f64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            vehicle: None,
            tick_period: Duration::from_secs(10),
            arrival_threshold_m: 50.0,
        }
    }
}
