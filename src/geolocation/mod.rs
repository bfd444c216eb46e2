//! Location sampling for live tracking and the live location marker.
//!
//! A [`GeolocationSource`] supplies one-shot samples bounded by a timeout and a maximum sample
//! age, and a continuous watch stream. Hosts without a location capability report
//! [`GeolocationError::CapabilityAbsent`] instead of silently never answering.

use std::future::Future;
use std::time::Duration;

use async_stream::stream;
use bon::Builder;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::geo::LatLon;

pub use self::error::GeolocationError;

pub mod error;

/// Options recognised by every [`GeolocationSource`].
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct SampleOptions {
    /// Ask the host for its most precise positioning mode.
    #[builder(default = true)]
    pub enable_high_accuracy: bool,

    /// Samples older than this are rejected rather than reused.
    #[builder(default = Duration::from_secs(10))]
    pub max_sample_age: Duration,

    /// Upper bound on waiting for a sample.
    #[builder(default = Duration::from_secs(20))]
    pub timeout: Duration,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A location sample and the instant it was captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub position: LatLon,
    pub captured_at: Instant,
}

impl Fix {
    pub fn now(position: LatLon) -> Self {
        Self {
            position,
            captured_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

/// The host's location capability.
pub trait GeolocationSource: Send + Sync + 'static {
    /// Whether the host can produce samples at all.
    fn is_available(&self) -> bool;

    /// Resolve one fresh sample, honouring [`SampleOptions::timeout`] and
    /// [`SampleOptions::max_sample_age`].
    fn sample(
        &self,
        options: &SampleOptions,
    ) -> impl Future<Output = Result<Fix, GeolocationError>> + Send;

    /// Continuous samples until the stream is dropped.
    fn watch(&self, options: &SampleOptions) -> BoxStream<'static, Result<Fix, GeolocationError>>;
}

/// Creates a connected ([`FixPublisher`], [`FixFeed`]) pair.
///
/// The publisher is fed by whatever actually observes the vehicle (a GPS daemon, a console, a
/// replay file); the feed side is handed to the controller.
pub fn fix_feed() -> (FixPublisher, FixFeed) {
    let (tx, rx) = watch::channel(None);
    (FixPublisher { tx }, FixFeed { rx })
}

/// Producer half of [`fix_feed`].
#[derive(Debug)]
pub struct FixPublisher {
    tx: watch::Sender<Option<Fix>>,
}

impl FixPublisher {
    /// Publish a sample captured now.
    pub fn publish(&self, position: LatLon) {
        self.publish_fix(Fix::now(position));
    }

    pub fn publish_fix(&self, fix: Fix) {
        debug!(lat = fix.position.lat, lon = fix.position.lon, "Location sample published");
        self.tx.send_replace(Some(fix));
    }
}

/// [`GeolocationSource`] backed by the latest sample of a [`FixPublisher`].
#[derive(Debug, Clone)]
pub struct FixFeed {
    rx: watch::Receiver<Option<Fix>>,
}

impl GeolocationSource for FixFeed {
    fn is_available(&self) -> bool {
        true
    }

    async fn sample(&self, options: &SampleOptions) -> Result<Fix, GeolocationError> {
        let mut rx = self.rx.clone();
        let max_age = options.max_sample_age;

        let wait_fresh = async {
            loop {
                let current = *rx.borrow_and_update();
                if let Some(fix) = current.filter(|fix| fix.age() <= max_age) {
                    return Ok(fix);
                }
                if rx.changed().await.is_err() {
                    return Err(GeolocationError::Closed);
                }
            }
        };

        match tokio::time::timeout(options.timeout, wait_fresh).await {
            Ok(result) => result,
            Err(_) => {
                let latest = *self.rx.borrow();
                match latest {
                    Some(fix) => Err(GeolocationError::Stale { age: fix.age() }),
                    None => Err(GeolocationError::Timeout(options.timeout)),
                }
            }
        }
    }

    fn watch(&self, options: &SampleOptions) -> BoxStream<'static, Result<Fix, GeolocationError>> {
        let mut rx = self.rx.clone();
        let timeout = options.timeout;
        let max_age = options.max_sample_age;

        Box::pin(stream! {
            let current = *rx.borrow_and_update();
            if let Some(fix) = current.filter(|fix| fix.age() <= max_age) {
                yield Ok(fix);
            }

            loop {
                match tokio::time::timeout(timeout, rx.changed()).await {
                    Ok(Ok(())) => {
                        let latest = *rx.borrow_and_update();
                        if let Some(fix) = latest {
                            yield Ok(fix);
                        }
                    }
                    Ok(Err(_)) => {
                        yield Err(GeolocationError::Closed);
                        break;
                    }
                    Err(_) => yield Err(GeolocationError::Timeout(timeout)),
                }
            }
        })
    }
}

/// [`GeolocationSource`] of a host without any location capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocation;

impl GeolocationSource for NoGeolocation {
    fn is_available(&self) -> bool {
        false
    }

    async fn sample(&self, _options: &SampleOptions) -> Result<Fix, GeolocationError> {
        Err(GeolocationError::CapabilityAbsent)
    }

    fn watch(&self, _options: &SampleOptions) -> BoxStream<'static, Result<Fix, GeolocationError>> {
        Box::pin(futures::stream::once(async {
            Err(GeolocationError::CapabilityAbsent)
        }))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn options(max_age_ms: u64, timeout_ms: u64) -> SampleOptions {
        SampleOptions::builder()
            .max_sample_age(Duration::from_millis(max_age_ms))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
    }

    #[test]
    fn test_default_options() {
        let options = SampleOptions::default();
        assert!(options.enable_high_accuracy);
        assert_eq!(options.max_sample_age, Duration::from_secs(10));
        assert_eq!(options.timeout, Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_sample_is_returned() {
        let (publisher, feed) = fix_feed();
        publisher.publish(LatLon::new(53.3, -6.25));

        let fix = feed.sample(&options(1_000, 5_000)).await.unwrap();
        assert_eq!(fix.position, LatLon::new(53.3, -6.25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_any_sample() {
        let (_publisher, feed) = fix_feed();
        let err = feed.sample(&options(1_000, 500)).await.unwrap_err();
        assert_eq!(err, GeolocationError::Timeout(Duration::from_millis(500)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_sample_is_rejected() {
        let (publisher, feed) = fix_feed();
        publisher.publish(LatLon::new(53.3, -6.25));
        tokio::time::advance(Duration::from_secs(30)).await;

        let err = feed.sample(&options(1_000, 500)).await.unwrap_err();
        assert!(matches!(err, GeolocationError::Stale { .. }), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_fresh_sample() {
        let (publisher, feed) = fix_feed();
        publisher.publish(LatLon::new(1.0, 1.0));
        tokio::time::advance(Duration::from_secs(30)).await;

        let sampler = tokio::spawn(async move { feed.sample(&options(1_000, 5_000)).await });
        tokio::task::yield_now().await;
        publisher.publish(LatLon::new(2.0, 2.0));

        let fix = sampler.await.unwrap().unwrap();
        assert_eq!(fix.position, LatLon::new(2.0, 2.0));
    }

    #[tokio::test]
    async fn test_closed_feed() {
        let (publisher, feed) = fix_feed();
        drop(publisher);
        let err = feed.sample(&options(1_000, 5_000)).await.unwrap_err();
        assert_eq!(err, GeolocationError::Closed);
    }

    #[tokio::test]
    async fn test_watch_yields_published_samples() {
        let (publisher, feed) = fix_feed();
        let mut stream = feed.watch(&options(1_000, 5_000));

        publisher.publish(LatLon::new(1.0, 2.0));
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.position, LatLon::new(1.0, 2.0));

        drop(publisher);
        assert_eq!(stream.next().await, Some(Err(GeolocationError::Closed)));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_absent_capability() {
        let source = NoGeolocation;
        assert!(!source.is_available());
        let err = source.sample(&SampleOptions::default()).await.unwrap_err();
        assert!(err.is_fatal());

        let mut stream = source.watch(&SampleOptions::default());
        assert_eq!(stream.next().await, Some(Err(GeolocationError::CapabilityAbsent)));
    }
}
