//! Device location acquisition.
//!
//! [`LocationResolver::resolve`] checks permission and service state, listens
//! on the best available provider until a fix arrives or the time budget runs
//! out, then falls back to the last known location of each provider in
//! priority order.
//!
//! At most one listener is registered per resolution, and it is removed
//! exactly once whether the resolution succeeds, fails, or is dropped.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::model::Coordinate;

pub mod fixed;

/// Default time to wait for a live fix before falling back.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A platform location source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationProvider {
    Fused,
    Gps,
    Network,
    Passive,
}

impl LocationProvider {
    /// Most accurate first.
    pub const PRIORITY: [LocationProvider; 4] = [
        LocationProvider::Fused,
        LocationProvider::Gps,
        LocationProvider::Network,
        LocationProvider::Passive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationProvider::Fused => "fused",
            LocationProvider::Gps => "gps",
            LocationProvider::Network => "network",
            LocationProvider::Passive => "passive",
        }
    }
}

impl fmt::Display for LocationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest-priority provider in `available`, or passive when none of them is.
pub fn best_provider(available: &[LocationProvider]) -> LocationProvider {
    LocationProvider::PRIORITY
        .into_iter()
        .find(|p| available.contains(p))
        .unwrap_or(LocationProvider::Passive)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission not granted")]
    PermissionDenied,
    #[error("location services are disabled")]
    LocationDisabled,
    #[error("failed to find location")]
    NoFix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Handle the platform calls back on when a fix arrives.
#[derive(Debug, Clone)]
pub struct LocationListener {
    id: ListenerId,
    tx: mpsc::UnboundedSender<Coordinate>,
}

impl LocationListener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn on_location_changed(&self, coordinate: Coordinate) {
        // The resolver may already be gone; a late fix is simply dropped.
        let _ = self.tx.send(coordinate);
    }
}

pub trait LocationPermission: Send + Sync {
    fn is_location_permission_granted(&self) -> bool;
}

pub trait LocationPlatform: Send + Sync {
    fn list_providers(&self) -> Vec<LocationProvider>;

    fn is_location_enabled(&self) -> bool;

    fn request_updates(&self, provider: LocationProvider, listener: LocationListener);

    fn remove_updates(&self, listener: ListenerId);

    fn last_known_location(&self, provider: LocationProvider) -> Option<Coordinate>;
}

/// Owns one listener registration and removes it on release or drop.
struct Registration<'a> {
    platform: &'a dyn LocationPlatform,
    id: Option<ListenerId>,
}

impl<'a> Registration<'a> {
    fn register(
        platform: &'a dyn LocationPlatform,
        provider: LocationProvider,
        listener: LocationListener,
    ) -> Self {
        let id = listener.id();
        platform.request_updates(provider, listener);
        Self { platform, id: Some(id) }
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.platform.remove_updates(id);
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct LocationResolver {
    permission: Arc<dyn LocationPermission>,
    platform: Arc<dyn LocationPlatform>,
    timeout: Duration,
    next_listener: AtomicU64,
    in_flight: Mutex<()>,
}

impl fmt::Debug for LocationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationResolver").field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

impl LocationResolver {
    pub fn new(
        permission: Arc<dyn LocationPermission>,
        platform: Arc<dyn LocationPlatform>,
    ) -> Self {
        Self {
            permission,
            platform,
            timeout: DEFAULT_TIMEOUT,
            next_listener: AtomicU64::new(1),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the device coordinate.
    ///
    /// Overlapping calls on the same resolver run one after another.
    pub async fn resolve(&self) -> Result<Coordinate, LocationError> {
        let _guard = self.in_flight.lock().await;

        if !self.permission.is_location_permission_granted() {
            tracing::warn!("location permission not granted");
            return Err(LocationError::PermissionDenied);
        }
        if !self.platform.is_location_enabled() {
            tracing::warn!("location is disabled");
            return Err(LocationError::LocationDisabled);
        }

        let provider = best_provider(&self.platform.list_providers());
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let (tx, mut rx) = mpsc::unbounded_channel();

        tracing::debug!(%provider, timeout = ?self.timeout, "requesting location updates");
        let mut registration =
            Registration::register(self.platform.as_ref(), provider, LocationListener { id, tx });

        let fix = tokio::time::timeout(self.timeout, rx.recv()).await;
        registration.release();

        if let Ok(Some(coordinate)) = fix {
            tracing::info!(%provider, "got live location");
            return Ok(coordinate);
        }

        tracing::debug!("no live fix, trying last known locations");
        match self.last_known_location() {
            Some(coordinate) => Ok(coordinate),
            None => {
                tracing::error!("failed to find location");
                Err(LocationError::NoFix)
            }
        }
    }

    fn last_known_location(&self) -> Option<Coordinate> {
        LocationProvider::PRIORITY.into_iter().find_map(|provider| {
            let found = self.platform.last_known_location(provider);
            if found.is_some() {
                tracing::info!(%provider, "using last known location");
            }
            found
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, sync::Mutex as StdMutex};

    #[derive(Default)]
    struct Recorded {
        requested: Vec<(LocationProvider, ListenerId)>,
        removed: Vec<ListenerId>,
        listeners: Vec<LocationListener>,
    }

    struct FakePlatform {
        providers: Vec<LocationProvider>,
        enabled: bool,
        fix_on_request: Option<Coordinate>,
        last_known: HashMap<LocationProvider, Coordinate>,
        recorded: StdMutex<Recorded>,
    }

    impl FakePlatform {
        fn new(providers: Vec<LocationProvider>) -> Self {
            Self {
                providers,
                enabled: true,
                fix_on_request: None,
                last_known: HashMap::new(),
                recorded: StdMutex::new(Recorded::default()),
            }
        }

        fn requested(&self) -> Vec<(LocationProvider, ListenerId)> {
            self.recorded.lock().unwrap().requested.clone()
        }

        fn removed(&self) -> Vec<ListenerId> {
            self.recorded.lock().unwrap().removed.clone()
        }

        fn listener(&self) -> LocationListener {
            self.recorded.lock().unwrap().listeners.last().cloned().unwrap()
        }
    }

    impl LocationPlatform for FakePlatform {
        fn list_providers(&self) -> Vec<LocationProvider> {
            self.providers.clone()
        }

        fn is_location_enabled(&self) -> bool {
            self.enabled
        }

        fn request_updates(&self, provider: LocationProvider, listener: LocationListener) {
            if let Some(c) = self.fix_on_request {
                listener.on_location_changed(c);
            }
            let mut rec = self.recorded.lock().unwrap();
            rec.requested.push((provider, listener.id()));
            rec.listeners.push(listener);
        }

        fn remove_updates(&self, listener: ListenerId) {
            self.recorded.lock().unwrap().removed.push(listener);
        }

        fn last_known_location(&self, provider: LocationProvider) -> Option<Coordinate> {
            self.last_known.get(&provider).copied()
        }
    }

    struct Permission(bool);

    impl LocationPermission for Permission {
        fn is_location_permission_granted(&self) -> bool {
            self.0
        }
    }

    fn resolver(granted: bool, platform: &Arc<FakePlatform>) -> LocationResolver {
        LocationResolver::new(Arc::new(Permission(granted)), platform.clone())
    }

    #[test]
    fn best_provider_prefers_accuracy() {
        use LocationProvider::*;
        assert_eq!(best_provider(&[Passive, Network, Gps, Fused]), Fused);
        assert_eq!(best_provider(&[Network, Gps]), Gps);
        assert_eq!(best_provider(&[Passive, Network]), Network);
        assert_eq!(best_provider(&[]), Passive);
    }

    #[tokio::test]
    async fn permission_denied_registers_nothing() {
        let platform = Arc::new(FakePlatform::new(vec![LocationProvider::Gps]));

        let err = resolver(false, &platform).resolve().await.unwrap_err();

        assert_eq!(err, LocationError::PermissionDenied);
        assert!(platform.requested().is_empty());
    }

    #[tokio::test]
    async fn disabled_location_fails_before_registering() {
        let mut fake = FakePlatform::new(vec![LocationProvider::Gps]);
        fake.enabled = false;
        let platform = Arc::new(fake);

        let err = resolver(true, &platform).resolve().await.unwrap_err();

        assert_eq!(err, LocationError::LocationDisabled);
        assert!(platform.requested().is_empty());
    }

    #[tokio::test]
    async fn live_fix_wins_and_deregisters() {
        let mut fake = FakePlatform::new(vec![LocationProvider::Network, LocationProvider::Gps]);
        fake.fix_on_request = Some(Coordinate::new(31.23, 121.47));
        let platform = Arc::new(fake);

        let coordinate = resolver(true, &platform).resolve().await.unwrap();

        assert_eq!(coordinate, Coordinate::new(31.23, 121.47));
        let requested = platform.requested();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].0, LocationProvider::Gps);
        assert_eq!(platform.removed(), vec![requested[0].1]);
    }

    #[tokio::test(start_paused = true)]
    async fn fix_arriving_mid_wait_is_used() {
        let platform = Arc::new(FakePlatform::new(vec![LocationProvider::Fused]));
        let resolver = Arc::new(resolver(true, &platform));

        let task = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve().await }
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        platform.listener().on_location_changed(Coordinate::new(1.0, 2.0));

        assert_eq!(task.await.unwrap(), Ok(Coordinate::new(1.0, 2.0)));
        assert_eq!(platform.removed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back_to_last_known_gps() {
        let mut fake = FakePlatform::new(vec![LocationProvider::Gps, LocationProvider::Network]);
        let gps_fix = Coordinate::new(39.90, 116.41);
        fake.last_known.insert(LocationProvider::Gps, gps_fix);
        fake.last_known.insert(LocationProvider::Passive, Coordinate::new(0.0, 0.0));
        let platform = Arc::new(fake);

        let coordinate = resolver(true, &platform).resolve().await.unwrap();

        assert_eq!(coordinate, gps_fix);
        let requested = platform.requested();
        assert_eq!(requested.len(), 1);
        assert_eq!(platform.removed(), vec![requested[0].1]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_last_known_is_no_fix() {
        let platform = Arc::new(FakePlatform::new(vec![LocationProvider::Network]));

        let err = resolver(true, &platform)
            .with_timeout(Duration::from_secs(2))
            .resolve()
            .await
            .unwrap_err();

        assert_eq!(err, LocationError::NoFix);
        assert_eq!(platform.removed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_mid_wait_deregisters() {
        let platform = Arc::new(FakePlatform::new(vec![LocationProvider::Gps]));
        let resolver = resolver(true, &platform);

        let outcome = tokio::time::timeout(Duration::from_secs(1), resolver.resolve()).await;

        assert!(outcome.is_err());
        assert_eq!(platform.requested().len(), 1);
        assert_eq!(platform.removed(), vec![platform.requested()[0].1]);
    }

    #[tokio::test(start_paused = true)]
    async fn each_resolution_uses_a_fresh_listener() {
        let mut fake = FakePlatform::new(vec![LocationProvider::Gps]);
        fake.fix_on_request = Some(Coordinate::new(5.0, 5.0));
        let platform = Arc::new(fake);
        let resolver = resolver(true, &platform);

        resolver.resolve().await.unwrap();
        resolver.resolve().await.unwrap();

        let ids: Vec<_> = platform.requested().into_iter().map(|(_, id)| id).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(platform.removed(), ids);
    }
}
