//! Location collaborators for hosts without positioning hardware.
//!
//! [`FixedLocation`] reports a configured coordinate through the network
//! provider, both as a live fix and as its last known location.

use std::sync::Mutex;

use crate::model::Coordinate;

use super::{ListenerId, LocationListener, LocationPermission, LocationPlatform, LocationProvider};

#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub bool);

impl LocationPermission for StaticPermission {
    fn is_location_permission_granted(&self) -> bool {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct FixedLocation {
    coordinate: Option<Coordinate>,
    active: Mutex<Option<ListenerId>>,
}

impl FixedLocation {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self { coordinate, active: Mutex::new(None) }
    }

    /// Listener currently registered, if any.
    pub fn active_listener(&self) -> Option<ListenerId> {
        *self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LocationPlatform for FixedLocation {
    fn list_providers(&self) -> Vec<LocationProvider> {
        vec![LocationProvider::Network, LocationProvider::Passive]
    }

    /// Disabled when no coordinate is configured.
    fn is_location_enabled(&self) -> bool {
        self.coordinate.is_some()
    }

    fn request_updates(&self, provider: LocationProvider, listener: LocationListener) {
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener.id());
        if let (LocationProvider::Network, Some(coordinate)) = (provider, self.coordinate) {
            listener.on_location_changed(coordinate);
        }
    }

    fn remove_updates(&self, listener: ListenerId) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if *active == Some(listener) {
            *active = None;
        }
    }

    fn last_known_location(&self, provider: LocationProvider) -> Option<Coordinate> {
        match provider {
            LocationProvider::Network => self.coordinate,
            _ => None,
        }
    }
}
