//! The user's tracked cities.
//!
//! The visible list is always rebuilt from three variables:
//! `show_user_city ? [user_city] + other_cities : other_cities`.
//! `other_cities` never contains a duplicate or a city equal to `user_city`,
//! and no operation leaves the visible list empty.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::model::City;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityListStore {
    user_city: City,
    other_cities: Vec<City>,
    show_user_city: bool,
    visible: Vec<City>,
}

impl Default for CityListStore {
    fn default() -> Self {
        Self::new(City::default_city())
    }
}

impl CityListStore {
    /// Store showing only `user_city`.
    pub fn new(user_city: City) -> Self {
        let mut store = Self {
            user_city,
            other_cities: Vec::new(),
            show_user_city: true,
            visible: Vec::new(),
        };
        store.recompute();
        store
    }

    /// The visible list, in display order.
    pub fn cities(&self) -> &[City] {
        &self.visible
    }

    pub fn user_city(&self) -> &City {
        &self.user_city
    }

    pub fn other_cities(&self) -> &[City] {
        &self.other_cities
    }

    pub fn is_user_city_shown(&self) -> bool {
        self.show_user_city
    }

    pub fn is_user_city(&self, city: &City) -> bool {
        self.user_city == *city
    }

    /// Adds a manually chosen city. Returns `false` when it is already visible.
    ///
    /// Adding the hidden user city brings it back instead of duplicating it
    /// into `other_cities`.
    pub fn add_city(&mut self, city: City) -> bool {
        if self.visible.contains(&city) {
            return false;
        }

        if self.is_user_city(&city) {
            self.show_user_city = true;
        } else {
            self.other_cities.push(city);
        }
        self.recompute();
        true
    }

    /// Removes `city` from the visible list. The user city is hidden, never dropped.
    ///
    /// Returns `false` and leaves the state alone when the city is not visible
    /// or when it is the last visible entry.
    pub fn remove_city(&mut self, city: &City) -> bool {
        if !self.visible.contains(city) {
            return false;
        }
        if self.visible.len() == 1 {
            tracing::debug!(city = %city.name, "refusing to remove the last visible city");
            return false;
        }

        if self.is_user_city(city) {
            self.show_user_city = false;
        } else {
            self.other_cities.retain(|c| c != city);
        }
        self.recompute();
        true
    }

    /// Promotes `city` to the location city.
    ///
    /// Visibility of the user city is left alone unless `city` was the only
    /// other city, in which case the user city is shown so the list stays
    /// non-empty.
    pub fn set_user_city(&mut self, city: City) {
        self.other_cities.retain(|c| *c != city);
        self.user_city = city;
        if self.other_cities.is_empty() {
            self.show_user_city = true;
        }
        self.recompute();
    }

    pub fn show_user_city(&mut self) {
        self.show_user_city = true;
        self.recompute();
    }

    /// Replaces the manually added cities wholesale.
    ///
    /// Duplicates and entries equal to the user city are dropped. If the
    /// result would leave nothing visible the user city is shown again.
    pub fn set_cities(&mut self, cities: Vec<City>) {
        let mut others: Vec<City> = Vec::with_capacity(cities.len());
        for city in cities {
            if city != self.user_city && !others.contains(&city) {
                others.push(city);
            }
        }
        self.other_cities = others;
        if self.other_cities.is_empty() {
            self.show_user_city = true;
        }
        self.recompute();
    }

    pub fn snapshot(&self) -> CityListSnapshot {
        CityListSnapshot {
            user_city: self.user_city.clone(),
            other_cities: self.other_cities.clone(),
            show_user_city: self.show_user_city,
        }
    }

    /// Rebuilds a store from a snapshot, restoring every invariant on the way.
    pub fn from_snapshot(snapshot: CityListSnapshot) -> Self {
        let mut store = Self::new(snapshot.user_city);
        store.set_cities(snapshot.other_cities);
        if !snapshot.show_user_city && !store.other_cities.is_empty() {
            store.show_user_city = false;
            store.recompute();
        }
        store
    }

    /// Load a store from a TOML file, or a fresh default store if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read city list: {}", path.display()))?;

        let snapshot: CityListSnapshot = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse city list: {}", path.display()))?;

        Ok(Self::from_snapshot(snapshot))
    }

    /// Save the store to a TOML file, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(&self.snapshot())
            .context("Failed to serialize city list to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write city list: {}", path.display()))?;

        Ok(())
    }

    fn recompute(&mut self) {
        let mut visible = Vec::with_capacity(self.other_cities.len() + 1);
        if self.show_user_city {
            visible.push(self.user_city.clone());
        }
        visible.extend(self.other_cities.iter().cloned());
        self.visible = visible;
    }
}

/// On-disk form of a [`CityListStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityListSnapshot {
    pub user_city: City,
    #[serde(default)]
    pub other_cities: Vec<City>,
    #[serde(default = "default_show_user_city")]
    pub show_user_city: bool,
}

fn default_show_user_city() -> bool {
    true
}

/// A [`CityListStore`] shared between writers, for embedders that mutate
/// the list from more than one thread.
///
/// Each call holds one lock for the whole mutation plus recomputation.
#[derive(Debug, Clone, Default)]
pub struct SharedCityListStore {
    inner: Arc<Mutex<CityListStore>>,
}

impl SharedCityListStore {
    pub fn new(store: CityListStore) -> Self {
        Self { inner: Arc::new(Mutex::new(store)) }
    }

    // Store operations don't panic between mutating and recomputing.
    fn lock(&self) -> MutexGuard<'_, CityListStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cities(&self) -> Vec<City> {
        self.lock().cities().to_vec()
    }

    pub fn add_city(&self, city: City) -> bool {
        self.lock().add_city(city)
    }

    pub fn remove_city(&self, city: &City) -> bool {
        self.lock().remove_city(city)
    }

    pub fn set_user_city(&self, city: City) {
        self.lock().set_user_city(city)
    }

    pub fn is_user_city(&self, city: &City) -> bool {
        self.lock().is_user_city(city)
    }

    pub fn show_user_city(&self) {
        self.lock().show_user_city()
    }

    /// Run `f` with exclusive access, e.g. to combine several operations.
    pub fn with<R>(&self, f: impl FnOnce(&mut CityListStore) -> R) -> R {
        f(&mut self.lock())
    }
}
