//! Weather state for the screen currently shown.
//!
//! [`WeatherService`] wraps the remote provider and turns its failures into
//! empty results or `false` returns, leaving previously fetched data intact.

use chrono::{DateTime, Local};
use std::sync::Arc;

use crate::{
    city_list::CityListStore,
    location::{LocationError, LocationResolver},
    model::{City, Coordinate, CurrentConditions, DailyForecast},
    provider::WeatherProvider,
};

/// When the current conditions were last refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStatus {
    #[default]
    Never,
    UpdatedAt(DateTime<Local>),
    Failed,
}

impl UpdateStatus {
    pub fn describe(&self, now: DateTime<Local>) -> String {
        match self {
            UpdateStatus::Never => "never updated".to_string(),
            UpdateStatus::Failed => "update failed".to_string(),
            UpdateStatus::UpdatedAt(at) => {
                let minutes = (now - *at).num_minutes();
                match minutes {
                    m if m < 1 => "just updated".to_string(),
                    m if m < 60 => format!("{m} minutes ago"),
                    m if m < 1440 => format!("{} hours ago", m / 60),
                    m => format!("{} days ago", m / 1440),
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    current_city: City,
    user_city: Option<City>,
    current: Option<CurrentConditions>,
    forecasts: Vec<DailyForecast>,
    status: UpdateStatus,
}

impl WeatherService {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            provider,
            current_city: City::default_city(),
            user_city: None,
            current: None,
            forecasts: Vec::new(),
            status: UpdateStatus::Never,
        }
    }

    pub fn current_city(&self) -> &City {
        &self.current_city
    }

    pub fn set_current_city(&mut self, city: City) {
        self.current_city = city;
    }

    pub fn user_city(&self) -> Option<&City> {
        self.user_city.as_ref()
    }

    /// Whether the city on screen is the device-location city.
    pub fn is_showing_user_city(&self) -> bool {
        self.user_city.as_ref() == Some(&self.current_city)
    }

    pub fn current_conditions(&self) -> Option<&CurrentConditions> {
        self.current.as_ref()
    }

    pub fn forecasts(&self) -> &[DailyForecast] {
        &self.forecasts
    }

    pub fn status(&self) -> UpdateStatus {
        self.status
    }

    pub fn mark_update_failed(&mut self) {
        self.status = UpdateStatus::Failed;
    }

    /// Cities matching `name`; empty when the lookup fails.
    pub async fn search_cities(&self, name: &str) -> Vec<City> {
        match self.provider.lookup_city(name).await {
            Ok(cities) => cities,
            Err(err) => {
                tracing::warn!(name, error = %format!("{err:#}"), "city search failed");
                Vec::new()
            }
        }
    }

    pub async fn update_current_weather(&mut self, city_id: &str) -> bool {
        match self.provider.current_conditions(city_id).await {
            Ok(conditions) => {
                self.current = Some(conditions);
                self.status = UpdateStatus::UpdatedAt(Local::now());
                true
            }
            Err(err) => {
                tracing::warn!(city_id, error = %format!("{err:#}"), "current weather update failed");
                false
            }
        }
    }

    pub async fn update_forecast(&mut self, city_id: &str) -> bool {
        match self.provider.forecast(city_id).await {
            Ok(forecasts) => {
                self.forecasts = forecasts;
                true
            }
            Err(err) => {
                tracing::warn!(city_id, error = %format!("{err:#}"), "forecast update failed");
                false
            }
        }
    }

    /// Reverse-geocode `coordinate` into the user city and hand it to `store`.
    ///
    /// A changed user city also becomes the current city. When the lookup
    /// yields nothing the previous user city is kept, or the default city is
    /// used if there was none.
    pub async fn resolve_user_city(
        &mut self,
        coordinate: Coordinate,
        store: &mut CityListStore,
    ) -> City {
        let found = self.search_cities(&coordinate.to_query()).await.into_iter().next();

        match found {
            Some(city) => {
                if self.user_city.as_ref() != Some(&city) {
                    tracing::info!(city = %city, "user city changed");
                    self.user_city = Some(city.clone());
                    self.current_city = city;
                }
            }
            None => self.fall_back_to_default_city(),
        }

        let user_city = self.user_city.clone().unwrap_or_else(City::default_city);
        store.set_user_city(user_city.clone());
        user_city
    }

    /// Resolve the device location and then the user city.
    ///
    /// On a location failure the user city falls back as in
    /// [`resolve_user_city`](Self::resolve_user_city) and the error is returned.
    pub async fn locate_user_city(
        &mut self,
        resolver: &LocationResolver,
        store: &mut CityListStore,
    ) -> Result<City, LocationError> {
        match resolver.resolve().await {
            Ok(coordinate) => Ok(self.resolve_user_city(coordinate, store).await),
            Err(err) => {
                self.fall_back_to_default_city();
                if let Some(city) = &self.user_city {
                    store.set_user_city(city.clone());
                }
                Err(err)
            }
        }
    }

    fn fall_back_to_default_city(&mut self) {
        if self.user_city.is_none() {
            let city = City::default_city();
            self.user_city = Some(city.clone());
            self.current_city = city;
        }
    }
}
