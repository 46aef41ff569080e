//! Core library for the `cityweather` CLI.
//!
//! This crate defines:
//! - Shared domain models (cities, coordinates, conditions, forecasts)
//! - The tracked city list and its invariants
//! - Device location resolution with provider fallback
//! - Abstraction over the remote weather/geocoding API
//! - Configuration handling
//!
//! It is used by `cityweather-cli`, but can also be reused by other front ends.

pub mod city_list;
pub mod config;
pub mod location;
pub mod model;
pub mod provider;
pub mod weather;

pub use city_list::{CityListSnapshot, CityListStore, SharedCityListStore};
pub use config::{Config, Endpoints, LocationConfig};
pub use location::{LocationError, LocationProvider, LocationResolver};
pub use model::{City, Coordinate, CurrentConditions, DailyForecast, WeatherKind};
pub use provider::{WeatherProvider, provider_from_config};
pub use weather::{UpdateStatus, WeatherService};
