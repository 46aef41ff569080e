use crate::{
    Config,
    model::{City, CurrentConditions, DailyForecast},
    provider::qweather::QWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod qweather;

/// Remote weather and geocoding API.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Cities matching a name or a `"lon,lat"` query, best match first.
    async fn lookup_city(&self, location: &str) -> anyhow::Result<Vec<City>>;

    async fn current_conditions(&self, city_id: &str) -> anyhow::Result<CurrentConditions>;

    async fn forecast(&self, city_id: &str) -> anyhow::Result<Vec<DailyForecast>>;
}

/// Construct the provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.require_api_key()?;

    Ok(Box::new(QWeatherProvider::with_endpoints(
        api_key.to_owned(),
        &config.endpoints,
    )))
}
