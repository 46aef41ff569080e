use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::{
    config::Endpoints,
    model::{City, CurrentConditions, DailyForecast},
};

use super::WeatherProvider;

pub const DEFAULT_WEATHER_URL: &str = "https://devapi.qweather.com";
pub const DEFAULT_GEO_URL: &str = "https://geoapi.qweather.com";

const LOOKUP_LIMIT: &str = "20";
const CODE_OK: &str = "200";
const CODE_NO_DATA: &str = "404";

#[derive(Debug, Clone)]
pub struct QWeatherProvider {
    api_key: String,
    weather_url: String,
    geo_url: String,
    http: Client,
}

impl QWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoints(api_key, &Endpoints::default())
    }

    pub fn with_endpoints(api_key: String, endpoints: &Endpoints) -> Self {
        Self {
            api_key,
            weather_url: endpoints.weather_url.trim_end_matches('/').to_string(),
            geo_url: endpoints.geo_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// GET `url` and return the API status code together with the raw body.
    async fn fetch(
        &self,
        url: &str,
        params: &[(&str, &str)],
        what: &str,
    ) -> Result<(String, String)> {
        tracing::debug!(url, ?params, "QWeather {what} request");

        let mut query: Vec<(&str, &str)> = params.iter().copied().collect();
        query.push(("key", self.api_key.as_str()));

        let res = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to QWeather ({what})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read QWeather {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "QWeather {what} request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let envelope: QwEnvelope = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse QWeather {what} JSON"))?;

        Ok((envelope.code, body))
    }
}

fn check_code(code: &str, what: &str) -> Result<()> {
    if code == CODE_OK {
        Ok(())
    } else {
        Err(anyhow!("QWeather {what} request returned code {code}"))
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Str(s) => s,
        Loose::Num(n) => n.to_string(),
    })
}

fn parse_field<T>(value: &str, field: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().with_context(|| format!("Invalid QWeather field {field}: {value:?}"))
}

/// QWeather times look like `2020-06-30T21:40+08:00`.
fn parse_time(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

#[derive(Debug, Deserialize)]
struct QwEnvelope {
    #[serde(deserialize_with = "lenient_string")]
    code: String,
}

#[derive(Debug, Deserialize)]
struct QwLocation {
    name: String,
    id: String,
    #[serde(default)]
    adm2: String,
    #[serde(default)]
    adm1: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct QwLookupResponse {
    #[serde(default)]
    location: Vec<QwLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QwNow {
    #[serde(default)]
    obs_time: String,
    #[serde(deserialize_with = "lenient_string")]
    temp: String,
    #[serde(deserialize_with = "lenient_string")]
    feels_like: String,
    #[serde(deserialize_with = "lenient_string")]
    icon: String,
    text: String,
    #[serde(default)]
    wind_dir: String,
    #[serde(default, deserialize_with = "lenient_string")]
    wind_scale: String,
    #[serde(deserialize_with = "lenient_string")]
    humidity: String,
}

#[derive(Debug, Deserialize)]
struct QwNowResponse {
    now: Option<QwNow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QwDaily {
    fx_date: String,
    #[serde(deserialize_with = "lenient_string")]
    temp_max: String,
    #[serde(deserialize_with = "lenient_string")]
    temp_min: String,
    #[serde(deserialize_with = "lenient_string")]
    icon_day: String,
    text_day: String,
    #[serde(deserialize_with = "lenient_string")]
    icon_night: String,
    text_night: String,
    #[serde(default)]
    wind_dir_day: String,
    #[serde(default, deserialize_with = "lenient_string")]
    wind_scale_day: String,
    #[serde(default)]
    wind_dir_night: String,
    #[serde(default, deserialize_with = "lenient_string")]
    wind_scale_night: String,
}

#[derive(Debug, Deserialize)]
struct QwForecastResponse {
    daily: Option<Vec<QwDaily>>,
}

impl From<QwLocation> for City {
    fn from(l: QwLocation) -> Self {
        City::new(l.id, l.name, l.adm2, l.adm1, l.country)
    }
}

impl TryFrom<QwNow> for CurrentConditions {
    type Error = anyhow::Error;

    fn try_from(now: QwNow) -> Result<Self> {
        Ok(CurrentConditions {
            temperature_c: parse_field(&now.temp, "temp")?,
            feels_like_c: parse_field(&now.feels_like, "feelsLike")?,
            icon: parse_field(&now.icon, "icon")?,
            humidity_pct: parse_field(&now.humidity, "humidity")?,
            observation_time: parse_time(&now.obs_time),
            condition: now.text,
            wind_dir: now.wind_dir,
            wind_scale: now.wind_scale,
        })
    }
}

impl TryFrom<QwDaily> for DailyForecast {
    type Error = anyhow::Error;

    fn try_from(d: QwDaily) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&d.fx_date, "%Y-%m-%d")
            .with_context(|| format!("Invalid QWeather field fxDate: {:?}", d.fx_date))?;
        // Temperatures are whole degrees but may come as "12.0".
        let temp_max: f64 = parse_field(&d.temp_max, "tempMax")?;
        let temp_min: f64 = parse_field(&d.temp_min, "tempMin")?;

        Ok(DailyForecast {
            date,
            temp_max_c: temp_max.round() as i32,
            temp_min_c: temp_min.round() as i32,
            icon_day: parse_field(&d.icon_day, "iconDay")?,
            icon_night: parse_field(&d.icon_night, "iconNight")?,
            text_day: d.text_day,
            text_night: d.text_night,
            wind_dir_day: d.wind_dir_day,
            wind_scale_day: d.wind_scale_day,
            wind_dir_night: d.wind_dir_night,
            wind_scale_night: d.wind_scale_night,
        })
    }
}

#[async_trait]
impl WeatherProvider for QWeatherProvider {
    async fn lookup_city(&self, location: &str) -> Result<Vec<City>> {
        let url = format!("{}/v2/city/lookup", self.geo_url);
        let (code, body) = self
            .fetch(&url, &[("location", location), ("number", LOOKUP_LIMIT)], "city lookup")
            .await?;

        if code == CODE_NO_DATA {
            return Ok(Vec::new());
        }
        check_code(&code, "city lookup")?;

        let parsed: QwLookupResponse =
            serde_json::from_str(&body).context("Failed to parse QWeather city lookup JSON")?;

        Ok(parsed.location.into_iter().map(City::from).collect())
    }

    async fn current_conditions(&self, city_id: &str) -> Result<CurrentConditions> {
        let url = format!("{}/v7/weather/now", self.weather_url);
        let (code, body) = self.fetch(&url, &[("location", city_id)], "current weather").await?;
        check_code(&code, "current weather")?;

        let parsed: QwNowResponse =
            serde_json::from_str(&body).context("Failed to parse QWeather current weather JSON")?;

        let now = parsed
            .now
            .ok_or_else(|| anyhow!("QWeather current weather response contained no data"))?;

        now.try_into()
    }

    async fn forecast(&self, city_id: &str) -> Result<Vec<DailyForecast>> {
        let url = format!("{}/v7/weather/7d", self.weather_url);
        let (code, body) = self.fetch(&url, &[("location", city_id)], "forecast").await?;
        check_code(&code, "forecast")?;

        let parsed: QwForecastResponse =
            serde_json::from_str(&body).context("Failed to parse QWeather forecast JSON")?;

        parsed
            .daily
            .ok_or_else(|| anyhow!("QWeather forecast response contained no data"))?
            .into_iter()
            .map(DailyForecast::try_from)
            .collect()
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
