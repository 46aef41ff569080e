use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A city as returned by the geocoding API.
///
/// Equality is over every field, not just `id`: two records for the same
/// provider id with different region wording are distinct cities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    /// Second-level administrative region.
    pub adm2: String,
    /// First-level administrative region.
    pub adm1: String,
    pub country: String,
}

impl City {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        adm2: impl Into<String>,
        adm1: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            adm2: adm2.into(),
            adm1: adm1.into(),
            country: country.into(),
        }
    }

    /// City used before any device location has been resolved.
    pub fn default_city() -> Self {
        Self::new("101010100", "北京", "北京", "北京市", "中国")
    }

    /// Case-insensitive match against the id or the name.
    pub fn matches(&self, query: &str) -> bool {
        self.id == query || self.name.to_lowercase() == query.to_lowercase()
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.adm2.is_empty() || self.adm2 == self.name {
            write!(f, "{}, {}, {}", self.name, self.adm1, self.country)
        } else {
            write!(f, "{} ({}), {}, {}", self.name, self.adm2, self.adm1, self.country)
        }
    }
}

/// A resolved device position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// `"lon,lat"` with two decimals, the form accepted by the lookup endpoint.
    pub fn to_query(&self) -> String {
        format!("{:.2},{:.2}", self.longitude, self.latitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub condition: String,
    pub icon: u16,
    pub humidity_pct: u8,
    pub wind_dir: String,
    pub wind_scale: String,
    pub observation_time: Option<DateTime<FixedOffset>>,
}

impl CurrentConditions {
    pub fn kind(&self) -> WeatherKind {
        WeatherKind::from_icon(self.icon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temp_max_c: i32,
    pub temp_min_c: i32,
    pub text_day: String,
    pub icon_day: u16,
    pub text_night: String,
    pub icon_night: u16,
    pub wind_dir_day: String,
    pub wind_scale_day: String,
    pub wind_dir_night: String,
    pub wind_scale_night: String,
}

impl DailyForecast {
    /// Month/day without padding, e.g. `5/3`.
    pub fn short_date(&self) -> String {
        self.date.format("%-m/%-d").to_string()
    }

    pub fn day_kind(&self) -> WeatherKind {
        WeatherKind::from_icon(self.icon_day)
    }

    pub fn night_kind(&self) -> WeatherKind {
        WeatherKind::from_icon(self.icon_night)
    }
}

/// Display class of a provider icon code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherKind {
    SunnyDay,
    PartlyCloudyDay,
    Cloudy,
    ClearNight,
    PartlyCloudyNight,
    Thunder,
    Hail,
    Rain,
    Sleet,
    Snow,
    Fog,
    Wind,
    Haze,
}

impl WeatherKind {
    pub fn from_icon(icon: u16) -> Self {
        match icon {
            100 => WeatherKind::SunnyDay,
            101..=103 => WeatherKind::PartlyCloudyDay,
            104 => WeatherKind::Cloudy,
            150 => WeatherKind::ClearNight,
            151..=153 => WeatherKind::PartlyCloudyNight,
            302 | 303 => WeatherKind::Thunder,
            304 => WeatherKind::Hail,
            300..=399 => WeatherKind::Rain,
            404..=406 => WeatherKind::Sleet,
            400..=499 => WeatherKind::Snow,
            500 | 501 | 509 | 510 | 514 | 515 => WeatherKind::Fog,
            503..=508 => WeatherKind::Wind,
            500..=599 => WeatherKind::Haze,
            _ => WeatherKind::Cloudy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherKind::SunnyDay => "sunny",
            WeatherKind::PartlyCloudyDay => "partly cloudy",
            WeatherKind::Cloudy => "cloudy",
            WeatherKind::ClearNight => "clear night",
            WeatherKind::PartlyCloudyNight => "partly cloudy night",
            WeatherKind::Thunder => "thunderstorm",
            WeatherKind::Hail => "hail",
            WeatherKind::Rain => "rain",
            WeatherKind::Sleet => "sleet",
            WeatherKind::Snow => "snow",
            WeatherKind::Fog => "fog",
            WeatherKind::Wind => "wind",
            WeatherKind::Haze => "haze",
        }
    }
}

impl fmt::Display for WeatherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
