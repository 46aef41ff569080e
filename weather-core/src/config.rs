use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{location::DEFAULT_TIMEOUT, model::Coordinate, provider::qweather};

/// Base URLs of the weather and geocoding APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub weather_url: String,
    pub geo_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            weather_url: qweather::DEFAULT_WEATHER_URL.to_string(),
            geo_url: qweather::DEFAULT_GEO_URL.to_string(),
        }
    }
}

/// Location settings for hosts without positioning hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Whether the user allowed the app to use their location.
    #[serde(default)]
    pub permission_granted: bool,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            permission_granted: false,
            latitude: None,
            longitude: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
///
/// [location]
/// permission_granted = true
/// latitude = 31.23
/// longitude = 121.47
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_key: Option<String>,

    #[serde(default)]
    pub endpoints: Endpoints,

    #[serde(default)]
    pub location: LocationConfig,
}

impl Config {
    /// API key, or an error telling the user how to configure one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `cityweather configure` and enter your QWeather API key."
            )
        })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// Configured coordinate, only when both halves are set.
    pub fn location_coordinate(&self) -> Option<Coordinate> {
        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    pub fn set_location_coordinate(&mut self, coordinate: Option<Coordinate>) {
        self.location.latitude = coordinate.map(|c| c.latitude);
        self.location.longitude = coordinate.map(|c| c.longitude);
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location.timeout_secs)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persisted city list.
    pub fn cities_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join("cities.toml"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "cityweather", "cityweather-cli")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
