use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use cityweather_core::{
    City, CityListStore, Config, LocationResolver, WeatherService,
    location::fixed::{FixedLocation, StaticPermission},
    model::Coordinate,
    provider_from_config,
};
use inquire::{Confirm, CustomType, Password, PasswordDisplayMode, Select};
use std::{path::PathBuf, sync::Arc};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Weather for the cities you track")]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key and location settings.
    Configure,

    /// Search cities by name.
    Search {
        /// City name, e.g. "shanghai".
        name: String,
    },

    /// Manage the tracked city list.
    #[command(subcommand)]
    City(CityCommand),

    /// Resolve the device location and make it the location city.
    Locate,

    /// Show current conditions.
    Now {
        /// City name or id from your list; defaults to the first listed city.
        city: Option<String>,
    },

    /// Show the daily forecast.
    Forecast {
        /// City name or id from your list; defaults to the first listed city.
        city: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CityCommand {
    /// List tracked cities.
    List,

    /// Search for a city and add it to the list.
    Add {
        name: String,

        /// Take the best match instead of asking.
        #[arg(long)]
        first: bool,
    },

    /// Remove a city from the list. The location city is only hidden.
    Remove {
        /// City name or id.
        city: String,
    },

    /// Show the location city again after it was removed.
    ShowLocation,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::debug!(command = ?self.command, "running command");

        match self.command {
            Command::Configure => configure(),
            Command::Search { name } => {
                let session = Session::open()?;
                let cities = session.service.search_cities(&name).await;
                render::print_search_results(&name, &cities);
                Ok(())
            }
            Command::City(cmd) => run_city(cmd).await,
            Command::Locate => {
                let mut session = Session::open()?;
                session.locate().await?;
                session.save()
            }
            Command::Now { city } => {
                let mut session = Session::open()?;
                let city = session.pick_city(city.as_deref())?;
                session.service.set_current_city(city.clone());

                if !session.service.update_current_weather(&city.id).await {
                    session.service.mark_update_failed();
                    render::print_status(&city, session.service.status());
                    bail!("Failed to fetch current weather for {city}");
                }
                if let Some(now) = session.service.current_conditions() {
                    render::print_current(&city, now, session.service.status());
                }
                Ok(())
            }
            Command::Forecast { city } => {
                let mut session = Session::open()?;
                let city = session.pick_city(city.as_deref())?;

                if !session.service.update_forecast(&city.id).await {
                    bail!("Failed to fetch forecast for {city}");
                }
                render::print_forecast(&city, session.service.forecasts());
                Ok(())
            }
        }
    }
}

async fn run_city(cmd: CityCommand) -> anyhow::Result<()> {
    match cmd {
        CityCommand::List => {
            let store = load_store()?.1;
            render::print_city_list(&store);
            Ok(())
        }
        CityCommand::Add { name, first } => {
            let mut session = Session::open()?;
            let mut candidates = session.service.search_cities(&name).await;
            if candidates.is_empty() {
                bail!("No city found matching '{name}'.");
            }

            let city = if first || candidates.len() == 1 {
                candidates.swap_remove(0)
            } else {
                Select::new("Pick a city:", candidates).prompt()?
            };

            if session.store.add_city(city.clone()) {
                println!("Added {city}.");
            } else {
                println!("{city} is already in your list.");
            }
            render::print_city_list(&session.store);
            session.save()
        }
        CityCommand::Remove { city } => {
            let (path, mut store) = load_store()?;
            let target = find_city(&store, &city)?;

            if store.remove_city(&target) {
                println!("Removed {}.", target.name);
            } else {
                println!("The city list can't be empty.");
            }
            render::print_city_list(&store);
            store.save_to(&path)
        }
        CityCommand::ShowLocation => {
            let (path, mut store) = load_store()?;
            store.show_user_city();
            render::print_city_list(&store);
            store.save_to(&path)
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("QWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    config.set_api_key(api_key.trim().to_string());

    config.location.permission_granted =
        Confirm::new("Allow cityweather to use your location?")
            .with_default(config.location.permission_granted)
            .prompt()?;

    if config.location.permission_granted {
        let latitude = CustomType::<f64>::new("Latitude (leave empty to skip):")
            .with_error_message("Please type a decimal number")
            .prompt_skippable()?;
        let longitude = match latitude {
            Some(_) => CustomType::<f64>::new("Longitude:")
                .with_error_message("Please type a decimal number")
                .prompt_skippable()?,
            None => None,
        };
        let coordinate = latitude.zip(longitude).map(|(lat, lon)| Coordinate::new(lat, lon));
        config.set_location_coordinate(coordinate);
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Everything a networked command needs, wired up explicitly.
struct Session {
    config: Config,
    service: WeatherService,
    store: CityListStore,
    store_path: PathBuf,
}

impl Session {
    fn open() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let provider = provider_from_config(&config)?;
        let (store_path, store) = load_store()?;

        Ok(Self { config, service: WeatherService::new(Arc::from(provider)), store, store_path })
    }

    fn resolver(&self) -> LocationResolver {
        LocationResolver::new(
            Arc::new(StaticPermission(self.config.location.permission_granted)),
            Arc::new(FixedLocation::new(self.config.location_coordinate())),
        )
        .with_timeout(self.config.location_timeout())
    }

    async fn locate(&mut self) -> anyhow::Result<()> {
        let resolver = self.resolver();
        match self.service.locate_user_city(&resolver, &mut self.store).await {
            Ok(city) => println!("Location city: {city}"),
            Err(err) => {
                let fallback = self.store.user_city();
                println!("Could not determine your location ({err}); using {fallback}.");
                println!("Hint: run `cityweather configure` to allow location and set coordinates.");
            }
        }
        render::print_city_list(&self.store);
        Ok(())
    }

    fn pick_city(&self, query: Option<&str>) -> anyhow::Result<City> {
        match query {
            Some(q) => find_city(&self.store, q),
            None => self
                .store
                .cities()
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("Your city list is empty.")),
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        self.store.save_to(&self.store_path)
    }
}

fn load_store() -> anyhow::Result<(PathBuf, CityListStore)> {
    let path = Config::cities_file_path()?;
    let store = CityListStore::load_from(&path).context("Failed to load your city list")?;
    Ok((path, store))
}

fn find_city(store: &CityListStore, query: &str) -> anyhow::Result<City> {
    store.cities().iter().find(|c| c.matches(query)).cloned().ok_or_else(|| {
        anyhow!(
            "'{query}' is not in your city list.\n\
             Hint: run `cityweather city list` to see tracked cities."
        )
    })
}
