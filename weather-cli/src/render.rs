use chrono::Local;
use cityweather_core::{City, CityListStore, CurrentConditions, DailyForecast, UpdateStatus};

pub fn print_city_list(store: &CityListStore) {
    println!("Cities:");
    for (i, city) in store.cities().iter().enumerate() {
        let marker = if store.is_user_city(city) { "  [location]" } else { "" };
        println!("  {}. {city}{marker}", i + 1);
    }
    if !store.is_user_city_shown() {
        println!(
            "  (location city {} hidden; `cityweather city show-location` brings it back)",
            store.user_city().name
        );
    }
}

pub fn print_search_results(query: &str, cities: &[City]) {
    if cities.is_empty() {
        println!("No city found matching '{query}'.");
        return;
    }
    for city in cities {
        println!("  {:<12} {city}", city.id);
    }
}

pub fn print_current(city: &City, now: &CurrentConditions, status: UpdateStatus) {
    println!("{city}");
    println!("  {:.0}°C  {} ({})", now.temperature_c, now.condition, now.kind());
    println!("  Feels like {:.0}°C, humidity {}%", now.feels_like_c, now.humidity_pct);
    if !now.wind_dir.is_empty() {
        println!("  Wind {} scale {}", now.wind_dir, now.wind_scale);
    }
    let freshness = status.describe(Local::now());
    match now.observation_time {
        Some(at) => println!("  Observed {} ({freshness})", at.format("%Y-%m-%d %H:%M")),
        None => println!("  {freshness}"),
    }
}

pub fn print_status(city: &City, status: UpdateStatus) {
    println!("{}", status_line(city, status));
}

fn status_line(city: &City, status: UpdateStatus) -> String {
    format!("{city}: {}", status.describe(Local::now()))
}

pub fn print_forecast(city: &City, days: &[DailyForecast]) {
    println!("{city}");
    if days.is_empty() {
        println!("  No forecast available.");
        return;
    }
    for day in days {
        println!(
            "  {:>5}  {:>3}° / {:>3}°  day: {} ({}, {} {})  night: {} ({}, {} {})",
            day.short_date(),
            day.temp_max_c,
            day.temp_min_c,
            day.text_day,
            day.day_kind(),
            day.wind_dir_day,
            day.wind_scale_day,
            day.text_night,
            day.night_kind(),
            day.wind_dir_night,
            day.wind_scale_night,
        );
    }
}
