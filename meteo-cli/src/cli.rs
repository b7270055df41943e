use anyhow::Context;
use clap::{Parser, Subcommand};

use meteo_core::{Config, ProviderId, WeatherEngine};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "meteo", version, about = "Multi-provider weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "yandex".
        provider: String,
    },

    /// Show current weather for coordinates.
    Current {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Show an hourly forecast for coordinates.
    Hourly {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Number of hours to include.
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },

    /// Show a daily forecast for coordinates.
    Daily {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Number of days to include.
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Current { lat, lon } => {
                validate_coordinates(lat, lon)?;
                let engine = engine()?;
                let point = engine
                    .get_current(lat, lon)
                    .await
                    .context("Weather service is temporarily unavailable")?;
                print_json(&point)
            }
            Command::Hourly { lat, lon, hours } => {
                validate_coordinates(lat, lon)?;
                let engine = engine()?;
                let points = engine
                    .get_hourly(lat, lon, hours)
                    .await
                    .context("Weather service is temporarily unavailable")?;
                print_json(&points)
            }
            Command::Daily { lat, lon, days } => {
                validate_coordinates(lat, lon)?;
                let engine = engine()?;
                let points = engine
                    .get_daily(lat, lon, days)
                    .await
                    .context("Weather service is temporarily unavailable")?;
                print_json(&points)
            }
        }
    }
}

fn engine() -> anyhow::Result<WeatherEngine> {
    let config = Config::load()?;
    WeatherEngine::from_config(&config)
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    if !id.requires_api_key() {
        println!("Provider '{id}' does not require an API key; it is ready to use.");
        return Ok(());
    }

    let api_key = inquire::Password::new(&format!("API key for '{id}':"))
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    let mut config = Config::load()?;
    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.save()?;

    println!("Saved API key for '{id}' to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Reject out-of-range coordinates before the engine is ever invoked.
fn validate_coordinates(lat: f64, lon: f64) -> anyhow::Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        anyhow::bail!("latitude must be between -90 and 90, got {lat}");
    }
    if !(-180.0..=180.0).contains(&lon) {
        anyhow::bail!("longitude must be between -180 and 180, got {lon}");
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
