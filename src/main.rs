//! Nimbus command line: ask for a forecast the way the voice skill would.

mod error_mapping;
mod skill;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use nimbus_core::Config;
use nimbus_weather::TemperatureUnit;

use crate::skill::WeatherSkill;

/// Weather forecasts with an offline-tolerant cache
#[derive(Parser)]
#[command(name = "nimbus", about = "Weather forecasts with an offline-tolerant cache")]
struct Cli {
    /// Place name or "lat,lon". Falls back to `default_location` from the config.
    location: Vec<String>,

    /// Temperature unit for this request only
    #[arg(long, value_enum)]
    unit: Option<UnitArg>,

    /// Print the display model as JSON instead of sentences
    #[arg(long)]
    json: bool,

    /// Serve cached forecasts younger than this many minutes
    #[arg(long)]
    refresh_ttl_minutes: Option<u32>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drop the cached forecast for the location and exit
    #[arg(long)]
    forget: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    Celsius,
    Fahrenheit,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Celsius => TemperatureUnit::Celsius,
            UnitArg::Fahrenheit => TemperatureUnit::Fahrenheit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    nimbus_core::init()?;

    let (config, _) =
        Config::load_validated(cli.config.as_deref()).map_err(|e| report(e.into()))?;
    tracing::info!("Using data directory {}", config.data_dir.display());

    let mut skill = WeatherSkill::new(&config).map_err(report)?;
    if let Some(minutes) = cli.refresh_ttl_minutes {
        skill = skill.with_ttl(Duration::from_secs(u64::from(minutes) * 60));
    }
    tracing::debug!("Display preferences: {:?}", skill.preferences());

    let location = cli.location.join(" ");
    let location = (!location.trim().is_empty()).then_some(location.as_str());

    if cli.forget {
        let removed = skill.forget(location).map_err(report)?;
        if removed {
            println!("Forgot the cached forecast.");
        } else {
            println!("Nothing cached for that location.");
        }
        return Ok(());
    }

    let response = skill
        .forecast(location, cli.unit.map(Into::into))
        .await
        .map_err(report)?;
    tracing::debug!("Forecast origin: {:?}", response.origin);

    if let Some(notice) = response.notice {
        eprintln!("{notice}");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response.display)?);
    } else {
        for line in &response.speech {
            println!("{line}");
        }
    }

    Ok(())
}

/// Print the user-facing message and keep the full error for the exit status.
fn report(err: nimbus_core::AppError) -> anyhow::Error {
    eprintln!("{}", err.user_message());
    anyhow::Error::new(err)
}
