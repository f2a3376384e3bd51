//! Weather forecasts for the Nimbus voice skill
//!
//! Fetches forecasts from Open-Meteo, keeps the last good answer per location
//! in a persistent cache, and formats records for the GUI and for speech.

pub mod cache;
pub mod format;
pub mod geocode;
pub mod location;
pub mod provider;
pub mod time;
pub mod types;

pub use cache::{CacheEntry, CacheError, CachedForecast, ForecastCache, ForecastOrigin, SharedForecastCache};
pub use format::{format, DisplayModel, Preferences, TemperatureUnit};
pub use geocode::{Geocoder, Place};
pub use location::{LocationKey, LocationKeyError};
pub use provider::{ForecastSource, ProviderSettings, WeatherProvider};
pub use time::{TimeFormat, TimePeriod};
pub use types::*;
