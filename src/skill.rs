//! The weather skill: one object the host calls per forecast request.

use std::time::Duration;

use nimbus_core::{AppError, Config, WeatherError};
use nimbus_weather::format::{speak_current, speak_day};
use nimbus_weather::{
    format, DisplayModel, ForecastCache, ForecastOrigin, LocationKey, Preferences,
    ProviderSettings, SharedForecastCache, TemperatureUnit, TimeFormat, WeatherProvider,
};

use crate::error_mapping::IntoAppError;

const STALE_NOTICE: &str =
    "I couldn't reach the weather service, so this is the last forecast I have.";

/// What the host gets back for one request
#[derive(Debug, Clone)]
pub struct SkillResponse {
    pub display: DisplayModel,
    pub speech: Vec<String>,
    pub origin: ForecastOrigin,
    /// Set when stale data is being served
    pub notice: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct WeatherSkill {
    provider: WeatherProvider,
    cache: SharedForecastCache,
    preferences: Preferences,
    ttl: Duration,
    default_location: Option<String>,
}

impl WeatherSkill {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let settings = ProviderSettings {
            forecast_url: config.weather.forecast_api_url.clone(),
            geocode_url: config.weather.geocode_api_url.clone(),
            timeout: Duration::from_secs(config.weather.request_timeout_secs),
            forecast_days: config.weather.forecast_days,
            reverse_geocode: config.weather.reverse_geocode,
        };
        let provider = WeatherProvider::new(&settings).map_err(IntoAppError::into_app_error)?;
        let cache = SharedForecastCache::new(ForecastCache::load_from_dir(&config.data_dir));
        let preferences = resolve_preferences(config);

        tracing::info!(
            "Weather skill ready ({} cached forecasts, unit {:?}, clock {:?})",
            cache.len(),
            preferences.temperature_unit,
            preferences.time_format
        );

        Ok(Self {
            provider,
            cache,
            preferences,
            ttl: Duration::from_secs(u64::from(config.weather.cache_ttl_minutes) * 60),
            default_location: config.default_location.clone(),
        })
    }

    /// Replace the configured cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences
    }

    /// Forecast for `location` (or the configured default).
    ///
    /// `unit_override` comes from the utterance ("in fahrenheit") and applies
    /// to this request only.
    pub async fn forecast(
        &self,
        location: Option<&str>,
        unit_override: Option<TemperatureUnit>,
    ) -> Result<SkillResponse, AppError> {
        let key = self.location_key(location)?;
        let forecast = self
            .cache
            .get_or_refresh(&self.provider, &key, self.ttl)
            .await
            .map_err(IntoAppError::into_app_error)?;

        let prefs = self.preferences.with_unit_override(unit_override);
        let display = format(&forecast.record, &prefs);

        let mut speech: Vec<String> = speak_current(&display).into_iter().collect();
        speech.extend(display.days.iter().map(speak_day));

        let notice = forecast.is_stale().then_some(STALE_NOTICE);
        Ok(SkillResponse {
            display,
            speech,
            origin: forecast.origin,
            notice,
        })
    }

    /// Drop the cached forecast for a location.
    pub fn forget(&self, location: Option<&str>) -> Result<bool, AppError> {
        let key = self.location_key(location)?;
        self.cache.remove(&key).map_err(IntoAppError::into_app_error)
    }

    fn location_key(&self, location: Option<&str>) -> Result<LocationKey, AppError> {
        let text = location
            .filter(|l| !l.trim().is_empty())
            .or(self.default_location.as_deref())
            .ok_or_else(|| {
                AppError::Weather(WeatherError::InvalidLocation(
                    "no location given and no default configured".to_string(),
                ))
            })?;
        LocationKey::parse(text).map_err(IntoAppError::into_app_error)
    }
}

/// Resolve `auto` settings against the configured locale.
pub fn resolve_preferences(config: &Config) -> Preferences {
    let locale = Preferences::from_locale(&config.locale);

    let temperature_unit = match config.weather.temperature_unit {
        nimbus_core::TemperatureUnit::Auto => locale.temperature_unit,
        nimbus_core::TemperatureUnit::Celsius => TemperatureUnit::Celsius,
        nimbus_core::TemperatureUnit::Fahrenheit => TemperatureUnit::Fahrenheit,
    };
    let time_format = match config.weather.time_format {
        nimbus_core::TimeFormat::Auto => locale.time_format,
        nimbus_core::TimeFormat::TwelveHour => TimeFormat::TwelveHour,
        nimbus_core::TimeFormat::TwentyFourHour => TimeFormat::TwentyFourHour,
    };

    Preferences::new(temperature_unit, time_format)
}
