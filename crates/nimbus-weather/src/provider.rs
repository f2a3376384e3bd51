//! Forecast provider speaking the Open-Meteo API.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::geocode::{base_url_with_slash, Geocoder, NOMINATIM_URL};
use crate::location::LocationKey;
use crate::types::{
    ConditionCode, CurrentConditions, DayForecast, FetchError, ForecastRecord, HourlyForecast,
    WeatherError,
};

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com";
const USER_AGENT: &str = concat!("Nimbus/", env!("CARGO_PKG_VERSION"));

const CURRENT_FIELDS: &str =
    "temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,weather_code";
const HOURLY_FIELDS: &str = "temperature_2m,weather_code,precipitation_probability";
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,sunrise,sunset,precipitation_probability_max";

/// Anything that can produce a fresh forecast for a key.
pub trait ForecastSource {
    fn fetch(
        &self,
        key: &LocationKey,
    ) -> impl Future<Output = Result<ForecastRecord, FetchError>> + Send;
}

/// Endpoint and request settings for [`WeatherProvider`]
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub forecast_url: String,
    pub geocode_url: String,
    /// Whole-request bound; expiry surfaces as `NetworkUnavailable`
    pub timeout: Duration,
    pub forecast_days: u8,
    /// Look up a display label for coordinate keys
    pub reverse_geocode: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            forecast_url: OPEN_METEO_URL.to_string(),
            geocode_url: NOMINATIM_URL.to_string(),
            timeout: Duration::from_secs(10),
            forecast_days: 7,
            reverse_geocode: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    forecast_url: Url,
    geocoder: Geocoder,
    forecast_days: u8,
    reverse_geocode: bool,
}

impl WeatherProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, WeatherError> {
        let client = Arc::new(
            Client::builder()
                .timeout(settings.timeout)
                .user_agent(USER_AGENT)
                .build()?,
        );
        let forecast_url = base_url_with_slash(&settings.forecast_url)?.join("v1/forecast")?;
        let geocoder = Geocoder::new(client.clone(), &settings.geocode_url)?;

        Ok(Self {
            client,
            forecast_url,
            geocoder,
            forecast_days: settings.forecast_days,
            reverse_geocode: settings.reverse_geocode,
        })
    }

    pub fn geocoder(&self) -> &Geocoder {
        &self.geocoder
    }

    /// Fetch and parse a forecast. Place keys are geocoded first.
    pub async fn fetch_forecast(&self, key: &LocationKey) -> Result<ForecastRecord, FetchError> {
        let (latitude, longitude, location_name) = match key {
            LocationKey::Coordinates {
                latitude,
                longitude,
            } => (*latitude, *longitude, None),
            LocationKey::Place(name) => {
                let place = self.geocoder.search(name).await?;
                (place.latitude, place.longitude, Some(place.label))
            }
        };

        let url = self.request_url(latitude, longitude);
        tracing::debug!("Fetching forecast for {} from {}", key, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let mut record = parse_forecast(key.clone(), location_name, status, &body)?;
        if record.location_name.is_none() && self.reverse_geocode {
            record.location_name = self.geocoder.reverse(latitude, longitude).await;
        }
        tracing::info!(
            "Fetched forecast for {}: {} days, {} hours",
            key,
            record.daily.len(),
            record.hourly.len()
        );
        Ok(record)
    }

    fn request_url(&self, latitude: f64, longitude: f64) -> Url {
        let mut url = self.forecast_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &latitude.to_string())
            .append_pair("longitude", &longitude.to_string())
            .append_pair("current", CURRENT_FIELDS)
            .append_pair("hourly", HOURLY_FIELDS)
            .append_pair("daily", DAILY_FIELDS)
            .append_pair("timezone", "auto")
            .append_pair("temperature_unit", "celsius")
            .append_pair("wind_speed_unit", "kmh")
            .append_pair("forecast_days", &self.forecast_days.to_string());
        url
    }
}

impl ForecastSource for WeatherProvider {
    fn fetch(
        &self,
        key: &LocationKey,
    ) -> impl Future<Output = Result<ForecastRecord, FetchError>> + Send {
        self.fetch_forecast(key)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    utc_offset_seconds: i32,
    current: Option<CurrentBlock>,
    hourly: Option<HourlyBlock>,
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: String,
    temperature_2m: f64,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    #[serde(default)]
    weather_code: Value,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Value>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Value>,
    #[serde(default)]
    sunrise: Vec<Option<String>>,
    #[serde(default)]
    sunset: Vec<Option<String>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
}

/// Validate an upstream response into a [`ForecastRecord`].
pub(crate) fn parse_forecast(
    location: LocationKey,
    location_name: Option<String>,
    status: u16,
    body: &str,
) -> Result<ForecastRecord, FetchError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) if (200..300).contains(&status) => return Err(FetchError::ParseError(e.to_string())),
        Err(_) => {
            return Err(FetchError::UpstreamError {
                status,
                message: format!("upstream returned status {status}"),
            })
        }
    };

    let api_error = value.get("error").and_then(Value::as_bool).unwrap_or(false);
    if api_error || !(200..300).contains(&status) {
        let message = value
            .get("reason")
            .and_then(Value::as_str)
            .map_or_else(|| format!("upstream returned status {status}"), str::to_string);
        return Err(FetchError::UpstreamError { status, message });
    }

    let raw: ForecastResponse =
        serde_json::from_value(value).map_err(|e| FetchError::ParseError(e.to_string()))?;

    let current = raw.current.map(parse_current).transpose()?;
    let hourly = match raw.hourly {
        Some(block) => parse_hourly(block)?,
        None => Vec::new(),
    };
    let daily = match raw.daily {
        Some(block) => parse_daily(block)?,
        None => Vec::new(),
    };

    Ok(ForecastRecord {
        location,
        location_name,
        latitude: raw.latitude,
        longitude: raw.longitude,
        timezone: raw.timezone.unwrap_or_else(|| "UTC".to_string()),
        utc_offset_seconds: raw.utc_offset_seconds,
        retrieved_at: Utc::now(),
        current,
        daily,
        hourly,
    })
}

fn parse_current(block: CurrentBlock) -> Result<CurrentConditions, FetchError> {
    Ok(CurrentConditions {
        time: parse_local_datetime(&block.time)?,
        temperature: block.temperature_2m,
        feels_like: block.apparent_temperature.unwrap_or(block.temperature_2m),
        humidity: block.relative_humidity_2m.map(percent),
        wind_speed: block.wind_speed_10m,
        condition: ConditionCode::from_json(&block.weather_code),
    })
}

fn parse_hourly(block: HourlyBlock) -> Result<Vec<HourlyForecast>, FetchError> {
    let len = block.time.len();
    require_len("hourly.temperature_2m", block.temperature_2m.len(), len)?;
    optional_len("hourly.weather_code", block.weather_code.len(), len)?;
    optional_len(
        "hourly.precipitation_probability",
        block.precipitation_probability.len(),
        len,
    )?;

    block
        .time
        .iter()
        .enumerate()
        .map(|(i, time)| -> Result<HourlyForecast, FetchError> {
            Ok(HourlyForecast {
                time: parse_local_datetime(time)?,
                temperature: block.temperature_2m[i]
                    .ok_or_else(|| missing("hourly.temperature_2m", i))?,
                condition: code_at(&block.weather_code, i),
                precipitation_chance: block
                    .precipitation_probability
                    .get(i)
                    .copied()
                    .flatten()
                    .map(percent),
            })
        })
        .collect()
}

fn parse_daily(block: DailyBlock) -> Result<Vec<DayForecast>, FetchError> {
    let len = block.time.len();
    require_len("daily.temperature_2m_max", block.temperature_2m_max.len(), len)?;
    require_len("daily.temperature_2m_min", block.temperature_2m_min.len(), len)?;
    optional_len("daily.weather_code", block.weather_code.len(), len)?;
    optional_len("daily.sunrise", block.sunrise.len(), len)?;
    optional_len("daily.sunset", block.sunset.len(), len)?;
    optional_len(
        "daily.precipitation_probability_max",
        block.precipitation_probability_max.len(),
        len,
    )?;

    block
        .time
        .iter()
        .enumerate()
        .map(|(i, date)| -> Result<DayForecast, FetchError> {
            Ok(DayForecast {
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|e| FetchError::ParseError(format!("bad date '{date}': {e}")))?,
                high: block.temperature_2m_max[i]
                    .ok_or_else(|| missing("daily.temperature_2m_max", i))?,
                low: block.temperature_2m_min[i]
                    .ok_or_else(|| missing("daily.temperature_2m_min", i))?,
                condition: code_at(&block.weather_code, i),
                precipitation_chance: block
                    .precipitation_probability_max
                    .get(i)
                    .copied()
                    .flatten()
                    .map(percent),
                sunrise: optional_datetime(&block.sunrise, i)?,
                sunset: optional_datetime(&block.sunset, i)?,
            })
        })
        .collect()
}

fn require_len(field: &str, actual: usize, expected: usize) -> Result<(), FetchError> {
    if actual == expected {
        Ok(())
    } else {
        Err(FetchError::ParseError(format!(
            "{field} has {actual} values, expected {expected}"
        )))
    }
}

/// Optional columns may be absent entirely but never ragged.
fn optional_len(field: &str, actual: usize, expected: usize) -> Result<(), FetchError> {
    if actual == 0 {
        Ok(())
    } else {
        require_len(field, actual, expected)
    }
}

fn missing(field: &str, index: usize) -> FetchError {
    FetchError::ParseError(format!("{field}[{index}] is null"))
}

fn code_at(codes: &[Value], index: usize) -> ConditionCode {
    codes
        .get(index)
        .map_or_else(|| ConditionCode::Unknown(String::new()), ConditionCode::from_json)
}

fn optional_datetime(
    values: &[Option<String>],
    index: usize,
) -> Result<Option<NaiveDateTime>, FetchError> {
    match values.get(index) {
        Some(Some(text)) => parse_local_datetime(text).map(Some),
        _ => Ok(None),
    }
}

fn parse_local_datetime(text: &str) -> Result<NaiveDateTime, FetchError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| FetchError::ParseError(format!("bad timestamp '{text}': {e}")))
}

fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
