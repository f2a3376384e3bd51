use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::LocationKey;

/// WMO weather codes the upstream API documents.
/// See: https://open-meteo.com/en/docs#weathervariables
const KNOWN_WMO_CODES: &[u8] = &[
    0, 1, 2, 3, 45, 48, 51, 53, 55, 56, 57, 61, 63, 65, 66, 67, 71, 73, 75, 77, 80, 81, 82, 85,
    86, 95, 96, 99,
];

/// Condition code as reported upstream.
///
/// Anything that is not a documented WMO code is kept verbatim in `Unknown`
/// so one odd value never fails the parse of a whole forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConditionCode {
    Wmo(u8),
    Unknown(String),
}

impl ConditionCode {
    /// Build from a raw JSON value taken out of an upstream array.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value.as_u64() {
            Some(n) => match u8::try_from(n) {
                Ok(code) if KNOWN_WMO_CODES.contains(&code) => Self::Wmo(code),
                _ => Self::Unknown(value.to_string()),
            },
            None => match value {
                serde_json::Value::String(s) => Self::parse(s),
                other => Self::Unknown(other.to_string()),
            },
        }
    }

    /// Parse a textual code such as `"61"` or `"weathercode-unknown-999"`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u8>() {
            Ok(code) if KNOWN_WMO_CODES.contains(&code) => Self::Wmo(code),
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn category(&self) -> ConditionCategory {
        match self {
            Self::Wmo(code) => ConditionCategory::from_wmo_code(*code),
            Self::Unknown(_) => ConditionCategory::Unknown,
        }
    }
}

/// Display categories the GUI keys its imagery on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCategory {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
    Unknown,
}

impl ConditionCategory {
    /// Convert WMO weather code to a display category
    pub fn from_wmo_code(code: u8) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 => Self::Sleet, // Freezing drizzle
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            66 | 67 => Self::Sleet, // Freezing rain
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    /// Stable identifier used by the GUI layer
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly_cloudy",
            Self::Cloudy => "cloudy",
            Self::Fog => "fog",
            Self::Drizzle => "drizzle",
            Self::Rain => "rain",
            Self::HeavyRain => "heavy_rain",
            Self::Snow => "snow",
            Self::Sleet => "sleet",
            Self::Thunderstorm => "thunderstorm",
            Self::Unknown => "unknown",
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }

    /// Icon name; the GUI maps it to the actual glyph
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Fog => "cloud_fog",
            Self::Drizzle | Self::Rain | Self::HeavyRain => "cloud_rain",
            Self::Snow | Self::Sleet => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
            Self::Unknown => "question",
        }
    }
}

/// Current conditions at retrieval time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Local observation time
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: Option<u8>,
    /// km/h
    pub wind_speed: Option<f64>,
    pub condition: ConditionCode,
}

/// Hourly forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    /// Local time
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub condition: ConditionCode,
    pub precipitation_chance: Option<u8>,
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub condition: ConditionCode,
    pub precipitation_chance: Option<u8>,
    /// Local time; absent during polar day/night
    pub sunrise: Option<NaiveDateTime>,
    pub sunset: Option<NaiveDateTime>,
}

/// A complete forecast for one location.
///
/// Temperatures are Celsius. Records are never edited in place: a refresh
/// builds a new record and the cache swaps it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub location: LocationKey,
    pub location_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub utc_offset_seconds: i32,
    pub retrieved_at: DateTime<Utc>,
    pub current: Option<CurrentConditions>,
    pub daily: Vec<DayForecast>,
    pub hourly: Vec<HourlyForecast>,
}

impl ForecastRecord {
    /// Retrieval time expressed in the forecast location's wall clock.
    pub fn local_retrieved_at(&self) -> NaiveDateTime {
        self.retrieved_at.naive_utc() + chrono::Duration::seconds(i64::from(self.utc_offset_seconds))
    }
}

/// Errors from a single upstream fetch.
///
/// `Clone` so a stale-cache response can carry the error that caused it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("Upstream error ({status}): {message}")]
    UpstreamError { status: u16, message: String },
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Location not found: {0}")]
    LocationNotFound(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::ParseError(err.to_string())
        } else if let Some(status) = err.status() {
            Self::UpstreamError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            // Timeouts, refused connections, DNS and body transport failures
            Self::NetworkUnavailable(err.to_string())
        }
    }
}

/// Setup errors (client construction, bad endpoint configuration)
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wmo_code_clear() {
        assert_eq!(ConditionCategory::from_wmo_code(0), ConditionCategory::Clear);
    }

    #[test]
    fn test_wmo_code_partly_cloudy() {
        assert_eq!(ConditionCategory::from_wmo_code(1), ConditionCategory::PartlyCloudy);
        assert_eq!(ConditionCategory::from_wmo_code(2), ConditionCategory::PartlyCloudy);
    }

    #[test]
    fn test_wmo_code_precipitation() {
        assert_eq!(ConditionCategory::from_wmo_code(53), ConditionCategory::Drizzle);
        assert_eq!(ConditionCategory::from_wmo_code(80), ConditionCategory::Rain);
        assert_eq!(ConditionCategory::from_wmo_code(82), ConditionCategory::HeavyRain);
        assert_eq!(ConditionCategory::from_wmo_code(57), ConditionCategory::Sleet);
        assert_eq!(ConditionCategory::from_wmo_code(67), ConditionCategory::Sleet);
        assert_eq!(ConditionCategory::from_wmo_code(86), ConditionCategory::Snow);
    }

    #[test]
    fn test_wmo_code_thunderstorm() {
        assert_eq!(ConditionCategory::from_wmo_code(95), ConditionCategory::Thunderstorm);
        assert_eq!(ConditionCategory::from_wmo_code(99), ConditionCategory::Thunderstorm);
    }

    #[test]
    fn test_undocumented_wmo_code_is_unknown() {
        assert_eq!(ConditionCategory::from_wmo_code(4), ConditionCategory::Unknown);
        assert_eq!(ConditionCode::from_json(&json!(4)), ConditionCode::Unknown("4".into()));
    }

    #[test]
    fn test_textual_unknown_code() {
        let code = ConditionCode::parse("weathercode-unknown-999");
        assert_eq!(code, ConditionCode::Unknown("weathercode-unknown-999".into()));
        assert_eq!(code.category(), ConditionCategory::Unknown);
        assert_eq!(code.category().as_str(), "unknown");
    }

    #[test]
    fn test_malformed_json_codes_are_unknown() {
        assert!(matches!(ConditionCode::from_json(&json!(null)), ConditionCode::Unknown(_)));
        assert!(matches!(ConditionCode::from_json(&json!(61.5)), ConditionCode::Unknown(_)));
        assert!(matches!(ConditionCode::from_json(&json!(-1)), ConditionCode::Unknown(_)));
        assert!(matches!(ConditionCode::from_json(&json!(999)), ConditionCode::Unknown(_)));
        assert_eq!(ConditionCode::from_json(&json!("61")), ConditionCode::Wmo(61));
    }

    #[test]
    fn test_condition_description_and_icon() {
        assert_eq!(ConditionCategory::Clear.description(), "Clear");
        assert_eq!(ConditionCategory::Rain.icon_name(), "cloud_rain");
        assert_eq!(ConditionCategory::Unknown.icon_name(), "question");
    }

    #[test]
    fn test_condition_code_serde_shape() {
        let text = serde_json::to_string(&ConditionCode::Wmo(3)).unwrap();
        assert_eq!(text, r#"{"kind":"wmo","value":3}"#);
        let back: ConditionCode = serde_json::from_str(r#"{"kind":"unknown","value":"x"}"#).unwrap();
        assert_eq!(back, ConditionCode::Unknown("x".into()));
    }
}
