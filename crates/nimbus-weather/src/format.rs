//! Turns a [`ForecastRecord`] into renderer-agnostic display data and speech.
//!
//! Everything here is a pure function of its inputs. The reference "now" for
//! relative day names and the hourly window is the record's own retrieval
//! time on the location's wall clock.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::time::{
    format_hour, format_time, paginate, short_day, speakable_day, TimeFormat, TimePeriod,
};
use crate::types::{ConditionCategory, ForecastRecord};

/// Hourly entries shown from the current hour on
pub const HOURLY_WINDOW: usize = 24;
/// Hourly cards per GUI page
pub const HOURLY_PAGE_SIZE: usize = 4;

const KMH_PER_MPH: f64 = 1.609_344;

/// Temperature unit for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }

    /// Convert from Celsius, rounded to whole degrees.
    pub fn convert(&self, celsius: f64) -> i32 {
        let value = match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        };
        value.round() as i32
    }

    fn speed_label(&self, kmh: f64) -> String {
        match self {
            Self::Celsius => format!("{} km/h", kmh.round() as i32),
            Self::Fahrenheit => format!("{} mph", (kmh / KMH_PER_MPH).round() as i32),
        }
    }
}

/// Locale-derived display preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Preferences {
    pub temperature_unit: TemperatureUnit,
    pub time_format: TimeFormat,
}

/// Regions that default to Fahrenheit
const FAHRENHEIT_REGIONS: &[&str] = &["US", "LR", "MM", "BS", "BZ", "KY", "PW"];
/// Regions that default to a 12-hour clock
const TWELVE_HOUR_REGIONS: &[&str] = &["US", "CA", "AU", "NZ", "IN", "PH", "PK", "EG", "SA"];

impl Preferences {
    pub fn new(temperature_unit: TemperatureUnit, time_format: TimeFormat) -> Self {
        Self {
            temperature_unit,
            time_format,
        }
    }

    /// Defaults for a BCP-47 style locale such as `en-US` or `de_DE`.
    pub fn from_locale(locale: &str) -> Self {
        let region = locale
            .split(['-', '_'])
            .nth(1)
            .map(str::to_uppercase)
            .unwrap_or_default();
        let region = region.as_str();

        Self {
            temperature_unit: if FAHRENHEIT_REGIONS.contains(&region) {
                TemperatureUnit::Fahrenheit
            } else {
                TemperatureUnit::Celsius
            },
            time_format: if TWELVE_HOUR_REGIONS.contains(&region) {
                TimeFormat::TwelveHour
            } else {
                TimeFormat::TwentyFourHour
            },
        }
    }

    /// Per-request unit from the utterance wins over the configured one.
    pub fn with_unit_override(self, unit: Option<TemperatureUnit>) -> Self {
        Self {
            temperature_unit: unit.unwrap_or(self.temperature_unit),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentDisplay {
    pub temperature: i32,
    pub feels_like: i32,
    pub category: ConditionCategory,
    pub condition: String,
    pub icon: String,
    pub humidity: Option<String>,
    pub wind: Option<String>,
    pub is_day: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayDisplay {
    pub date: String,
    pub label: String,
    pub spoken_day: String,
    pub high: i32,
    pub low: i32,
    pub category: ConditionCategory,
    pub condition: String,
    pub icon: String,
    pub precipitation: Option<String>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourDisplay {
    pub time: String,
    /// Part of the day the hour falls in, for grouping cards
    pub period: TimePeriod,
    pub temperature: i32,
    pub category: ConditionCategory,
    pub icon: String,
    pub precipitation: Option<String>,
}

/// Plain key/value view of a forecast handed to the GUI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayModel {
    pub location: String,
    pub unit: String,
    pub current: Option<CurrentDisplay>,
    pub days: Vec<DayDisplay>,
    pub hours: Vec<HourDisplay>,
    pub hour_pages: Vec<Vec<HourDisplay>>,
}

/// Format a forecast for display.
pub fn format(record: &ForecastRecord, prefs: &Preferences) -> DisplayModel {
    let unit = prefs.temperature_unit;
    let now = record.local_retrieved_at();
    let today = now.date();

    let current = record.current.as_ref().map(|c| {
        let category = c.condition.category();
        CurrentDisplay {
            temperature: unit.convert(c.temperature),
            feels_like: unit.convert(c.feels_like),
            category,
            condition: category.description().to_string(),
            icon: category.icon_name().to_string(),
            humidity: c.humidity.map(|h| format!("{h}%")),
            wind: c.wind_speed.map(|w| unit.speed_label(w)),
            is_day: is_daytime(record, c.time),
        }
    });

    let days = record
        .daily
        .iter()
        .map(|d| {
            let category = d.condition.category();
            DayDisplay {
                date: d.date.format("%Y-%m-%d").to_string(),
                label: short_day(d.date),
                spoken_day: speakable_day(d.date, today),
                high: unit.convert(d.high),
                low: unit.convert(d.low),
                category,
                condition: category.description().to_string(),
                icon: category.icon_name().to_string(),
                precipitation: d.precipitation_chance.map(|p| format!("{p}%")),
                sunrise: d.sunrise.map(|t| format_time(t.time(), prefs.time_format)),
                sunset: d.sunset.map(|t| format_time(t.time(), prefs.time_format)),
            }
        })
        .collect();

    let hour_start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let hours: Vec<HourDisplay> = record
        .hourly
        .iter()
        .filter(|h| h.time >= hour_start)
        .take(HOURLY_WINDOW)
        .map(|h| {
            let category = h.condition.category();
            HourDisplay {
                time: format_hour(h.time.time(), prefs.time_format),
                period: TimePeriod::from_time(h.time.time()),
                temperature: unit.convert(h.temperature),
                category,
                icon: category.icon_name().to_string(),
                precipitation: h.precipitation_chance.map(|p| format!("{p}%")),
            }
        })
        .collect();

    DisplayModel {
        location: record
            .location_name
            .clone()
            .unwrap_or_else(|| record.location.to_string()),
        unit: unit.symbol().to_string(),
        current,
        days,
        hour_pages: paginate(&hours, HOURLY_PAGE_SIZE),
        hours,
    }
}

/// Between the sunrise and sunset of the same day. Without sun times
/// (polar regions, missing data) fall back to 06:00-18:00.
fn is_daytime(record: &ForecastRecord, at: NaiveDateTime) -> bool {
    let day = record.daily.iter().find(|d| d.date == at.date());
    match day.and_then(|d| d.sunrise.zip(d.sunset)) {
        Some((rise, set)) => at >= rise && at < set,
        None => (6..18).contains(&at.hour()),
    }
}

/// One sentence about current conditions.
pub fn speak_current(model: &DisplayModel) -> Option<String> {
    model.current.as_ref().map(|c| {
        format!(
            "It's currently {} and {} degrees in {}.",
            c.condition.to_lowercase(),
            c.temperature,
            model.location
        )
    })
}

/// One sentence per forecast day.
pub fn speak_day(day: &DayDisplay) -> String {
    let mut sentence = format!(
        "{}: {}, high of {} and low of {} degrees",
        capitalize(&day.spoken_day),
        day.condition.to_lowercase(),
        day.high,
        day.low
    );
    if let Some(p) = &day.precipitation {
        sentence.push_str(&format!(", {p} chance of precipitation"));
    }
    sentence.push('.');
    sentence
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
