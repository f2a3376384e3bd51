//! Date and time wording shared by the display and speech output.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Clock style for rendered times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeFormat {
    #[serde(rename = "12h")]
    TwelveHour,
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHour,
}

/// Coarse part of the day, as spoken ("this evening")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    EarlyMorning,
    Morning,
    Afternoon,
    Evening,
    Overnight,
}

impl TimePeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            1..=4 => Self::EarlyMorning,
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=19 => Self::Evening,
            _ => Self::Overnight,
        }
    }

    pub fn from_time(time: NaiveTime) -> Self {
        Self::from_hour(time.hour())
    }

    pub fn as_phrase(&self) -> &'static str {
        match self {
            Self::EarlyMorning => "early morning",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Overnight => "overnight",
        }
    }
}

/// `6:05 AM` or `06:05`
pub fn format_time(time: NaiveTime, format: TimeFormat) -> String {
    match format {
        TimeFormat::TwelveHour => time.format("%-I:%M %p").to_string(),
        TimeFormat::TwentyFourHour => time.format("%H:%M").to_string(),
    }
}

/// Hour label for hourly cards: `3 PM` or `15:00`
pub fn format_hour(time: NaiveTime, format: TimeFormat) -> String {
    match format {
        TimeFormat::TwelveHour => time.format("%-I %p").to_string(),
        TimeFormat::TwentyFourHour => time.format("%H:00").to_string(),
    }
}

/// Short day label for forecast cards: `Mon`
pub fn short_day(date: NaiveDate) -> String {
    date.format("%a").to_string()
}

/// `today` for the current day, otherwise the weekday name.
///
/// The next day is spoken as its weekday too, never "tomorrow".
pub fn speakable_day(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "today".to_string()
    } else {
        weekday_name(date.weekday()).to_string()
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Split items into GUI pages of `size`; the last page may be short.
pub fn paginate<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }
    items.chunks(size).map(<[T]>::to_vec).collect()
}
