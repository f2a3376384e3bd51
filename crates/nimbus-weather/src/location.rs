//! Location keys: the normalized identifier forecasts are fetched and cached under.

use serde::{Deserialize, Serialize};
use std::fmt;

const COORD_PREFIX: &str = "loc:";
const PLACE_PREFIX: &str = "place:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationKeyError {
    #[error("Location is empty")]
    Empty,
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

/// Where a forecast is for.
///
/// Coordinates are rounded to two decimals (roughly 1 km) so nearby requests
/// share a cache entry. Place names are lower-cased with whitespace collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LocationKey {
    Coordinates { latitude: f64, longitude: f64 },
    Place(String),
}

impl LocationKey {
    pub fn coordinates(latitude: f64, longitude: f64) -> Result<Self, LocationKeyError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationKeyError::InvalidCoordinates(format!(
                "latitude {latitude} out of range"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationKeyError::InvalidCoordinates(format!(
                "longitude {longitude} out of range"
            )));
        }
        Ok(Self::Coordinates {
            latitude: round2(latitude),
            longitude: round2(longitude),
        })
    }

    pub fn place(name: &str) -> Result<Self, LocationKeyError> {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if normalized.is_empty() {
            return Err(LocationKeyError::Empty);
        }
        Ok(Self::Place(normalized))
    }

    /// Parse a canonical key (`loc:40.7,-74.0`, `place:paris`), a bare
    /// `lat,lon` pair, or a free-form place name.
    pub fn parse(input: &str) -> Result<Self, LocationKeyError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LocationKeyError::Empty);
        }
        if let Some(rest) = input.strip_prefix(COORD_PREFIX) {
            return match split_pair(rest) {
                Some((lat, lon)) => Self::coordinates(lat, lon),
                None => Err(LocationKeyError::InvalidCoordinates(rest.to_string())),
            };
        }
        if let Some(rest) = input.strip_prefix(PLACE_PREFIX) {
            return Self::place(rest);
        }
        match split_pair(input) {
            Some((lat, lon)) => Self::coordinates(lat, lon),
            None => Self::place(input),
        }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinates {
                latitude,
                longitude,
            } => write!(
                f,
                "{}{},{}",
                COORD_PREFIX,
                format_coord(*latitude),
                format_coord(*longitude)
            ),
            Self::Place(name) => write!(f, "{PLACE_PREFIX}{name}"),
        }
    }
}

impl From<LocationKey> for String {
    fn from(key: LocationKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for LocationKey {
    type Error = LocationKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

fn split_pair(text: &str) -> Option<(f64, f64)> {
    let (lat, lon) = text.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Keep "-0.0" out of keys
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Two decimals with trailing zeros trimmed, keeping at least one.
fn format_coord(value: f64) -> String {
    let mut text = format!("{value:.2}");
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }
    text
}
