//! Geocoding: place names to coordinates and coordinates to place labels.
//! Speaks the Nominatim (OpenStreetMap) API - free, no API key required.

use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::types::{FetchError, WeatherError};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const MEMO_TTL: Duration = Duration::from_secs(600);

/// A resolved place
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// "Seattle, Washington" style label; `None` when nothing usable is present.
    fn label(self) -> Option<String> {
        // Capture state/country before the place chain consumes them
        let state = self.state.clone();
        let country = self.country.clone();

        let place = self
            .city
            .or(self.village)
            .or(self.town)
            .or(self.hamlet)
            .or(self.county)
            .or(self.municipality)
            .or(self.state_district)
            .or(self.state)
            .or(self.country)?;

        let suffix = state
            .filter(|s| !s.is_empty() && *s != place)
            .or_else(|| country.filter(|c| !c.is_empty() && *c != place));

        Some(match suffix {
            Some(s) => format!("{place}, {s}"),
            None => place,
        })
    }
}

/// Nominatim client with a short-lived memo of answers.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Arc<Client>,
    base_url: Url,
    memo: Arc<Mutex<HashMap<String, (Instant, Option<Place>)>>>,
}

impl Geocoder {
    pub fn new(client: Arc<Client>, base_url: &str) -> Result<Self, WeatherError> {
        Ok(Self {
            client,
            base_url: base_url_with_slash(base_url)?,
            memo: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Resolve a spoken place name to coordinates.
    pub async fn search(&self, query: &str) -> Result<Place, FetchError> {
        let memo_key = format!("search:{}", query.to_lowercase());
        if let Some(hit) = self.recall(&memo_key) {
            return hit.ok_or_else(|| FetchError::LocationNotFound(query.to_string()));
        }

        let mut url = self.endpoint("search")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "json")
            .append_pair("limit", "1")
            .append_pair("addressdetails", "1");

        let hits: Vec<SearchHit> = self.get_json(url).await?;
        let place = match hits.into_iter().next() {
            Some(hit) => Some(place_from_hit(hit, query)?),
            None => None,
        };
        self.remember(memo_key, place.clone());

        match place {
            Some(place) => {
                tracing::info!("Geocoded '{}' to {}", query, place.label);
                Ok(place)
            }
            None => Err(FetchError::LocationNotFound(query.to_string())),
        }
    }

    /// Reverse geocode coordinates to a human-readable label.
    /// Returns `None` on any failure; callers fall back to coordinates.
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> Option<String> {
        let memo_key = format!("reverse:{latitude},{longitude}");
        if let Some(hit) = self.recall(&memo_key) {
            return hit.map(|p| p.label);
        }

        let mut url = self.endpoint("reverse").ok()?;
        url.query_pairs_mut()
            .append_pair("lat", &latitude.to_string())
            .append_pair("lon", &longitude.to_string())
            .append_pair("format", "json")
            .append_pair("addressdetails", "1")
            .append_pair("zoom", "10");

        let body: ReverseResponse = match self.get_json(url).await {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!("Reverse geocode failed: {}", e);
                return None;
            }
        };

        let label = body.address.and_then(NominatimAddress::label);
        self.remember(
            memo_key,
            label.clone().map(|label| Place {
                label,
                latitude,
                longitude,
            }),
        );
        if let Some(l) = &label {
            tracing::info!("Reverse geocoded to: {}", l);
        }
        label
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::ParseError(format!("bad geocoder URL: {e}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamError {
                status: status.as_u16(),
                message: format!("geocoder returned {status}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        serde_json::from_str(&body).map_err(|e| FetchError::ParseError(e.to_string()))
    }

    fn recall(&self, key: &str) -> Option<Option<Place>> {
        let mut memo = self.memo.lock();
        match memo.get(key) {
            Some((at, place)) if at.elapsed() < MEMO_TTL => Some(place.clone()),
            Some(_) => {
                memo.remove(key);
                None
            }
            None => None,
        }
    }

    fn remember(&self, key: String, place: Option<Place>) {
        self.remember_at(key, place, Instant::now());
    }

    /// Expired answers are dropped on every insert so the memo stays bounded
    /// by the queries of the last `MEMO_TTL`.
    fn remember_at(&self, key: String, place: Option<Place>, now: Instant) {
        let mut memo = self.memo.lock();
        memo.retain(|_, (at, _)| now.saturating_duration_since(*at) < MEMO_TTL);
        memo.insert(key, (now, place));
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
pub(crate) fn base_url_with_slash(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

fn place_from_hit(hit: SearchHit, query: &str) -> Result<Place, FetchError> {
    let latitude: f64 = hit
        .lat
        .parse()
        .map_err(|_| FetchError::ParseError(format!("bad latitude '{}'", hit.lat)))?;
    let longitude: f64 = hit
        .lon
        .parse()
        .map_err(|_| FetchError::ParseError(format!("bad longitude '{}'", hit.lon)))?;

    let label = hit
        .address
        .and_then(NominatimAddress::label)
        .or(hit.display_name)
        .unwrap_or_else(|| query.to_string());

    Ok(Place {
        label,
        latitude,
        longitude,
    })
}
