//! Integration tests for WeatherProvider using wiremock.
//!
//! These tests verify request shape, parsing and error classification against
//! a mock HTTP server standing in for Open-Meteo and Nominatim.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use nimbus_weather::{
    ConditionCategory, FetchError, ForecastCache, ForecastOrigin, LocationKey, ProviderSettings,
    WeatherProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to build a small Open-Meteo style response
fn forecast_body(high: f64, low: f64) -> serde_json::Value {
    serde_json::json!({
        "latitude": 40.71,
        "longitude": -74.01,
        "timezone": "America/New_York",
        "utc_offset_seconds": -14400,
        "current": {
            "time": "2024-06-01T14:00",
            "temperature_2m": 19.0,
            "apparent_temperature": 18.2,
            "relative_humidity_2m": 60,
            "wind_speed_10m": 9.7,
            "weather_code": 3
        },
        "hourly": {
            "time": ["2024-06-01T14:00", "2024-06-01T15:00", "2024-06-01T16:00"],
            "temperature_2m": [19.0, 19.5, 18.7],
            "weather_code": [3, 3, 80],
            "precipitation_probability": [5, 10, 40]
        },
        "daily": {
            "time": ["2024-06-01", "2024-06-02"],
            "weather_code": [3, "weathercode-unknown-999"],
            "temperature_2m_max": [high, 23.0],
            "temperature_2m_min": [low, 12.0],
            "sunrise": ["2024-06-01T05:25", "2024-06-02T05:25"],
            "sunset": ["2024-06-01T20:24", "2024-06-02T20:25"],
            "precipitation_probability_max": [40, null]
        }
    })
}

fn settings(server: &MockServer) -> ProviderSettings {
    ProviderSettings {
        forecast_url: server.uri(),
        geocode_url: server.uri(),
        timeout: Duration::from_secs(2),
        forecast_days: 2,
        reverse_geocode: false,
    }
}

fn nyc() -> LocationKey {
    LocationKey::parse("loc:40.7,-74.0").unwrap()
}

#[tokio::test]
async fn test_fetch_forecast_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "40.7"))
        .and(query_param("longitude", "-74"))
        .and(query_param("temperature_unit", "celsius"))
        .and(query_param("timezone", "auto"))
        .and(query_param("forecast_days", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(20.0, 10.0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&settings(&mock_server)).unwrap();
    let record = provider.fetch_forecast(&nyc()).await.unwrap();

    assert_eq!(record.location, nyc());
    assert_eq!(record.timezone, "America/New_York");
    assert_eq!(record.daily.len(), 2);
    assert_eq!(record.daily[0].high, 20.0);
    assert_eq!(record.daily[0].low, 10.0);
    assert_eq!(record.daily[1].condition.category(), ConditionCategory::Unknown);
    assert_eq!(record.daily[1].precipitation_chance, None);
    assert_eq!(record.hourly[2].condition.category(), ConditionCategory::Rain);
    assert_eq!(record.current.unwrap().humidity, Some(60));
}

#[tokio::test]
async fn test_server_error_is_upstream_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&settings(&mock_server)).unwrap();
    let err = provider.fetch_forecast(&nyc()).await.unwrap_err();

    assert!(
        matches!(err, FetchError::UpstreamError { status: 502, .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_api_error_payload_carries_reason() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": true,
            "reason": "Cannot initialize WeatherVariable from invalid String value"
        })))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&settings(&mock_server)).unwrap();
    let err = provider.fetch_forecast(&nyc()).await.unwrap_err();

    match err {
        FetchError::UpstreamError { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("invalid String value"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "latitude": "forty",
            "daily": "nope"
        })))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&settings(&mock_server)).unwrap();
    let err = provider.fetch_forecast(&nyc()).await.unwrap_err();

    assert!(matches!(err, FetchError::ParseError(_)), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_slow_server_is_network_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(forecast_body(20.0, 10.0))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&ProviderSettings {
        timeout: Duration::from_millis(200),
        ..settings(&mock_server)
    })
    .unwrap();
    let err = provider.fetch_forecast(&nyc()).await.unwrap_err();

    assert!(
        matches!(err, FetchError::NetworkUnavailable(_)),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_unreachable_host_is_network_unavailable() {
    let provider = WeatherProvider::new(&ProviderSettings {
        forecast_url: "http://127.0.0.1:1".to_string(),
        geocode_url: "http://127.0.0.1:1".to_string(),
        timeout: Duration::from_secs(2),
        forecast_days: 1,
        reverse_geocode: false,
    })
    .unwrap();

    let err = provider.fetch_forecast(&nyc()).await.unwrap_err();
    assert!(matches!(err, FetchError::NetworkUnavailable(_)));
}

#[tokio::test]
async fn test_place_key_is_geocoded_first() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "kansas city"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "lat": "39.0997",
            "lon": "-94.5786",
            "display_name": "Kansas City, Jackson County, Missouri, United States",
            "address": {"city": "Kansas City", "state": "Missouri", "country": "United States"}
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "39.0997"))
        .and(query_param("longitude", "-94.5786"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(31.0, 22.0)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&settings(&mock_server)).unwrap();
    let key = LocationKey::parse("Kansas City").unwrap();
    let record = provider.fetch_forecast(&key).await.unwrap();

    assert_eq!(record.location_name.as_deref(), Some("Kansas City, Missouri"));
    assert_eq!(record.daily[0].high, 31.0);

    // Second lookup is answered from the geocoder memo
    provider.fetch_forecast(&key).await.unwrap();
}

#[tokio::test]
async fn test_unknown_place_is_location_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&settings(&mock_server)).unwrap();
    let key = LocationKey::parse("place:atlantis").unwrap();
    let err = provider.fetch_forecast(&key).await.unwrap_err();

    assert_eq!(err, FetchError::LocationNotFound("atlantis".to_string()));
}

#[tokio::test]
async fn test_coordinates_get_reverse_geocoded_label() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(20.0, 10.0)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("lat", "40.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "address": {"city": "New York", "state": "New York", "country": "United States"}
        })))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&ProviderSettings {
        reverse_geocode: true,
        ..settings(&mock_server)
    })
    .unwrap();
    let record = provider.fetch_forecast(&nyc()).await.unwrap();

    assert_eq!(record.location_name.as_deref(), Some("New York, United States"));
}

#[tokio::test]
async fn test_reverse_geocode_failure_is_not_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(20.0, 10.0)))
        .mount(&mock_server)
        .await;

    // No /reverse mock: wiremock answers 404
    let provider = WeatherProvider::new(&ProviderSettings {
        reverse_geocode: true,
        ..settings(&mock_server)
    })
    .unwrap();
    let record = provider.fetch_forecast(&nyc()).await.unwrap();

    assert_eq!(record.location_name, None);
}

#[tokio::test]
async fn test_cache_serves_stale_forecast_when_upstream_fails() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(20.0, 10.0)))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&settings(&mock_server)).unwrap();
    let mut cache = ForecastCache::load_from_dir(dir.path());
    let first = cache
        .get_or_refresh(&provider, &nyc(), Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(first.origin, ForecastOrigin::Network);

    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    // Zero TTL forces a refresh attempt
    let second = cache
        .get_or_refresh(&provider, &nyc(), Duration::ZERO)
        .await
        .unwrap();
    assert!(second.is_stale());
    assert_eq!(second.record, first.record);
    assert!(matches!(
        second.warning(),
        Some(FetchError::UpstreamError { status: 503, .. })
    ));

    // And the cold-started cache still has it
    let reloaded = ForecastCache::load_from_dir(dir.path());
    assert_eq!(reloaded.get(&nyc()).unwrap().record, first.record);
}

#[tokio::test]
async fn test_failed_forecast_skips_reverse_geocode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "address": {"city": "New York", "country": "United States"}
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::new(&ProviderSettings {
        reverse_geocode: true,
        ..settings(&mock_server)
    })
    .unwrap();
    let err = provider.fetch_forecast(&nyc()).await.unwrap_err();

    assert!(matches!(err, FetchError::UpstreamError { status: 503, .. }));
}
