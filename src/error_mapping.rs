//! Maps weather-crate errors into the user-facing `AppError` hierarchy.

use nimbus_core::{AppError, WeatherError};
use nimbus_weather::{CacheError, FetchError, LocationKeyError};

/// Extension trait for converting library errors to our error types.
pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

impl IntoAppError for FetchError {
    fn into_app_error(self) -> AppError {
        let err = match self {
            FetchError::NetworkUnavailable(s) => WeatherError::NetworkUnavailable(s),
            FetchError::UpstreamError { status, message } => {
                WeatherError::ApiError(format!("{status}: {message}"))
            }
            FetchError::ParseError(s) => WeatherError::InvalidResponse(s),
            FetchError::LocationNotFound(s) => WeatherError::LocationNotFound(s),
        };
        AppError::Weather(err)
    }
}

impl IntoAppError for LocationKeyError {
    fn into_app_error(self) -> AppError {
        AppError::Weather(WeatherError::InvalidLocation(self.to_string()))
    }
}

impl IntoAppError for CacheError {
    fn into_app_error(self) -> AppError {
        match self {
            CacheError::Io(e) => AppError::Io(e),
            other => AppError::Other(anyhow::Error::new(other)),
        }
    }
}

impl IntoAppError for nimbus_weather::WeatherError {
    fn into_app_error(self) -> AppError {
        tracing::error!("Weather provider setup failed: {}", self);
        AppError::Weather(WeatherError::ServiceUnavailable)
    }
}
