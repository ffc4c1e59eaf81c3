//! Centralized error types for Cloudburst.
//!
//! This module provides a typed error hierarchy that:
//! - Drives provider fallback decisions in the fetch orchestrator
//! - Provides user-friendly messages suitable for dashboard display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Key storage error: {0}")]
    KeyStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Weather(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::KeyStore(_) => "Failed to save the API key. Please try again.",
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Weather acquisition errors.
///
/// `Geocode` never reaches callers: the geocoder always resolves through its
/// fallback chain. Everything else can surface from a provider or the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    #[error("Geocoding failed: {0}")]
    Geocode(String),

    #[error("API key required")]
    MissingKey,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("{provider} API error: {status}")]
    Provider { provider: &'static str, status: u16 },

    #[error("Request timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Every provider was tried. `primary` is the free provider's own
    /// failure, kept unchanged.
    #[error("Failed to fetch weather data: {primary}")]
    WeatherUnavailable {
        #[source]
        primary: Box<WeatherError>,
    },
}

impl WeatherError {
    /// The error that decided the outcome of a fetch.
    ///
    /// For `WeatherUnavailable` this is the wrapped free-provider error,
    /// otherwise the error itself.
    pub fn primary(&self) -> &WeatherError {
        match self {
            WeatherError::WeatherUnavailable { primary } => primary,
            other => other,
        }
    }

    /// Whether the caller abandoned the request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WeatherError::Cancelled)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::Geocode(_) => "Location not found. Check and try again.",
            WeatherError::MissingKey => "An OpenWeatherMap API key is required for this source.",
            WeatherError::InvalidKey => "Weather API key is invalid. Check settings.",
            WeatherError::Provider { status, .. } if *status >= 500 => {
                "Weather service is experiencing issues. Please try again later."
            }
            WeatherError::Provider { .. } => "Weather service error. Please try again.",
            WeatherError::Timeout => "The weather request timed out. Please try again.",
            WeatherError::Cancelled => "The weather request was cancelled.",
            WeatherError::Network(_) => "Unable to connect. Check your internet connection.",
            WeatherError::MalformedPayload(_) => {
                "Received an unexpected response from the weather service."
            }
            WeatherError::WeatherUnavailable { .. } => {
                "Weather data is unavailable right now. Please try again later."
            }
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_weather_error(self) -> WeatherError;
}

impl ReqwestErrorExt for reqwest::Error {
    /// The request URL is dropped first: query strings carry API keys.
    fn into_weather_error(self) -> WeatherError {
        let this = self.without_url();
        if this.is_timeout() {
            WeatherError::Timeout
        } else if this.is_decode() {
            WeatherError::MalformedPayload(this.to_string())
        } else {
            WeatherError::Network(this.to_string())
        }
    }
}
