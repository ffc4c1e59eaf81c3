//! Provider selection and fallback.
//!
//! Open-Meteo is always tried first. OpenWeatherMap is only consulted when a
//! key is configured, and only a result that carries a forecast counts as a
//! successful fallback.

use cloudburst_core::{Config, WeatherError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::AcquisitionCache;
use crate::format::{self, FormattedView};
use crate::geocode::Geocoder;
use crate::http::build_client;
use crate::key_store::{ApiKey, KeyStoreError};
use crate::provider::{OpenMeteoClient, OpenWeatherClient};
use crate::risk::{assess_risk, RiskAssessment};
use crate::types::{Location, WeatherBundle, WeatherReport};

/// What to fetch weather for
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherTarget {
    /// Free text or `"lat,lng"`, geocoded first
    Query(String),
    /// Already resolved, used as-is
    Location(Location),
}

impl From<&str> for WeatherTarget {
    fn from(query: &str) -> Self {
        Self::Query(query.to_string())
    }
}

impl From<String> for WeatherTarget {
    fn from(query: String) -> Self {
        Self::Query(query)
    }
}

impl From<Location> for WeatherTarget {
    fn from(location: Location) -> Self {
        Self::Location(location)
    }
}

pub struct WeatherService {
    geocoder: Arc<Geocoder>,
    open_meteo: OpenMeteoClient,
    openweather: OpenWeatherClient,
    cache: Arc<AcquisitionCache>,
    api_key: Arc<ApiKey>,
}

impl WeatherService {
    /// Build the service with a fresh cache sized from `config.weather`.
    pub fn from_config(config: &Config, api_key: Arc<ApiKey>) -> Result<Self, WeatherError> {
        let cache = Arc::new(AcquisitionCache::new(config.weather.cache_ttl()));
        Self::with_cache(config, api_key, cache)
    }

    /// Build the service around an existing cache.
    pub fn with_cache(
        config: &Config,
        api_key: Arc<ApiKey>,
        cache: Arc<AcquisitionCache>,
    ) -> Result<Self, WeatherError> {
        let client = build_client()?;
        let timeout = config.weather.request_timeout();

        let geocoder = Arc::new(Geocoder::new(
            client.clone(),
            &config.providers.openweather_geocode_url,
            cache.clone(),
            api_key.clone(),
            timeout,
            config.weather.reverse_geocode_timeout(),
        ));
        let open_meteo = OpenMeteoClient::new(
            client.clone(),
            &config.providers.open_meteo_url,
            &config.weather.timezone,
            timeout,
            geocoder.clone(),
        );
        let openweather = OpenWeatherClient::new(
            client,
            &config.providers.openweather_url,
            cache.clone(),
            api_key.clone(),
            timeout,
        );

        Ok(Self {
            geocoder,
            open_meteo,
            openweather,
            cache,
            api_key,
        })
    }

    pub fn cache(&self) -> &Arc<AcquisitionCache> {
        &self.cache
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_configured()
    }

    /// Store or clear the OpenWeatherMap key. Blank input clears it.
    pub fn set_api_key(&self, key: Option<&str>) -> Result<(), KeyStoreError> {
        self.api_key.set(key)
    }

    /// Resolve a query without fetching weather.
    pub async fn resolve(&self, query: &str, cancel: &CancellationToken) -> Arc<Location> {
        self.geocoder.resolve(query, cancel).await
    }

    /// Fetch current conditions and forecast for `target`.
    ///
    /// Without a key, a free-provider failure is returned unchanged. With a
    /// key, a failed fallback yields `WeatherUnavailable` wrapping the
    /// free-provider error. Cancellation is returned immediately.
    #[tracing::instrument(skip(self, cancel), level = "info")]
    pub async fn get_weather(
        &self,
        target: WeatherTarget,
        cancel: &CancellationToken,
    ) -> Result<WeatherReport, WeatherError> {
        let location = match target {
            WeatherTarget::Query(query) => self.geocoder.resolve(&query, cancel).await,
            WeatherTarget::Location(location) => Arc::new(location),
        };
        if cancel.is_cancelled() {
            return Err(WeatherError::Cancelled);
        }

        let primary = match self
            .open_meteo
            .fetch(location.lat, location.lng, cancel)
            .await
        {
            Ok(bundle) => return Ok(report(bundle, location)),
            Err(e) => e,
        };

        if primary.is_cancelled() || !self.api_key.is_configured() {
            return Err(primary);
        }

        tracing::warn!("Open-Meteo failed: {}, trying OpenWeatherMap", primary);
        match self
            .openweather
            .fetch(location.lat, location.lng, cancel)
            .await
        {
            Ok(bundle) if bundle.forecast.is_some() => Ok(report(bundle, location)),
            Ok(_) => {
                tracing::warn!("OpenWeatherMap returned no forecast");
                Err(unavailable(primary))
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::warn!("OpenWeatherMap fallback failed: {}", e);
                Err(unavailable(primary))
            }
        }
    }

    /// Risk assessment and display view for a report.
    pub fn assess(report: &WeatherReport) -> (RiskAssessment, FormattedView) {
        (
            assess_risk(&report.observation),
            format::format(&report.observation),
        )
    }
}

fn unavailable(primary: WeatherError) -> WeatherError {
    WeatherError::WeatherUnavailable {
        primary: Box::new(primary),
    }
}

fn report(bundle: WeatherBundle, location: Arc<Location>) -> WeatherReport {
    WeatherReport {
        observation: bundle.observation,
        forecast: bundle.forecast.unwrap_or_default(),
        location,
        source: bundle.source,
    }
}
