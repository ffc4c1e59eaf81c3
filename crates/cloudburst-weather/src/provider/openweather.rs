//! OpenWeatherMap adapter (key required).
//!
//! Current conditions are mandatory; the 5-day forecast is best effort.
//! Successful results are cached by coordinates.

use chrono::{DateTime, TimeZone, Utc};
use cloudburst_core::WeatherError;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::AcquisitionCache;
use crate::http::{endpoint, get_json};
use crate::key_store::ApiKey;
use crate::types::{
    Condition, ConditionKind, CoreReadings, DataSource, ForecastEntry, ForecastSeries,
    WeatherBundle, WeatherObservation,
};

pub const PROVIDER: &str = "OpenWeatherMap";

/// Snow depth to liquid-equivalent rainfall
const SNOW_TO_RAIN: f64 = 0.1;
const MS_TO_KMH: f64 = 3.6;

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    main: Option<OwmMain>,
    wind: Option<OwmWind>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    clouds: Option<OwmClouds>,
    visibility: Option<f64>,
    dt: Option<i64>,
    name: Option<String>,
    rain: Option<OwmPrecipitation>,
    snow: Option<OwmPrecipitation>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: Option<f64>,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwmClouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwmPrecipitation {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt: i64,
    main: OwmMain,
    wind: Option<OwmWind>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    clouds: Option<OwmClouds>,
    pop: Option<f64>,
    rain: Option<OwmPrecipitation>,
    snow: Option<OwmPrecipitation>,
}

impl OwmCondition {
    fn to_condition(&self) -> Condition {
        Condition {
            kind: ConditionKind::from_main(&self.main),
            description: self.description.clone(),
            icon: self.icon.clone(),
        }
    }
}

impl OwmPrecipitation {
    /// 1-hour amount, else 3-hour total spread over three hours, else 0.
    fn rate(&self) -> f64 {
        self.one_hour
            .filter(|v| *v > 0.0)
            .or_else(|| self.three_hours.map(|v| v / 3.0))
            .unwrap_or(0.0)
    }
}

/// Rainfall rate in mm/h from the `rain`/`snow` sub-objects.
fn extract_rainfall(rain: Option<&OwmPrecipitation>, snow: Option<&OwmPrecipitation>) -> f64 {
    if let Some(rain) = rain {
        return rain.rate();
    }
    if let Some(snow) = snow {
        return snow.rate() * SNOW_TO_RAIN;
    }
    0.0
}

fn timestamp(dt: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(dt, 0).single()
}

#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    cache: Arc<AcquisitionCache>,
    api_key: Arc<ApiKey>,
    timeout: Duration,
}

impl OpenWeatherClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        cache: Arc<AcquisitionCache>,
        api_key: Arc<ApiKey>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            cache,
            api_key,
            timeout,
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_configured()
    }

    /// Fetch current conditions and, when available, the 5-day forecast.
    #[tracing::instrument(skip(self, cancel), level = "info")]
    pub async fn fetch(
        &self,
        lat: f64,
        lng: f64,
        cancel: &CancellationToken,
    ) -> Result<WeatherBundle, WeatherError> {
        let key = self.api_key.get().ok_or(WeatherError::MissingKey)?;

        let cache_key = AcquisitionCache::weather_key(lat, lng);
        if let Some(hit) = self.cache.weather(&cache_key) {
            return Ok(hit.as_ref().clone());
        }

        let params = [
            ("lat", lat.to_string()),
            ("lon", lng.to_string()),
            ("appid", key),
            ("units", "metric".to_string()),
        ];

        let current_url = endpoint(&self.base_url, "weather", &params)?;
        let current: OwmCurrent =
            match get_json(&self.client, current_url, self.timeout, cancel, PROVIDER).await {
                Ok(current) => current,
                Err(WeatherError::Provider { status: 401, .. }) => {
                    return Err(WeatherError::InvalidKey)
                }
                Err(e) => return Err(e),
            };
        let observation = current_observation(current, lat, lng, Utc::now());

        let forecast_url = endpoint(&self.base_url, "forecast", &params)?;
        let fetched =
            get_json::<OwmForecast>(&self.client, forecast_url, self.timeout, cancel, PROVIDER)
                .await;
        let forecast = match fetched {
            Ok(forecast) => Some(forecast_series(forecast)),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!("Forecast fetch failed: {}", e);
                None
            }
        };

        let bundle = WeatherBundle {
            observation,
            forecast,
            source: DataSource::OpenWeatherMap,
        };
        self.cache.put_weather(cache_key, Arc::new(bundle.clone()));
        Ok(bundle)
    }
}

fn current_observation(
    current: OwmCurrent,
    lat: f64,
    lng: f64,
    now: DateTime<Utc>,
) -> WeatherObservation {
    let rainfall = extract_rainfall(current.rain.as_ref(), current.snow.as_ref());

    WeatherObservation {
        readings: current.main.map(|main| CoreReadings {
            temperature: main.temp,
            feels_like: main.feels_like,
            humidity: main.humidity,
            pressure: main.pressure,
        }),
        wind_speed_kmh: current.wind.as_ref().map(|w| w.speed * MS_TO_KMH),
        wind_direction_deg: current.wind.as_ref().map(|w| w.deg),
        cloud_cover: current.clouds.map(|c| c.all),
        visibility_m: current.visibility,
        condition: current.weather.first().map(OwmCondition::to_condition),
        rainfall_mm_h: rainfall,
        timestamp: current.dt.and_then(timestamp).unwrap_or(now),
        lat,
        lng,
        place_name: current.name.filter(|n| !n.is_empty()),
    }
    .normalized()
}

fn forecast_series(forecast: OwmForecast) -> ForecastSeries {
    let entries = forecast
        .list
        .into_iter()
        .filter_map(|item| {
            let time = timestamp(item.dt)?;
            let rainfall = extract_rainfall(item.rain.as_ref(), item.snow.as_ref());
            Some(ForecastEntry {
                time,
                temperature: item.main.temp,
                temp_min: item.main.temp_min.unwrap_or(item.main.temp),
                temp_max: item.main.temp_max.unwrap_or(item.main.temp),
                humidity: item.main.humidity,
                pressure: item.main.pressure,
                wind_speed_kmh: item.wind.as_ref().map_or(0.0, |w| w.speed * MS_TO_KMH),
                wind_direction_deg: item.wind.as_ref().map_or(0.0, |w| w.deg),
                cloud_cover: item.clouds.map_or(0.0, |c| c.all),
                condition: item.weather.first().map(OwmCondition::to_condition),
                rainfall_mm_h: rainfall,
                pop: item.pop.unwrap_or(0.0).clamp(0.0, 1.0),
            })
        })
        .collect();

    ForecastSeries {
        entries,
        daily: Vec::new(),
    }
}
