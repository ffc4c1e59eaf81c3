//! Open-Meteo adapter: free, no key, current + hourly + daily in one call.
//!
//! Open-Meteo has no condition taxonomy, cloud cover or PoP in the requested
//! fields, so those are synthesized: condition from precipitation, cloud
//! cover from relative humidity, PoP fixed at 0.8/0.1. These approximations
//! are known and kept as-is.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use cloudburst_core::WeatherError;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::geocode::Geocoder;
use crate::http::{endpoint, get_json};
use crate::types::{
    Condition, CoreReadings, DailySummary, DataSource, ForecastEntry, ForecastSeries,
    WeatherBundle, WeatherObservation,
};

pub const PROVIDER: &str = "Open-Meteo";

/// Hourly entries kept from the response
pub const MAX_HOURLY_ENTRIES: usize = 24;
/// Daily summaries kept from the response
pub const MAX_DAILY_ENTRIES: usize = 7;

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,pressure_msl,wind_speed_10m,wind_direction_10m,precipitation";
const HOURLY_FIELDS: &str = "precipitation,temperature_2m,relative_humidity_2m";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum";

const FIXED_VISIBILITY_M: f64 = 10_000.0;
const HOURLY_SPREAD_C: f64 = 2.0;
const POP_WET: f64 = 0.8;
const POP_DRY: f64 = 0.1;

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    #[serde(default)]
    utc_offset_seconds: i32,
    current: OpenMeteoCurrent,
    hourly: Option<OpenMeteoHourly>,
    daily: Option<OpenMeteoDaily>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrent {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    pressure_msl: f64,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
    precipitation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    time: Vec<String>,
    precipitation: Vec<Option<f64>>,
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoDaily {
    time: Vec<String>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
}

#[derive(Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    timezone: String,
    timeout: Duration,
    geocoder: Arc<Geocoder>,
}

impl OpenMeteoClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        timezone: impl Into<String>,
        timeout: Duration,
        geocoder: Arc<Geocoder>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timezone: timezone.into(),
            timeout,
            geocoder,
        }
    }

    /// Fetch current conditions and up to 24 hourly entries.
    #[tracing::instrument(skip(self, cancel), level = "info")]
    pub async fn fetch(
        &self,
        lat: f64,
        lng: f64,
        cancel: &CancellationToken,
    ) -> Result<WeatherBundle, WeatherError> {
        let url = endpoint(
            &self.base_url,
            "forecast",
            &[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("wind_speed_unit", "ms".to_string()),
                ("timezone", self.timezone.clone()),
            ],
        )?;

        let response: OpenMeteoResponse =
            get_json(&self.client, url, self.timeout, cancel, PROVIDER).await?;

        let place_name = self.geocoder.reverse(lat, lng, cancel).await;
        let bundle = to_bundle(response, lat, lng, place_name, Utc::now())?;
        tracing::info!(
            "Fetched Open-Meteo data for {} ({} hourly entries)",
            bundle.observation.place_name.as_deref().unwrap_or("unknown"),
            bundle.forecast.as_ref().map_or(0, ForecastSeries::len)
        );
        Ok(bundle)
    }
}

fn to_bundle(
    response: OpenMeteoResponse,
    lat: f64,
    lng: f64,
    place_name: String,
    now: DateTime<Utc>,
) -> Result<WeatherBundle, WeatherError> {
    let current = &response.current;
    let precipitation = current.precipitation.unwrap_or(0.0);
    let pressure_hpa = current.pressure_msl / 100.0;
    let wind_kmh = current.wind_speed_10m * 3.6;

    let observation = WeatherObservation {
        readings: Some(CoreReadings {
            temperature: current.temperature_2m,
            feels_like: Some(current.temperature_2m),
            humidity: current.relative_humidity_2m,
            pressure: pressure_hpa,
        }),
        wind_speed_kmh: Some(wind_kmh),
        wind_direction_deg: Some(current.wind_direction_10m),
        cloud_cover: Some(current.relative_humidity_2m),
        visibility_m: Some(FIXED_VISIBILITY_M),
        condition: Some(Condition::from_precipitation(precipitation)),
        rainfall_mm_h: precipitation,
        timestamp: now,
        lat,
        lng,
        place_name: Some(place_name),
    }
    .normalized();

    let offset = response.utc_offset_seconds;
    let entries = match &response.hourly {
        Some(hourly) => hourly_entries(
            hourly,
            offset,
            pressure_hpa,
            wind_kmh,
            current.wind_direction_10m,
        )?,
        None => Vec::new(),
    };
    let daily = match &response.daily {
        Some(daily) => daily_summaries(daily)?,
        None => Vec::new(),
    };

    Ok(WeatherBundle {
        observation,
        forecast: Some(ForecastSeries { entries, daily }),
        source: DataSource::OpenMeteo,
    })
}

fn hourly_entries(
    hourly: &OpenMeteoHourly,
    utc_offset_seconds: i32,
    pressure_hpa: f64,
    wind_kmh: f64,
    wind_direction: f64,
) -> Result<Vec<ForecastEntry>, WeatherError> {
    let count = hourly.time.len().min(MAX_HOURLY_ENTRIES);
    let mut entries = Vec::with_capacity(count);

    for i in 0..count {
        let time = parse_local_time(&hourly.time[i], utc_offset_seconds)?;
        let temperature = aligned(&hourly.temperature_2m, i, "hourly.temperature_2m")?;
        let humidity = aligned(&hourly.relative_humidity_2m, i, "hourly.relative_humidity_2m")?;
        let (Some(temperature), Some(humidity)) = (temperature, humidity) else {
            tracing::debug!("Skipping hourly entry {} with missing readings", hourly.time[i]);
            continue;
        };
        let precipitation = aligned(&hourly.precipitation, i, "hourly.precipitation")?
            .unwrap_or(0.0)
            .max(0.0);

        entries.push(ForecastEntry {
            time,
            temperature,
            temp_min: temperature - HOURLY_SPREAD_C,
            temp_max: temperature + HOURLY_SPREAD_C,
            humidity,
            pressure: pressure_hpa,
            wind_speed_kmh: wind_kmh,
            wind_direction_deg: wind_direction,
            cloud_cover: humidity,
            condition: Some(Condition::from_precipitation(precipitation)),
            rainfall_mm_h: precipitation,
            pop: if precipitation > 0.0 { POP_WET } else { POP_DRY },
        });
    }

    Ok(entries)
}

fn daily_summaries(daily: &OpenMeteoDaily) -> Result<Vec<DailySummary>, WeatherError> {
    let count = daily.time.len().min(MAX_DAILY_ENTRIES);
    let mut summaries = Vec::with_capacity(count);

    for i in 0..count {
        let date = NaiveDate::parse_from_str(&daily.time[i], "%Y-%m-%d").map_err(|e| {
            WeatherError::MalformedPayload(format!("daily.time '{}': {}", daily.time[i], e))
        })?;
        let max = aligned(&daily.temperature_2m_max, i, "daily.temperature_2m_max")?;
        let min = aligned(&daily.temperature_2m_min, i, "daily.temperature_2m_min")?;
        let (Some(temp_max), Some(temp_min)) = (max, min) else {
            continue;
        };
        let precipitation_sum = aligned(&daily.precipitation_sum, i, "daily.precipitation_sum")?
            .unwrap_or(0.0);

        summaries.push(DailySummary {
            date,
            temp_max,
            temp_min,
            precipitation_sum,
        });
    }

    Ok(summaries)
}

/// Index into a series that must be aligned with `time`.
fn aligned(values: &[Option<f64>], i: usize, field: &str) -> Result<Option<f64>, WeatherError> {
    values.get(i).copied().ok_or_else(|| {
        WeatherError::MalformedPayload(format!(
            "{} has {} values, expected at least {}",
            field,
            values.len(),
            i + 1
        ))
    })
}

/// Open-Meteo reports local wall-clock times (`2024-06-01T14:00`) in the
/// requested timezone; shift them back to UTC.
fn parse_local_time(raw: &str, utc_offset_seconds: i32) -> Result<DateTime<Utc>, WeatherError> {
    let local = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map_err(|e| WeatherError::MalformedPayload(format!("hourly.time '{}': {}", raw, e)))?;
    let utc = local - chrono::Duration::seconds(i64::from(utc_offset_seconds));
    Ok(Utc.from_utc_datetime(&utc))
}
