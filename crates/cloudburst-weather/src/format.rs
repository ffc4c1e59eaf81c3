//! Display-ready views of canonical weather data.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ForecastEntry, ForecastSeries, WeatherObservation};

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

const UNKNOWN: &str = "Unknown";
const DEFAULT_ICON: &str = "01d";

/// Forecast entries between outlook cards (3-hourly data, one card per day)
pub const OUTLOOK_STRIDE: usize = 8;
pub const OUTLOOK_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RainfallIntensity {
    Light,
    Moderate,
    Heavy,
    Severe,
}

impl RainfallIntensity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Moderate => "Moderate",
            Self::Heavy => "Heavy",
            Self::Severe => "Severe",
        }
    }
}

/// Dashboard colour band for a rainfall rate in mm/h.
pub fn rainfall_intensity(rainfall_mm_h: f64) -> RainfallIntensity {
    if rainfall_mm_h > 20.0 {
        RainfallIntensity::Severe
    } else if rainfall_mm_h > 10.0 {
        RainfallIntensity::Heavy
    } else if rainfall_mm_h > 5.0 {
        RainfallIntensity::Moderate
    } else {
        RainfallIntensity::Light
    }
}

/// 16-point compass label for a bearing in degrees.
pub fn compass_direction(degrees: f64) -> &'static str {
    let index = (degrees / 22.5).round() as i64;
    COMPASS[index.rem_euclid(COMPASS.len() as i64) as usize]
}

/// Round half up, the way the dashboard rounds.
fn round(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

/// Current conditions ready for display. Core readings are `None` when the
/// observation had none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedView {
    pub temperature: Option<i64>,
    pub feels_like: Option<i64>,
    pub humidity: Option<i64>,
    pub pressure: Option<i64>,
    pub wind_speed_kmh: i64,
    pub wind_direction: &'static str,
    pub rainfall_mm_h: f64,
    pub rainfall_intensity: RainfallIntensity,
    pub condition: String,
    pub description: String,
    pub icon: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

pub fn format(observation: &WeatherObservation) -> FormattedView {
    let readings = observation.readings.as_ref();
    let condition = observation.condition.as_ref();

    FormattedView {
        temperature: readings.map(|r| round(r.temperature)),
        feels_like: readings.map(|r| round(r.feels_like.unwrap_or(r.temperature))),
        humidity: readings.map(|r| round(r.humidity)),
        pressure: readings.map(|r| round(r.pressure)),
        wind_speed_kmh: round(observation.wind_speed_kmh.unwrap_or(0.0)),
        wind_direction: compass_direction(observation.wind_direction_deg.unwrap_or(0.0)),
        rainfall_mm_h: round_tenth(observation.rainfall_mm_h),
        rainfall_intensity: rainfall_intensity(observation.rainfall_mm_h),
        condition: condition
            .map(|c| c.kind.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        description: condition
            .map(|c| c.description.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        icon: condition
            .map(|c| c.icon.clone())
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| DEFAULT_ICON.to_string()),
        location: observation
            .place_name
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string()),
        timestamp: observation.timestamp,
    }
}

/// One card of the multi-day outlook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyOutlook {
    pub time: DateTime<Utc>,
    pub is_today: bool,
    pub temperature: i64,
    pub temp_min: i64,
    pub temp_max: i64,
    pub description: String,
    pub rainfall_mm_h: f64,
    /// 0..=100
    pub precipitation_chance: i64,
}

impl DailyOutlook {
    fn from_entry(entry: &ForecastEntry, is_today: bool) -> Self {
        Self {
            time: entry.time,
            is_today,
            temperature: round(entry.temperature),
            temp_min: round(entry.temp_min),
            temp_max: round(entry.temp_max),
            description: entry
                .condition
                .as_ref()
                .map(|c| c.description.clone())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "Clear".to_string()),
            rainfall_mm_h: round_tenth(entry.rainfall_mm_h),
            precipitation_chance: round(entry.pop * 100.0),
        }
    }
}

/// Every 8th forecast entry, at most 7 cards; the first is "today".
pub fn daily_outlook(forecast: &ForecastSeries) -> Vec<DailyOutlook> {
    forecast
        .iter()
        .step_by(OUTLOOK_STRIDE)
        .take(OUTLOOK_DAYS)
        .enumerate()
        .map(|(i, entry)| DailyOutlook::from_entry(entry, i == 0))
        .collect()
}
