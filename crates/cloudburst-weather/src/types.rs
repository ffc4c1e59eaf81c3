use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Resolved geographic location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

impl Location {
    pub fn new(lat: f64, lng: f64, name: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            name: name.into(),
        }
    }
}

/// Primary weather condition, using OpenWeatherMap's `weather[].main` taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionKind {
    Clear,
    Clouds,
    Drizzle,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
    Other(String),
}

impl ConditionKind {
    pub fn from_main(main: &str) -> Self {
        match main {
            "Clear" => Self::Clear,
            "Clouds" => Self::Clouds,
            "Drizzle" => Self::Drizzle,
            "Rain" => Self::Rain,
            "Thunderstorm" => Self::Thunderstorm,
            "Snow" => Self::Snow,
            "Mist" => Self::Mist,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Mist => "Mist",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ConditionKind {
    fn from(s: String) -> Self {
        Self::from_main(&s)
    }
}

impl From<ConditionKind> for String {
    fn from(kind: ConditionKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Condition with the provider's description and icon code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub description: String,
    pub icon: String,
}

impl Condition {
    /// Synthetic condition for providers without a condition taxonomy:
    /// any precipitation reads as rain.
    pub fn from_precipitation(precipitation: f64) -> Self {
        if precipitation > 0.0 {
            Self {
                kind: ConditionKind::Rain,
                description: "rain".to_string(),
                icon: "10d".to_string(),
            }
        } else {
            Self {
                kind: ConditionKind::Clear,
                description: "clear sky".to_string(),
                icon: "01d".to_string(),
            }
        }
    }
}

/// Readings the risk engine cannot work without
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreReadings {
    /// °C
    pub temperature: f64,
    /// °C
    pub feels_like: Option<f64>,
    /// %
    pub humidity: f64,
    /// hPa
    pub pressure: f64,
}

/// Canonical, provider-agnostic weather snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// `None` marks degenerate input
    pub readings: Option<CoreReadings>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    /// %
    pub cloud_cover: Option<f64>,
    /// metres
    pub visibility_m: Option<f64>,
    pub condition: Option<Condition>,
    /// mm/h
    pub rainfall_mm_h: f64,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lng: f64,
    pub place_name: Option<String>,
}

impl WeatherObservation {
    /// Enforce the canonical ranges: rainfall >= 0, humidity and cloud cover in [0, 100].
    pub(crate) fn normalized(mut self) -> Self {
        self.rainfall_mm_h = self.rainfall_mm_h.max(0.0);
        if let Some(readings) = self.readings.as_mut() {
            readings.humidity = readings.humidity.clamp(0.0, 100.0);
        }
        self.cloud_cover = self.cloud_cover.map(|c| c.clamp(0.0, 100.0));
        self
    }

    pub fn condition_kind(&self) -> Option<&ConditionKind> {
        self.condition.as_ref().map(|c| &c.kind)
    }
}

/// One forecast step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction_deg: f64,
    pub cloud_cover: f64,
    pub condition: Option<Condition>,
    /// mm/h
    pub rainfall_mm_h: f64,
    /// Probability of precipitation, in [0, 1]
    pub pop: f64,
}

impl ForecastEntry {
    /// View this entry as an observation so it can be scored like current conditions.
    pub fn to_observation(&self, lat: f64, lng: f64) -> WeatherObservation {
        WeatherObservation {
            readings: Some(CoreReadings {
                temperature: self.temperature,
                feels_like: None,
                humidity: self.humidity,
                pressure: self.pressure,
            }),
            wind_speed_kmh: Some(self.wind_speed_kmh),
            wind_direction_deg: Some(self.wind_direction_deg),
            cloud_cover: Some(self.cloud_cover),
            visibility_m: None,
            condition: self.condition.clone(),
            rainfall_mm_h: self.rainfall_mm_h,
            timestamp: self.time,
            lat,
            lng,
            place_name: None,
        }
        .normalized()
    }
}

/// Per-day aggregate reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub precipitation_sum: f64,
}

/// Chronological forecast, in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub entries: Vec<ForecastEntry>,
    pub daily: Vec<DailySummary>,
}

impl ForecastSeries {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ForecastEntry> {
        self.entries.iter()
    }
}

/// Which provider produced a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    OpenMeteo,
    OpenWeatherMap,
}

impl DataSource {
    /// Label shown next to the data on the dashboard
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenMeteo => "Open-Meteo (FREE)",
            Self::OpenWeatherMap => "OpenWeatherMap (Free Tier)",
        }
    }
}

/// Adapter output: observation plus an optional forecast
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherBundle {
    pub observation: WeatherObservation,
    pub forecast: Option<ForecastSeries>,
    pub source: DataSource,
}

/// Orchestrator output
#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub observation: WeatherObservation,
    pub forecast: ForecastSeries,
    pub location: Arc<Location>,
    pub source: DataSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_kind_from_main() {
        assert_eq!(ConditionKind::from_main("Rain"), ConditionKind::Rain);
        assert_eq!(
            ConditionKind::from_main("Thunderstorm"),
            ConditionKind::Thunderstorm
        );
        assert_eq!(
            ConditionKind::from_main("Haze"),
            ConditionKind::Other("Haze".to_string())
        );
        assert_eq!(ConditionKind::from_main("Haze").as_str(), "Haze");
    }

    #[test]
    fn test_condition_kind_serde_as_string() {
        let json = serde_json::to_string(&ConditionKind::Thunderstorm).unwrap();
        assert_eq!(json, "\"Thunderstorm\"");
        let kind: ConditionKind = serde_json::from_str("\"Smoke\"").unwrap();
        assert_eq!(kind, ConditionKind::Other("Smoke".to_string()));
    }

    #[test]
    fn test_synthetic_condition() {
        let rain = Condition::from_precipitation(0.4);
        assert_eq!(rain.kind, ConditionKind::Rain);
        assert_eq!(rain.icon, "10d");

        let clear = Condition::from_precipitation(0.0);
        assert_eq!(clear.kind, ConditionKind::Clear);
        assert_eq!(clear.description, "clear sky");
    }

    #[test]
    fn test_normalized_enforces_ranges() {
        let obs = WeatherObservation {
            readings: Some(CoreReadings {
                temperature: 20.0,
                feels_like: None,
                humidity: 104.0,
                pressure: 1010.0,
            }),
            cloud_cover: Some(-3.0),
            rainfall_mm_h: -1.0,
            ..Default::default()
        }
        .normalized();

        assert_eq!(obs.rainfall_mm_h, 0.0);
        assert_eq!(obs.readings.unwrap().humidity, 100.0);
        assert_eq!(obs.cloud_cover, Some(0.0));
    }

    #[test]
    fn test_data_source_labels() {
        assert_eq!(DataSource::OpenMeteo.label(), "Open-Meteo (FREE)");
        assert_eq!(DataSource::OpenWeatherMap.label(), "OpenWeatherMap (Free Tier)");
    }
}
