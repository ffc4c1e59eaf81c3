//! Heuristic cloud burst risk scoring.
//!
//! Each meteorological factor contributes from at most one band; bands are
//! checked highest first and the running total is clamped to 0..=100.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ConditionKind, ForecastSeries, WeatherObservation};

const DEFAULT_VISIBILITY_M: f64 = 10_000.0;
const KMH_PER_MS: f64 = 3.6;

pub const INSUFFICIENT_DATA: &str = "Insufficient data";
pub const NORMAL_CONDITIONS: &str = "Normal conditions";
pub const CLOUD_BURST_WARNING: &str = "CRITICAL: Cloud burst conditions detected!";
pub const APPROACHING_WARNING: &str = "WARNING: Approaching cloud burst threshold";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            75.. => Self::Critical,
            55.. => Self::High,
            35.. => Self::Medium,
            15.. => Self::Low,
            _ => Self::Minimal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "MINIMAL",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// 0..=100
    pub score: u8,
    pub level: RiskLevel,
    /// Never empty
    pub factors: Vec<String>,
    /// Present only when a rainfall warning fired
    pub warnings: Option<Vec<String>>,
}

impl RiskAssessment {
    fn insufficient_data() -> Self {
        Self {
            score: 0,
            level: RiskLevel::Low,
            factors: vec![INSUFFICIENT_DATA.to_string()],
            warnings: None,
        }
    }
}

/// Running total plus the factor and warning text collected so far.
#[derive(Default)]
struct Tally {
    score: i32,
    factors: Vec<String>,
    warnings: Vec<String>,
}

impl Tally {
    fn add(&mut self, delta: i32, factor: String) {
        self.score += delta;
        self.factors.push(factor);
    }

    fn finish(self) -> RiskAssessment {
        let score = self.score.clamp(0, 100) as u8;
        let factors = if self.factors.is_empty() {
            vec![NORMAL_CONDITIONS.to_string()]
        } else {
            self.factors
        };
        RiskAssessment {
            score,
            level: RiskLevel::from_score(score),
            factors,
            warnings: (!self.warnings.is_empty()).then_some(self.warnings),
        }
    }
}

/// Score an observation. Missing core readings yield an "Insufficient data"
/// assessment rather than an error.
pub fn assess_risk(observation: &WeatherObservation) -> RiskAssessment {
    let Some(readings) = observation.readings.as_ref() else {
        return RiskAssessment::insufficient_data();
    };

    let rainfall = observation.rainfall_mm_h;
    let humidity = readings.humidity;
    let pressure = readings.pressure;
    let temp = readings.temperature;
    let wind_ms = observation.wind_speed_kmh.unwrap_or(0.0) / KMH_PER_MS;
    let cloud_cover = observation.cloud_cover.unwrap_or(0.0);
    let visibility = observation.visibility_m.unwrap_or(DEFAULT_VISIBILITY_M);

    let mut tally = Tally::default();

    if rainfall > 100.0 {
        tally.add(
            50,
            format!("Extreme rainfall: {:.1}mm/h (Cloud Burst Level!)", rainfall),
        );
        tally.warnings.push(CLOUD_BURST_WARNING.to_string());
    } else if rainfall > 50.0 {
        tally.add(40, format!("Very heavy rainfall: {:.1}mm/h", rainfall));
        tally.warnings.push(APPROACHING_WARNING.to_string());
    } else if rainfall > 20.0 {
        tally.add(30, format!("Heavy rainfall: {:.1}mm/h", rainfall));
    } else if rainfall > 10.0 {
        tally.add(20, format!("Moderate rainfall: {:.1}mm/h", rainfall));
    } else if rainfall > 5.0 {
        tally.add(10, format!("Light rainfall: {:.1}mm/h", rainfall));
    }

    if humidity > 90.0 {
        tally.add(25, format!("Extremely high humidity: {}%", humidity));
    } else if humidity > 85.0 {
        tally.add(20, format!("Very high humidity: {}%", humidity));
    } else if humidity > 70.0 {
        tally.add(15, format!("High humidity: {}%", humidity));
    } else if humidity < 30.0 {
        tally.add(-5, format!("Low humidity: {}% (reduces risk)", humidity));
    }

    if pressure < 995.0 {
        tally.add(20, format!("Very low pressure: {:.1}hPa (unstable)", pressure));
    } else if pressure < 1005.0 {
        tally.add(15, format!("Low pressure: {:.1}hPa", pressure));
    } else if pressure > 1025.0 {
        tally.add(-5, format!("High pressure: {:.1}hPa (stable)", pressure));
    }

    if temp > 40.0 {
        tally.add(
            15,
            format!("Very high temperature: {:.1}°C (high convective energy)", temp),
        );
    } else if temp > 35.0 {
        tally.add(10, format!("High temperature: {:.1}°C", temp));
    } else if temp < 15.0 {
        tally.add(-5, format!("Low temperature: {:.1}°C (reduces risk)", temp));
    }

    if wind_ms > 20.0 {
        tally.add(10, format!("Strong winds: {:.1}m/s", wind_ms));
    } else if wind_ms > 10.0 {
        tally.add(5, format!("Moderate winds: {:.1}m/s", wind_ms));
    }

    if cloud_cover > 90.0 {
        tally.add(10, format!("Dense cloud cover: {}%", cloud_cover));
    } else if cloud_cover > 70.0 {
        tally.add(5, format!("Heavy cloud cover: {}%", cloud_cover));
    }

    match observation.condition_kind() {
        Some(ConditionKind::Thunderstorm) => {
            tally.add(15, "Thunderstorm activity detected".to_string())
        }
        Some(ConditionKind::Rain) => tally.add(10, "Active rainfall".to_string()),
        _ => {}
    }

    if visibility < 1000.0 {
        tally.add(10, format!("Very low visibility: {}m", visibility));
    } else if visibility < 5000.0 {
        tally.add(5, format!("Reduced visibility: {}m", visibility));
    }

    tally.finish()
}

/// Highest-scoring forecast step
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPeak {
    pub time: DateTime<Utc>,
    pub assessment: RiskAssessment,
}

/// Score every forecast entry and return the riskiest one. Ties keep the
/// earliest entry. `None` for an empty series.
pub fn assess_forecast(forecast: &ForecastSeries, lat: f64, lng: f64) -> Option<ForecastPeak> {
    forecast
        .iter()
        .map(|entry| ForecastPeak {
            time: entry.time,
            assessment: assess_risk(&entry.to_observation(lat, lng)),
        })
        .fold(None, |peak: Option<ForecastPeak>, candidate| match peak {
            Some(p) if p.assessment.score >= candidate.assessment.score => Some(p),
            _ => Some(candidate),
        })
}
