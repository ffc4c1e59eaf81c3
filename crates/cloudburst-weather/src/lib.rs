//! Weather acquisition and cloud burst risk scoring.
//!
//! Resolves places to coordinates, fetches conditions from Open-Meteo with
//! an optional OpenWeatherMap fallback, and turns the canonical observation
//! into a risk assessment and display-ready views.

pub mod cache;
pub mod format;
pub mod gazetteer;
pub mod geocode;
mod http;
pub mod key_store;
pub mod narrative;
pub mod orchestrator;
pub mod provider;
pub mod risk;
pub mod session;
pub mod types;

pub use cache::AcquisitionCache;
pub use format::{format, DailyOutlook, FormattedView, RainfallIntensity};
pub use geocode::Geocoder;
pub use http::build_client;
pub use key_store::{backend_for, ApiKey, KeyBackend, KeyStoreError};
pub use narrative::NarrativeClient;
pub use orchestrator::{WeatherService, WeatherTarget};
pub use risk::{assess_forecast, assess_risk, ForecastPeak, RiskAssessment, RiskLevel};
pub use session::{DashboardSession, DashboardState};
pub use types::*;
