//! Dashboard session state.
//!
//! Holds the current location and the last successful report together with
//! its risk assessment and display views. A failed fetch records the error
//! and leaves the previous report in place.

use chrono::{DateTime, Utc};
use cloudburst_core::WeatherError;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::format::{daily_outlook, DailyOutlook, FormattedView};
use crate::gazetteer;
use crate::orchestrator::{WeatherService, WeatherTarget};
use crate::risk::{assess_forecast, ForecastPeak, RiskAssessment};
use crate::types::{DataSource, Location, WeatherReport};

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub location: Arc<Location>,
    pub report: Option<WeatherReport>,
    pub risk: Option<RiskAssessment>,
    pub view: Option<FormattedView>,
    pub outlook: Vec<DailyOutlook>,
    pub forecast_peak: Option<ForecastPeak>,
    pub source: DataSource,
    pub error: Option<String>,
    pub loading: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            location: Arc::new(gazetteer::default_location()),
            report: None,
            risk: None,
            view: None,
            outlook: Vec::new(),
            forecast_peak: None,
            source: DataSource::OpenMeteo,
            error: None,
            loading: false,
            updated_at: None,
        }
    }
}

impl DashboardState {
    /// Label of the provider behind the current report
    pub fn source_label(&self) -> &'static str {
        self.source.label()
    }
}

pub struct DashboardSession {
    service: Arc<WeatherService>,
    state: RwLock<DashboardState>,
}

impl DashboardSession {
    pub fn new(service: Arc<WeatherService>) -> Self {
        Self {
            service,
            state: RwLock::new(DashboardState::default()),
        }
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.read().clone()
    }

    pub fn service(&self) -> &Arc<WeatherService> {
        &self.service
    }

    /// Point the session at a location without fetching.
    pub fn set_location(&self, location: Location) {
        self.state.write().location = Arc::new(location);
    }

    /// Geocode `query` and fetch weather for it. On success the resolved
    /// location becomes current.
    pub async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<(), WeatherError> {
        self.run(WeatherTarget::Query(query.to_string()), cancel)
            .await
    }

    /// Re-fetch weather for the current location.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<(), WeatherError> {
        let location = self.state.read().location.as_ref().clone();
        self.run(WeatherTarget::Location(location), cancel).await
    }

    async fn run(
        &self,
        target: WeatherTarget,
        cancel: &CancellationToken,
    ) -> Result<(), WeatherError> {
        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }

        let result = self.service.get_weather(target, cancel).await;

        let mut state = self.state.write();
        state.loading = false;
        match result {
            Ok(report) => {
                apply(&mut state, report);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Weather refresh failed: {}", e);
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

fn apply(state: &mut DashboardState, report: WeatherReport) {
    let (risk, view) = WeatherService::assess(&report);
    tracing::info!(
        "Risk for {}: {} ({})",
        report.location.name,
        risk.score,
        risk.level
    );

    state.outlook = daily_outlook(&report.forecast);
    state.forecast_peak =
        assess_forecast(&report.forecast, report.location.lat, report.location.lng);
    state.location = report.location.clone();
    state.source = report.source;
    state.risk = Some(risk);
    state.view = Some(view);
    state.updated_at = Some(Utc::now());
    state.report = Some(report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_store::ApiKey;
    use cloudburst_core::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> Arc<WeatherService> {
        let mut config = Config::default();
        config.providers.open_meteo_url = server.uri();
        config.providers.openweather_url = server.uri();
        config.providers.openweather_geocode_url = server.uri();
        Arc::new(WeatherService::from_config(&config, Arc::new(ApiKey::in_memory(None))).unwrap())
    }

    fn open_meteo_json() -> serde_json::Value {
        serde_json::json!({
            "current": {
                "temperature_2m": 31.0,
                "relative_humidity_2m": 60.0,
                "pressure_msl": 101000.0,
                "wind_speed_10m": 2.0,
                "wind_direction_10m": 90.0,
                "precipitation": 0.0
            }
        })
    }

    #[test]
    fn test_initial_state() {
        let state = DashboardState::default();
        assert_eq!(state.location.name, "New Delhi, India");
        assert_eq!(state.source_label(), "Open-Meteo (FREE)");
        assert!(state.report.is_none());
    }

    #[tokio::test]
    async fn test_search_updates_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_json()))
            .mount(&server)
            .await;

        let session = DashboardSession::new(service(&server));
        session
            .search("Surat", &CancellationToken::new())
            .await
            .unwrap();

        let state = session.snapshot();
        assert_eq!(state.location.name, "Surat, Gujarat");
        assert!(state.report.is_some());
        assert!(state.risk.is_some());
        assert_eq!(state.view.as_ref().unwrap().wind_direction, "E");
        assert!(state.error.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_json()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let session = DashboardSession::new(service(&server));
        let cancel = CancellationToken::new();
        session.refresh(&cancel).await.unwrap();
        let first = session.snapshot().updated_at;

        assert!(session.refresh(&cancel).await.is_err());
        let state = session.snapshot();
        assert!(state.report.is_some());
        assert_eq!(state.updated_at, first);
        assert_eq!(state.error.as_deref(), Some("Open-Meteo API error: 500"));
    }
}
