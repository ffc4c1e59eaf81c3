//! Integration tests for provider fallback and caching using wiremock.
//!
//! Every provider endpoint is served by one mock server under its real path prefix.

use cloudburst_core::{Config, WeatherError};
use cloudburst_weather::{ApiKey, DataSource, Location, WeatherService, WeatherTarget};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.providers.open_meteo_url = format!("{}/v1", server.uri());
    config.providers.openweather_url = format!("{}/data/2.5", server.uri());
    config.providers.openweather_geocode_url = format!("{}/geo/1.0", server.uri());
    config
}

fn service(config: &Config, key: Option<&str>) -> WeatherService {
    WeatherService::from_config(config, Arc::new(ApiKey::in_memory(key))).unwrap()
}

fn shimla() -> WeatherTarget {
    WeatherTarget::Location(Location::new(31.1048, 77.1734, "Shimla, IN"))
}

fn owm_current() -> serde_json::Value {
    serde_json::json!({
        "weather": [{"main": "Thunderstorm", "description": "thunderstorm with heavy rain", "icon": "11d"}],
        "main": {"temp": 19.0, "feels_like": 19.2, "humidity": 97, "pressure": 992},
        "visibility": 800,
        "wind": {"speed": 12.0, "deg": 225},
        "clouds": {"all": 100},
        "rain": {"1h": 110.0},
        "dt": 1719835200,
        "name": "Shimla"
    })
}

fn owm_forecast() -> serde_json::Value {
    serde_json::json!({
        "list": [{
            "dt": 1719846000,
            "main": {"temp": 18.0, "temp_min": 17.0, "temp_max": 19.0, "humidity": 95, "pressure": 994},
            "weather": [{"main": "Rain", "description": "heavy intensity rain", "icon": "10d"}],
            "wind": {"speed": 8.0, "deg": 210},
            "clouds": {"all": 100},
            "pop": 1.0,
            "rain": {"3h": 60.0}
        }]
    })
}

async fn mount_open_meteo_failure(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_no_key_surfaces_free_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    // Must never be consulted without a key
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_current()))
        .expect(0)
        .mount(&server)
        .await;

    let service = service(&config_for(&server), None);
    let err = service
        .get_weather(shimla(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WeatherError::MalformedPayload(_)));
}

#[tokio::test]
async fn test_fallback_to_key_gated_provider() {
    let server = MockServer::start().await;
    mount_open_meteo_failure(&server, 503).await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_current()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_forecast()))
        .mount(&server)
        .await;

    let service = service(&config_for(&server), Some("owm-key"));
    let report = service
        .get_weather(shimla(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.source, DataSource::OpenWeatherMap);
    assert_eq!(report.forecast.len(), 1);
    assert_eq!(report.forecast.entries[0].rainfall_mm_h, 20.0);

    let (risk, view) = WeatherService::assess(&report);
    assert_eq!(risk.score, 100);
    assert_eq!(
        risk.warnings,
        Some(vec!["CRITICAL: Cloud burst conditions detected!".to_string()])
    );
    assert_eq!(view.wind_direction, "SW");
    assert_eq!(view.location, "Shimla");
}

#[tokio::test]
async fn test_failed_fallback_wraps_primary_error() {
    let server = MockServer::start().await;
    mount_open_meteo_failure(&server, 502).await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let service = service(&config_for(&server), Some("revoked"));
    let err = service
        .get_weather(shimla(), &CancellationToken::new())
        .await
        .unwrap_err();

    let expected_primary = WeatherError::Provider {
        provider: "Open-Meteo",
        status: 502,
    };
    assert_eq!(
        err,
        WeatherError::WeatherUnavailable {
            primary: Box::new(expected_primary.clone())
        }
    );
    assert_eq!(err.primary(), &expected_primary);
    assert_eq!(
        err.to_string(),
        "Failed to fetch weather data: Open-Meteo API error: 502"
    );
}

#[tokio::test]
async fn test_fallback_without_forecast_is_unavailable() {
    let server = MockServer::start().await;
    mount_open_meteo_failure(&server, 500).await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_current()))
        .mount(&server)
        .await;

    let service = service(&config_for(&server), Some("owm-key"));
    let err = service
        .get_weather(shimla(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WeatherError::WeatherUnavailable { .. }));
    assert_eq!(
        err.primary(),
        &WeatherError::Provider {
            provider: "Open-Meteo",
            status: 500
        }
    );
}

#[tokio::test]
async fn test_fallback_result_cached_within_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_forecast()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_current()))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&config_for(&server), Some("owm-key"));
    let cancel = CancellationToken::new();
    let first = service.get_weather(shimla(), &cancel).await.unwrap();
    let second = service.get_weather(shimla(), &cancel).await.unwrap();

    assert_eq!(first.observation, second.observation);
    assert_eq!(second.source, DataSource::OpenWeatherMap);
    assert_eq!(service.cache().len(), 1);
}

#[tokio::test]
async fn test_fallback_refetched_after_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_forecast()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_current()))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.weather.cache_ttl_secs = 0;
    let service = service(&config, Some("owm-key"));
    let cancel = CancellationToken::new();
    service.get_weather(shimla(), &cancel).await.unwrap();
    service.get_weather(shimla(), &cancel).await.unwrap();
}

#[tokio::test]
async fn test_geocode_cache_returns_same_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "Kedarnath", "lat": 30.7352, "lon": 79.0669, "country": "IN"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&config_for(&server), Some("owm-key"));
    let cancel = CancellationToken::new();
    let first = service.resolve("Kedarnath", &cancel).await;
    let second = service.resolve("KEDARNATH", &cancel).await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name, "Kedarnath, IN");
}

#[tokio::test]
async fn test_timeout_is_reported_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.weather.request_timeout_secs = 1;
    let service = service(&config, None);
    let err = service
        .get_weather(shimla(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, WeatherError::Timeout);
}

#[tokio::test]
async fn test_cancellation_skips_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_current()))
        .expect(0)
        .mount(&server)
        .await;

    let service = service(&config_for(&server), Some("owm-key"));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = service.get_weather(shimla(), &cancel).await.unwrap_err();
    assert_eq!(err, WeatherError::Cancelled);
}
