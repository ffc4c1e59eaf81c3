//! Shared GET-and-decode helper for the provider adapters.

use cloudburst_core::{ReqwestErrorExt, WeatherError};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub(crate) const USER_AGENT: &str = concat!("cloudburst/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client. Timeouts are applied per call.
pub fn build_client() -> Result<Client, WeatherError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| e.into_weather_error())
}

/// GET `url` and decode its JSON body.
///
/// The whole exchange (headers and body) is bounded by `timeout`. Expiry
/// yields `Timeout`, cancellation yields `Cancelled`, a non-2xx status yields
/// `Provider { provider, status }`, an undecodable body yields `MalformedPayload`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
    timeout: Duration,
    cancel: &CancellationToken,
    provider: &'static str,
) -> Result<T, WeatherError> {
    let exchange = async {
        let response = client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| e.into_weather_error())?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Provider {
                provider,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| e.into_weather_error())?;
        serde_json::from_slice::<T>(&body)
            .map_err(|e| WeatherError::MalformedPayload(format!("{}: {}", provider, e)))
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(WeatherError::Cancelled),
        outcome = tokio::time::timeout(timeout, exchange) => match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("{} request exceeded {:?}", provider, timeout);
                Err(WeatherError::Timeout)
            }
        },
    }
}

/// Parse a configured base URL and append `segment` to its path.
pub(crate) fn endpoint(
    base: &str,
    segment: &str,
    params: &[(&str, String)],
) -> Result<Url, WeatherError> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), segment);
    let parsed = if params.is_empty() {
        Url::parse(&joined)
    } else {
        Url::parse_with_params(&joined, params)
    };
    parsed.map_err(|e| WeatherError::Network(format!("invalid endpoint {}: {}", joined, e)))
}
