//! Optional AI narrative over the current conditions and forecast.
//!
//! Talks to an OpenAI-compatible chat completions endpoint. Every method
//! returns displayable text: a missing key or any failure yields a fixed
//! fallback message instead of an error.

use cloudburst_core::{NarrativeConfig, ReqwestErrorExt, WeatherError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

use crate::types::{ForecastSeries, WeatherObservation};

pub const INSIGHTS_NO_KEY: &str =
    "AI insights unavailable - Groq API key not configured";
pub const TRENDS_NO_KEY: &str =
    "AI trends analysis unavailable - Groq API key not configured";
pub const INSIGHTS_FAILED: &str =
    "AI insights temporarily unavailable. Please check your connection and API key configuration.";
pub const TRENDS_FAILED: &str = "Weather trend analysis temporarily unavailable.";
const INSIGHTS_EMPTY: &str = "Unable to generate AI insights at this time.";
const TRENDS_EMPTY: &str = "Unable to analyze weather trends at this time.";

const PROVIDER: &str = "Narrative";
const TREND_ENTRIES: usize = 5;
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    model: &'a str,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
    reasoning_effort: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Sampling settings for one kind of request
struct Completion<'a> {
    system: &'a str,
    user: &'a str,
    temperature: f32,
    max_tokens: u32,
}

pub struct NarrativeClient {
    client: Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl NarrativeClient {
    /// Build from config; the key is read from the configured environment
    /// variable. A disabled config behaves like a missing key.
    pub fn from_config(client: Client, config: &NarrativeConfig) -> Self {
        let api_key = if config.enabled { config.api_key() } else { None };
        Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    #[cfg(test)]
    fn new_with_base_url(api_url: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            model: "test-model".to_string(),
            api_key: api_key.map(str::to_string),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Markdown risk analysis of current conditions.
    pub async fn insights(&self, observation: &WeatherObservation, location: &str) -> String {
        let Some(key) = self.api_key.as_deref() else {
            return INSIGHTS_NO_KEY.to_string();
        };

        let system = insights_prompt(observation, location);
        let completion = Completion {
            system: &system,
            user: "Please analyze this weather data for cloud burst risks and provide insights.",
            temperature: 0.7,
            max_tokens: 2048,
        };
        match self.complete(key, completion).await {
            Ok(Some(text)) => text,
            Ok(None) => INSIGHTS_EMPTY.to_string(),
            Err(e) => {
                tracing::warn!("Narrative insights failed: {}", e);
                INSIGHTS_FAILED.to_string()
            }
        }
    }

    /// Markdown trend analysis over the first few forecast entries.
    pub async fn trends(&self, forecast: &ForecastSeries, location: &str) -> String {
        let Some(key) = self.api_key.as_deref() else {
            return TRENDS_NO_KEY.to_string();
        };

        let system = trends_prompt(forecast, location);
        let completion = Completion {
            system: &system,
            user: "Analyze these weather trends for cloud burst risk assessment.",
            temperature: 0.6,
            max_tokens: 1024,
        };
        match self.complete(key, completion).await {
            Ok(Some(text)) => text,
            Ok(None) => TRENDS_EMPTY.to_string(),
            Err(e) => {
                tracing::warn!("Narrative trends failed: {}", e);
                TRENDS_FAILED.to_string()
            }
        }
    }

    async fn complete(
        &self,
        key: &str,
        completion: Completion<'_>,
    ) -> Result<Option<String>, WeatherError> {
        let body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: completion.system,
                },
                ChatMessage {
                    role: "user",
                    content: completion.user,
                },
            ],
            model: &self.model,
            temperature: completion.temperature,
            max_completion_tokens: completion.max_tokens,
            top_p: 1.0,
            stream: false,
            reasoning_effort: "medium",
        };

        let exchange = async {
            let response = self
                .client
                .post(&self.api_url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .await
                .map_err(|e| e.into_weather_error())?;

            let status = response.status();
            if !status.is_success() {
                return Err(WeatherError::Provider {
                    provider: PROVIDER,
                    status: status.as_u16(),
                });
            }

            response
                .json::<ChatResponse>()
                .await
                .map_err(|e| e.into_weather_error())
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| WeatherError::Timeout)??;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty()))
    }
}

fn or_na(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

fn insights_prompt(observation: &WeatherObservation, location: &str) -> String {
    let readings = observation.readings.as_ref();
    let description = observation
        .condition
        .as_ref()
        .map_or(NOT_AVAILABLE, |c| c.description.as_str());

    format!(
        "You are a weather analysis expert specializing in cloud burst prediction and risk \
assessment. Analyze the following weather data and provide actionable insights about cloud \
burst risks, safety recommendations, and weather patterns.

IMPORTANT: Format your response using Markdown syntax. Use:
- Headers (##, ###) for sections
- Tables for structured data (use markdown table syntax)
- Bullet points (-) or numbered lists for recommendations
- **Bold** for emphasis on important terms
- *Italic* for technical terms

Weather Data:
- Location: {location}
- Temperature: {temp}°C
- Humidity: {humidity}%
- Pressure: {pressure} hPa
- Wind Speed: {wind} km/h
- Rainfall: {rain} mm/h
- Weather Condition: {description}

Please provide in Markdown format:
1. ## Current risk assessment
2. ## Key weather patterns to watch (use a table if helpful)
3. ## Safety recommendations
4. ## Timeline for potential changes (use a table with columns: Time window, Expected changes, Actionable alert)",
        temp = or_na(readings.map(|r| r.temperature)),
        humidity = or_na(readings.map(|r| r.humidity)),
        pressure = or_na(readings.map(|r| r.pressure)),
        wind = or_na(observation.wind_speed_kmh),
        rain = observation.rainfall_mm_h,
    )
}

fn trends_prompt(forecast: &ForecastSeries, location: &str) -> String {
    let mut summary = String::new();
    for (i, entry) in forecast.iter().take(TREND_ENTRIES).enumerate() {
        if i > 0 {
            summary.push('\n');
        }
        let description = entry
            .condition
            .as_ref()
            .map_or(NOT_AVAILABLE, |c| c.description.as_str());
        let _ = write!(
            summary,
            "Day {}: {}°C, {}mm rain, {}",
            i + 1,
            entry.temperature,
            entry.rainfall_mm_h,
            description
        );
    }

    format!(
        "You are a meteorological expert analyzing weather forecast data for cloud burst risk \
assessment. Provide a concise analysis of weather trends and potential cloud burst risks over \
the next 5 days.

Forecast Data for {location}:
{summary}

Focus on (format in Markdown):
1. ## Weather pattern trends
2. ## Risk pattern analysis (increasing/decreasing)
3. ## Critical time periods to monitor
4. ## Overall risk trajectory"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Condition, CoreReadings, ForecastEntry};
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn observation() -> WeatherObservation {
        WeatherObservation {
            readings: Some(CoreReadings {
                temperature: 22.0,
                feels_like: None,
                humidity: 95.0,
                pressure: 998.0,
            }),
            wind_speed_kmh: Some(30.0),
            condition: Some(Condition::from_precipitation(40.0)),
            rainfall_mm_h: 40.0,
            ..Default::default()
        }
    }

    fn forecast(n: usize) -> ForecastSeries {
        let entries = (0..n)
            .map(|i| ForecastEntry {
                time: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64),
                temperature: 20.0,
                temp_min: 18.0,
                temp_max: 22.0,
                humidity: 90.0,
                pressure: 1000.0,
                wind_speed_kmh: 10.0,
                wind_direction_deg: 0.0,
                cloud_cover: 90.0,
                condition: None,
                rainfall_mm_h: 3.5,
                pop: 0.8,
            })
            .collect();
        ForecastSeries {
            entries,
            daily: Vec::new(),
        }
    }

    fn completion_json(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn test_insights_prompt_includes_readings() {
        let prompt = insights_prompt(&observation(), "Shimla, IN");
        assert!(prompt.contains("- Location: Shimla, IN"));
        assert!(prompt.contains("- Humidity: 95%"));
        assert!(prompt.contains("- Wind Speed: 30 km/h"));
        assert!(prompt.contains("- Weather Condition: rain"));
    }

    #[test]
    fn test_insights_prompt_degenerate() {
        let prompt = insights_prompt(&WeatherObservation::default(), "X");
        assert!(prompt.contains("- Temperature: N/A°C"));
        assert!(prompt.contains("- Weather Condition: N/A"));
    }

    #[test]
    fn test_trends_prompt_uses_first_five() {
        let prompt = trends_prompt(&forecast(8), "Pune");
        assert!(prompt.contains("Day 5: 20°C, 3.5mm rain, N/A"));
        assert!(!prompt.contains("Day 6"));
    }

    #[tokio::test]
    async fn test_no_key_fallbacks() {
        let client = NarrativeClient::new_with_base_url("http://127.0.0.1:9", None);
        assert!(!client.is_configured());
        assert_eq!(
            client.insights(&observation(), "X").await,
            "AI insights unavailable - Groq API key not configured"
        );
        assert_eq!(
            client.trends(&forecast(3), "X").await,
            "AI trends analysis unavailable - Groq API key not configured"
        );
    }

    #[tokio::test]
    async fn test_insights_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer groq-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "max_completion_tokens": 2048
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_json("## Risk: high")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/chat/completions", server.uri());
        let client = NarrativeClient::new_with_base_url(&url, Some("groq-key"));
        assert_eq!(client.insights(&observation(), "Shimla").await, "## Risk: high");
    }

    #[tokio::test]
    async fn test_failure_fallbacks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = NarrativeClient::new_with_base_url(&server.uri(), Some("k"));
        assert_eq!(client.insights(&observation(), "X").await, INSIGHTS_FAILED);
        assert_eq!(client.trends(&forecast(3), "X").await, TRENDS_FAILED);
    }

    #[tokio::test]
    async fn test_empty_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = NarrativeClient::new_with_base_url(&server.uri(), Some("k"));
        assert_eq!(client.trends(&forecast(3), "X").await, TRENDS_EMPTY);
    }
}
