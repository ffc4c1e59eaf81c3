use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Acquisition settings (timeouts, cache, refresh)
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Provider endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Optional AI narrative enrichment
    #[serde(default)]
    pub narrative: NarrativeConfig,

    /// Where the OpenWeatherMap key is persisted
    #[serde(default)]
    pub keys: KeyStorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Query used when the dashboard starts without one
    #[serde(default = "default_query")]
    pub default_query: String,

    /// Timezone passed to Open-Meteo for hourly timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Refresh interval in minutes (scheduling is up to the caller)
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,

    /// Acquisition cache freshness window
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Timeout for weather and forward-geocode calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for reverse-geocode calls
    #[serde(default = "default_reverse_geocode_timeout_secs")]
    pub reverse_geocode_timeout_secs: u64,
}

fn default_query() -> String {
    "New Delhi".to_string()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_refresh_minutes() -> u32 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_reverse_geocode_timeout_secs() -> u64 {
    3
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            default_query: default_query(),
            timezone: default_timezone(),
            refresh_minutes: default_refresh_minutes(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            reverse_geocode_timeout_secs: default_reverse_geocode_timeout_secs(),
        }
    }
}

impl WeatherConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reverse_geocode_timeout(&self) -> Duration {
        Duration::from_secs(self.reverse_geocode_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_minutes) * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Open-Meteo API base (free, no key)
    #[serde(default = "default_open_meteo_url")]
    pub open_meteo_url: String,

    /// OpenWeatherMap data API base
    #[serde(default = "default_openweather_url")]
    pub openweather_url: String,

    /// OpenWeatherMap geocoding API base
    #[serde(default = "default_openweather_geocode_url")]
    pub openweather_geocode_url: String,
}

fn default_open_meteo_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_openweather_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_openweather_geocode_url() -> String {
    "https://api.openweathermap.org/geo/1.0".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            open_meteo_url: default_open_meteo_url(),
            openweather_url: default_openweather_url(),
            openweather_geocode_url: default_openweather_geocode_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default = "default_narrative_enabled")]
    pub enabled: bool,

    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_narrative_api_url")]
    pub api_url: String,

    #[serde(default = "default_narrative_model")]
    pub model: String,

    /// Environment variable holding the narrative API key
    #[serde(default = "default_narrative_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_narrative_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_narrative_enabled() -> bool {
    true
}

fn default_narrative_api_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_narrative_model() -> String {
    "openai/gpt-oss-20b".to_string()
}

fn default_narrative_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_narrative_timeout_secs() -> u64 {
    30
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: default_narrative_enabled(),
            api_url: default_narrative_api_url(),
            model: default_narrative_model(),
            api_key_env: default_narrative_api_key_env(),
            timeout_secs: default_narrative_timeout_secs(),
        }
    }
}

impl NarrativeConfig {
    /// Read the narrative API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Persistence backend for the OpenWeatherMap API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackendKind {
    /// System keyring
    #[default]
    Keyring,
    /// Plain file under the config directory
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyStorageConfig {
    #[serde(default)]
    pub backend: KeyBackendKind,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cloudburst");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            providers: ProvidersConfig::default(),
            narrative: NarrativeConfig::default(),
            keys: KeyStorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; critical errors fail the load.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(
            &self.providers.open_meteo_url,
            "providers.open_meteo_url",
            &mut result,
        );
        self.validate_url(
            &self.providers.openweather_url,
            "providers.openweather_url",
            &mut result,
        );
        self.validate_url(
            &self.providers.openweather_geocode_url,
            "providers.openweather_geocode_url",
            &mut result,
        );

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }
        if self.weather.reverse_geocode_timeout_secs == 0 {
            result.add_error(
                "weather.reverse_geocode_timeout_secs",
                "Reverse geocode timeout must be greater than 0",
            );
        }

        if self.weather.cache_ttl_secs == 0 {
            result.add_warning("weather.cache_ttl_secs", "Caching disabled (0 seconds)");
        } else if self.weather.cache_ttl_secs > 3600 {
            result.add_warning(
                "weather.cache_ttl_secs",
                "Cache TTL is more than an hour; risk scores may be stale",
            );
        }

        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh interval is more than 24 hours",
            );
        }

        if self.weather.timezone.trim().is_empty() {
            result.add_error("weather.timezone", "Timezone must not be empty");
        }

        if self.narrative.enabled {
            self.validate_url(&self.narrative.api_url, "narrative.api_url", &mut result);
            if self.narrative.api_key().is_none() {
                result.add_warning(
                    "narrative",
                    format!(
                        "{} not set - AI insights will be unavailable",
                        self.narrative.api_key_env
                    ),
                );
            }
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("cloudburst");

        Ok(config_dir.join("config.toml"))
    }
}
