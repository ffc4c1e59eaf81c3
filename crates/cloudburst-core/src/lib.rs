pub mod config;
pub mod error;

pub use config::{
    Config, KeyBackendKind, KeyStorageConfig, NarrativeConfig, ProvidersConfig, ValidationResult,
    WeatherConfig,
};
pub use error::{AppError, ConfigError, ReqwestErrorExt, WeatherError};

use anyhow::Result;

/// Initialize logging for the cloudburst binary.
///
/// Honors `RUST_LOG`; falls back to `info`.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Cloudburst core initialized");
    Ok(())
}
