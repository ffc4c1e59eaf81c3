use anyhow::{Context, Result};
use cloudburst_core::Config;
use cloudburst_weather::{
    backend_for, build_client, ApiKey, DashboardSession, NarrativeClient, WeatherService,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    cloudburst_core::init()?;

    let (config, _validation) = Config::load_validated()?;

    let api_key = Arc::new(ApiKey::load(backend_for(&config)));
    let service = Arc::new(
        WeatherService::from_config(&config, api_key).context("Failed to build weather service")?,
    );
    let session = DashboardSession::new(service);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let query = if args.is_empty() {
        config.weather.default_query.clone()
    } else {
        args.join(" ")
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    tracing::info!("Cloudburst started, fetching weather for '{}'", query);
    if let Err(e) = session.search(&query, &cancel).await {
        eprintln!("{}", e.user_message());
        return Err(e).context("Weather fetch failed");
    }

    let state = session.snapshot();
    let (Some(report), Some(risk), Some(view)) = (&state.report, &state.risk, &state.view) else {
        anyhow::bail!("No weather data available");
    };

    println!("Cloudburst - {}", state.location.name);
    println!("  Source: {}", state.source_label());
    println!(
        "  Conditions: {} ({}), {}",
        view.condition, view.description, view.location
    );
    if let (Some(temp), Some(feels), Some(humidity), Some(pressure)) =
        (view.temperature, view.feels_like, view.humidity, view.pressure)
    {
        println!("  Temperature: {}°C (feels like {}°C)", temp, feels);
        println!("  Humidity: {}%  Pressure: {} hPa", humidity, pressure);
    }
    println!(
        "  Wind: {} km/h {}  Rainfall: {} mm/h ({})",
        view.wind_speed_kmh,
        view.wind_direction,
        view.rainfall_mm_h,
        view.rainfall_intensity.label()
    );

    println!("\nCloud burst risk: {}/100 ({})", risk.score, risk.level);
    for factor in &risk.factors {
        println!("  - {}", factor);
    }
    for warning in risk.warnings.iter().flatten() {
        println!("  ! {}", warning);
    }

    if let Some(peak) = &state.forecast_peak {
        println!(
            "\nPeak forecast risk: {}/100 ({}) at {}",
            peak.assessment.score,
            peak.assessment.level,
            peak.time.format("%Y-%m-%d %H:%M UTC")
        );
    }
    if !state.outlook.is_empty() {
        println!("\nOutlook:");
        for day in &state.outlook {
            let label = if day.is_today {
                "Today".to_string()
            } else {
                day.time.format("%a").to_string()
            };
            println!(
                "  {:<5} {}°C ({}°/{}°) {} {} mm, {}% chance",
                label,
                day.temperature,
                day.temp_min,
                day.temp_max,
                day.description,
                day.rainfall_mm_h,
                day.precipitation_chance
            );
        }
    }

    if config.narrative.enabled {
        let narrative = NarrativeClient::from_config(build_client()?, &config.narrative);
        if narrative.is_configured() {
            println!("\n{}", narrative.insights(&report.observation, &state.location.name).await);
        }
    }

    Ok(())
}
