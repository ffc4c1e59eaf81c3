//! Weather provider adapters.
//!
//! Every adapter turns its provider's response into a [`WeatherBundle`] in
//! canonical units (°C, %, hPa, km/h, m, mm/h).
//!
//! [`WeatherBundle`]: crate::types::WeatherBundle

pub mod open_meteo;
pub mod openweather;

pub use open_meteo::OpenMeteoClient;
pub use openweather::OpenWeatherClient;
