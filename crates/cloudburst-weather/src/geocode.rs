//! Forward and reverse geocoding.
//!
//! Forward lookups never fail: remote geocoding, the built-in gazetteer,
//! literal coordinates and a fixed default are tried in turn. Reverse lookups
//! fall back to the nearest gazetteer entry.

use cloudburst_core::WeatherError;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::AcquisitionCache;
use crate::gazetteer;
use crate::http::{endpoint, get_json};
use crate::key_store::ApiKey;
use crate::types::Location;

const PROVIDER: &str = "OpenWeatherMap geocoding";
const DEFAULT_COUNTRY: &str = "India";

#[derive(Debug, Deserialize)]
struct GeoResult {
    name: String,
    lat: f64,
    lon: f64,
    country: Option<String>,
}

impl GeoResult {
    fn display_name(&self) -> String {
        let country = self
            .country
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COUNTRY);
        format!("{}, {}", self.name, country)
    }
}

pub struct Geocoder {
    client: Client,
    base_url: String,
    cache: Arc<AcquisitionCache>,
    api_key: Arc<ApiKey>,
    timeout: Duration,
    reverse_timeout: Duration,
}

impl Geocoder {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        cache: Arc<AcquisitionCache>,
        api_key: Arc<ApiKey>,
        timeout: Duration,
        reverse_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            cache,
            api_key,
            timeout,
            reverse_timeout,
        }
    }

    /// Resolve a free-text place name or `"lat,lng"` string.
    pub async fn resolve(&self, query: &str, cancel: &CancellationToken) -> Arc<Location> {
        let cache_key = AcquisitionCache::geocode_key(query);
        if let Some(hit) = self.cache.location(&cache_key) {
            return hit;
        }

        if let Some(key) = self.api_key.get() {
            match self.forward(query, &key, cancel).await {
                Ok(location) => {
                    let location = Arc::new(location);
                    self.cache.put_location(cache_key, location.clone());
                    tracing::info!("Geocoded '{}' to {}", query, location.name);
                    return location;
                }
                Err(e) => tracing::warn!("OpenWeatherMap geocoding failed: {}", e),
            }
        }

        if let Some(location) = gazetteer::lookup(query) {
            tracing::debug!("Matched '{}' to known place {}", query, location.name);
            return Arc::new(location);
        }

        if let Some((lat, lng)) = parse_coordinates(query) {
            return Arc::new(Location::new(lat, lng, query));
        }

        tracing::info!("Could not resolve '{}', using default location", query);
        Arc::new(gazetteer::default_location())
    }

    async fn forward(
        &self,
        query: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Location, WeatherError> {
        let url = endpoint(
            &self.base_url,
            "direct",
            &[
                ("q", query.to_string()),
                ("limit", "1".to_string()),
                ("appid", key.to_string()),
            ],
        )?;

        let results: Vec<GeoResult> =
            get_json(&self.client, url, self.timeout, cancel, PROVIDER).await?;
        let first = results
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Geocode(format!("no results for '{}'", query)))?;

        Ok(Location::new(first.lat, first.lon, first.display_name()))
    }

    /// Human-readable name for a coordinate pair.
    pub async fn reverse(&self, lat: f64, lng: f64, cancel: &CancellationToken) -> String {
        if let Some(key) = self.api_key.get() {
            match self.reverse_remote(lat, lng, &key, cancel).await {
                Ok(name) => return name,
                Err(e) => tracing::warn!("Reverse geocoding failed: {}", e),
            }
        }

        gazetteer::nearest_name(lat, lng).to_string()
    }

    async fn reverse_remote(
        &self,
        lat: f64,
        lng: f64,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<String, WeatherError> {
        let url = endpoint(
            &self.base_url,
            "reverse",
            &[
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("limit", "1".to_string()),
                ("appid", key.to_string()),
            ],
        )?;

        let results: Vec<GeoResult> =
            get_json(&self.client, url, self.reverse_timeout, cancel, PROVIDER).await?;
        results
            .first()
            .map(GeoResult::display_name)
            .ok_or_else(|| WeatherError::Geocode(format!("no place near {},{}", lat, lng)))
    }
}

/// Find the first `"<number>,<number>"` pair in `query`.
///
/// Numbers are an optional `-`, digits, then an optional `.` and more digits.
/// Whitespace is allowed after the comma.
pub fn parse_coordinates(query: &str) -> Option<(f64, f64)> {
    query.char_indices().find_map(|(start, _)| {
        let (lat, rest) = scan_number(&query[start..])?;
        let rest = rest.strip_prefix(',')?.trim_start();
        let (lng, _) = scan_number(rest)?;
        Some((lat.parse().ok()?, lng.parse().ok()?))
    })
}

/// Split a leading `-?\d+\.?\d*` off `s`.
fn scan_number(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end += 1;
    }
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    Some(s.split_at(end))
}
