//! Short-lived in-memory memoization of geocode and weather lookups.
//!
//! Entries are only checked for freshness when read; nothing runs in the
//! background. Concurrent misses on the same key are last-writer-wins.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::{Location, WeatherBundle};

/// Default freshness window
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub enum CachedValue {
    Location(Arc<Location>),
    Weather(Arc<WeatherBundle>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

#[derive(Debug)]
pub struct AcquisitionCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Default for AcquisitionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl AcquisitionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Key for a forward-geocode query
    pub fn geocode_key(query: &str) -> String {
        format!("geocode_{}", query.to_lowercase())
    }

    /// Key for a weather lookup at a coordinate pair
    pub fn weather_key(lat: f64, lng: f64) -> String {
        format!("weather_{}_{}", lat, lng)
    }

    pub fn location(&self, key: &str) -> Option<Arc<Location>> {
        match self.get_at(key, Instant::now())? {
            CachedValue::Location(location) => Some(location),
            CachedValue::Weather(_) => None,
        }
    }

    pub fn put_location(&self, key: String, location: Arc<Location>) {
        self.put(key, CachedValue::Location(location));
    }

    pub fn weather(&self, key: &str) -> Option<Arc<WeatherBundle>> {
        match self.get_at(key, Instant::now())? {
            CachedValue::Weather(bundle) => Some(bundle),
            CachedValue::Location(_) => None,
        }
    }

    pub fn put_weather(&self, key: String, bundle: Arc<WeatherBundle>) {
        self.put(key, CachedValue::Weather(bundle));
    }

    /// Drop every stale entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.ttl));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn put(&self, key: String, value: CachedValue) {
        tracing::trace!(key = %key, "cache store");
        self.entries.write().insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<CachedValue> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.is_fresh(now, self.ttl) {
            tracing::trace!(key = %key, "cache hit");
            Some(entry.value.clone())
        } else {
            tracing::trace!(key = %key, "cache entry expired");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delhi() -> Arc<Location> {
        Arc::new(Location::new(28.6139, 77.2090, "New Delhi, India"))
    }

    #[test]
    fn test_keys() {
        assert_eq!(AcquisitionCache::geocode_key("Mumbai"), "geocode_mumbai");
        assert_eq!(
            AcquisitionCache::weather_key(19.076, 72.8777),
            "weather_19.076_72.8777"
        );
    }

    #[test]
    fn test_hit_returns_same_allocation() {
        let cache = AcquisitionCache::default();
        let location = delhi();
        cache.put_location("geocode_delhi".into(), location.clone());

        let hit = cache.location("geocode_delhi").unwrap();
        assert!(Arc::ptr_eq(&hit, &location));
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache = AcquisitionCache::default();
        assert!(cache.location("geocode_nowhere").is_none());
    }

    #[test]
    fn test_entry_stale_after_ttl() {
        let cache = AcquisitionCache::new(Duration::from_secs(300));
        cache.put_location("geocode_delhi".into(), delhi());

        let later = Instant::now() + Duration::from_secs(301);
        assert!(cache.get_at("geocode_delhi", later).is_none());
        assert!(cache.get_at("geocode_delhi", Instant::now()).is_some());
    }

    #[test]
    fn test_wrong_kind_is_a_miss() {
        let cache = AcquisitionCache::default();
        cache.put_location("weather_1_2".into(), delhi());
        assert!(cache.weather("weather_1_2").is_none());
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let cache = AcquisitionCache::default();
        cache.put_location("k".into(), delhi());
        let mumbai = Arc::new(Location::new(19.076, 72.8777, "Mumbai, Maharashtra"));
        cache.put_location("k".into(), mumbai.clone());

        assert!(Arc::ptr_eq(&cache.location("k").unwrap(), &mumbai));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let cache = AcquisitionCache::new(Duration::ZERO);
        cache.put_location("a".into(), delhi());
        cache.put_location("b".into(), delhi());

        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }
}
