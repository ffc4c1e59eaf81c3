//! Built-in list of known places used when no geocoding service is available.

use crate::types::Location;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Fallback when nothing else resolves
pub const DEFAULT_LOCATION: (f64, f64, &str) = (28.6139, 77.2090, "New Delhi, India");

struct Place {
    key: &'static str,
    lat: f64,
    lng: f64,
    name: &'static str,
}

// Match order matters: the first hit wins.
const PLACES: &[Place] = &[
    Place { key: "mumbai", lat: 19.0760, lng: 72.8777, name: "Mumbai, Maharashtra" },
    Place { key: "delhi", lat: 28.6139, lng: 77.2090, name: "New Delhi, Delhi" },
    Place { key: "bangalore", lat: 12.9716, lng: 77.5946, name: "Bangalore, Karnataka" },
    Place { key: "chennai", lat: 13.0827, lng: 80.2707, name: "Chennai, Tamil Nadu" },
    Place { key: "kolkata", lat: 22.5726, lng: 88.3639, name: "Kolkata, West Bengal" },
    Place { key: "hyderabad", lat: 17.3850, lng: 78.4867, name: "Hyderabad, Telangana" },
    Place { key: "pune", lat: 18.5204, lng: 73.8567, name: "Pune, Maharashtra" },
    Place { key: "ahmedabad", lat: 23.0225, lng: 72.5714, name: "Ahmedabad, Gujarat" },
    Place { key: "surat", lat: 21.1702, lng: 72.8311, name: "Surat, Gujarat" },
    Place { key: "jaipur", lat: 26.9124, lng: 75.7873, name: "Jaipur, Rajasthan" },
];

impl Place {
    fn location(&self) -> Location {
        Location::new(self.lat, self.lng, self.name)
    }
}

pub fn default_location() -> Location {
    let (lat, lng, name) = DEFAULT_LOCATION;
    Location::new(lat, lng, name)
}

/// Lowercase ASCII letters only; everything else is dropped.
fn normalize(query: &str) -> String {
    query
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Fuzzy lookup: a place matches when its key is contained in the normalized
/// query or the normalized query is contained in its key.
///
/// A query with no letters at all never matches, so coordinate strings fall
/// through to the coordinate parser.
pub fn lookup(query: &str) -> Option<Location> {
    let needle = normalize(query);
    if needle.is_empty() {
        return None;
    }

    PLACES
        .iter()
        .find(|place| place.key.contains(needle.as_str()) || needle.contains(place.key))
        .map(Place::location)
}

/// Great-circle distance in kilometres (haversine).
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Name of the known place closest to the given coordinates.
pub fn nearest_name(lat: f64, lng: f64) -> &'static str {
    let mut best = &PLACES[0];
    let mut best_distance = haversine_km(lat, lng, best.lat, best.lng);

    for place in &PLACES[1..] {
        let distance = haversine_km(lat, lng, place.lat, place.lng);
        if distance < best_distance {
            best_distance = distance;
            best = place;
        }
    }

    best.name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_at_least_ten_places() {
        assert!(PLACES.len() >= 10);
    }

    #[test]
    fn test_lookup_exact_key() {
        let loc = lookup("Mumbai").unwrap();
        assert_eq!(loc.name, "Mumbai, Maharashtra");
        assert_eq!(loc.lat, 19.0760);
    }

    #[test]
    fn test_lookup_key_inside_query() {
        let loc = lookup("New Delhi, India").unwrap();
        assert_eq!(loc.name, "New Delhi, Delhi");
    }

    #[test]
    fn test_lookup_query_inside_key() {
        let loc = lookup("hyder").unwrap();
        assert_eq!(loc.name, "Hyderabad, Telangana");
    }

    #[test]
    fn test_lookup_first_match_wins() {
        // "pune" and "surat" both present: Pune comes first in the list
        let loc = lookup("surat to pune").unwrap();
        assert_eq!(loc.name, "Pune, Maharashtra");
    }

    #[test]
    fn test_lookup_ignores_digits_and_punctuation() {
        assert!(lookup("19.07, 72.87").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("Reykjavik").is_none());
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert!(haversine_km(19.0, 72.0, 19.0, 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_mumbai_delhi() {
        let d = haversine_km(19.0760, 72.8777, 28.6139, 77.2090);
        // roughly 1150 km
        assert!((1100.0..1200.0).contains(&d), "got {}", d);
    }

    #[test]
    fn test_nearest_name() {
        assert_eq!(nearest_name(19.1, 72.9), "Mumbai, Maharashtra");
        assert_eq!(nearest_name(26.9, 75.8), "Jaipur, Rajasthan");
        // Goa is closest to Pune among the known places
        assert_eq!(nearest_name(15.4909, 73.8278), "Pune, Maharashtra");
    }
}
