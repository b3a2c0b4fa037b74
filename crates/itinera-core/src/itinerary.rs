// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Itinera contributors

use crate::cache::{CacheKey, ItineraryCache};
use crate::geocode::{CoordinateResolver, Geocoder};
use crate::reference::ReferenceData;
use crate::{ItineraError, MIN_CITIES};
use itinera_llm::{ItineraryPrompt, TextGenerator};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair. Serialised as `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Arithmetic mean of each axis; `None` for an empty slice.
    pub fn average(points: &[Coordinates]) -> Option<Coordinates> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (lat, lon) = points
            .iter()
            .fold((0.0, 0.0), |(lat, lon), p| (lat + p.lat, lon + p.lon));
        Some(Coordinates::new(lat / n, lon / n))
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.lat, c.lon]
    }
}

/// A named stop. Equality compares the name and both coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub coordinates: Coordinates,
}

impl Location {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRequest {
    pub country: String,
    pub first_city: String,
    pub last_city: String,
    pub num_cities: u32,
}

impl TripRequest {
    pub fn new(
        country: impl Into<String>,
        first_city: impl Into<String>,
        last_city: impl Into<String>,
        num_cities: u32,
    ) -> Result<Self, ItineraError> {
        if num_cities < MIN_CITIES {
            return Err(ItineraError::TripTooShort {
                got: num_cities,
                min: MIN_CITIES,
            });
        }
        Ok(Self {
            country: country.into(),
            first_city: first_city.into(),
            last_city: last_city.into(),
            num_cities,
        })
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            &self.country,
            &self.first_city,
            &self.last_city,
            self.num_cities,
        )
    }

    pub fn prompt(&self) -> ItineraryPrompt {
        ItineraryPrompt::new(
            &self.country,
            &self.first_city,
            &self.last_city,
            self.num_cities,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItinerarySource {
    Cache,
    Generated,
}

/// Resolved stops for one request.
///
/// May hold fewer stops than requested when some cities failed to geocode;
/// zero stops is the "no itinerary" outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    pub key: CacheKey,
    pub locations: Vec<Location>,
    /// Coordinates in resolution order; the map center is derived from these,
    /// not from any later display reordering.
    pub coordinates: Vec<Coordinates>,
    pub source: ItinerarySource,
}

impl Itinerary {
    pub fn from_locations(key: CacheKey, locations: Vec<Location>, source: ItinerarySource) -> Self {
        let coordinates = locations.iter().map(|l| l.coordinates).collect();
        Self {
            key,
            locations,
            coordinates,
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn center(&self) -> Option<Coordinates> {
        Coordinates::average(&self.coordinates)
    }
}

/// Moves the stop at `from` to index `to`, shifting the others.
/// Returns `None` when either index is out of range.
pub fn move_stop(stops: &[Location], from: usize, to: usize) -> Option<Vec<Location>> {
    if from >= stops.len() || to >= stops.len() {
        return None;
    }
    let mut reordered = stops.to_vec();
    let stop = reordered.remove(from);
    reordered.insert(to, stop);
    Some(reordered)
}

/// Resolves each name in order, dropping the ones that fail.
///
/// Every failure (unknown country included) is logged and skipped; nothing is
/// retried. Returns the surviving stops and their coordinates.
pub fn resolve_cities(
    resolver: &CoordinateResolver<'_>,
    country: &str,
    names: &[String],
) -> (Vec<Location>, Vec<Coordinates>) {
    let mut locations = Vec::with_capacity(names.len());
    let mut coordinates = Vec::with_capacity(names.len());

    for name in names {
        match resolver.resolve(country, name) {
            Ok(coords) => {
                info!("  > {} ({}, {})", name, coords.lat, coords.lon);
                coordinates.push(coords);
                locations.push(Location::new(name.clone(), coords));
            }
            Err(e) => {
                warn!("Dropping city — city={} country={} error={}", name, country, e);
            }
        }
    }

    (locations, coordinates)
}

/// Cache lookup, then generate → parse → resolve → persist on a miss.
pub struct Planner<'a> {
    reference: &'a ReferenceData,
    generator: &'a dyn TextGenerator,
    geocoder: &'a dyn Geocoder,
    cache: &'a ItineraryCache,
    model: String,
}

impl<'a> Planner<'a> {
    pub fn new(
        reference: &'a ReferenceData,
        generator: &'a dyn TextGenerator,
        geocoder: &'a dyn Geocoder,
        cache: &'a ItineraryCache,
        model: impl Into<String>,
    ) -> Self {
        Self {
            reference,
            generator,
            geocoder,
            cache,
            model: model.into(),
        }
    }

    /// Generation failures propagate; per-city geocoding failures do not.
    pub fn plan(&self, request: &TripRequest) -> Result<Itinerary, ItineraError> {
        let key = request.cache_key();

        if let Some(locations) = self.cache.load(&key)? {
            info!(
                "Itinerary cache hit — key={} stops={}",
                key.file_name(),
                locations.len()
            );
            return Ok(Itinerary::from_locations(
                key,
                locations,
                ItinerarySource::Cache,
            ));
        }

        info!("Will generate new itinerary — key={}", key.file_name());
        let list =
            itinera_llm::generate_city_list(self.generator, &self.model, &request.prompt())?;
        info!("Parsed city list — cities={:?}", list.cities);

        let resolver = CoordinateResolver::new(self.reference, self.geocoder);
        let (locations, coordinates) = resolve_cities(&resolver, &request.country, &list.cities);

        if locations.is_empty() {
            info!(
                "No city could be resolved; nothing cached — key={}",
                key.file_name()
            );
        } else if let Err(e) = self.cache.store(&key, &locations) {
            warn!(
                "Could not write itinerary cache — key={} error={}",
                key.file_name(),
                e
            );
        }

        Ok(Itinerary {
            key,
            locations,
            coordinates,
            source: ItinerarySource::Generated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(names: &[&str]) -> Vec<Location> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Location::new(*n, Coordinates::new(i as f64, -(i as f64))))
            .collect()
    }

    fn names(stops: &[Location]) -> Vec<&str> {
        stops.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_trip_minimum_length() {
        assert!(TripRequest::new("Portugal", "Lisbon", "Porto", 3).is_ok());
        let err = TripRequest::new("Portugal", "Lisbon", "Porto", 2).unwrap_err();
        assert!(matches!(err, ItineraError::TripTooShort { got: 2, min: 3 }));
    }

    #[test]
    fn test_average_center() {
        let points = [
            Coordinates::new(38.0, -9.0),
            Coordinates::new(40.0, -8.0),
            Coordinates::new(42.0, -7.0),
        ];
        assert_eq!(Coordinates::average(&points), Some(Coordinates::new(40.0, -8.0)));
        assert_eq!(Coordinates::average(&[]), None);
    }

    #[test]
    fn test_coordinates_serialise_as_pair() {
        let c = Coordinates::new(41.1579, -8.6291);
        let text = serde_json::to_string(&c).unwrap();
        assert_eq!(text, "[41.1579,-8.6291]");
        assert_eq!(serde_json::from_str::<Coordinates>(&text).unwrap(), c);
    }

    #[test]
    fn test_move_stop() {
        let original = stops(&["Lisbon", "Coimbra", "Porto", "Braga"]);

        let moved = move_stop(&original, 3, 0).unwrap();
        assert_eq!(names(&moved), ["Braga", "Lisbon", "Coimbra", "Porto"]);

        let moved = move_stop(&original, 0, 2).unwrap();
        assert_eq!(names(&moved), ["Coimbra", "Porto", "Lisbon", "Braga"]);

        assert_eq!(move_stop(&original, 1, 1).unwrap(), original);
        assert!(move_stop(&original, 4, 0).is_none());
        assert!(move_stop(&original, 0, 4).is_none());
    }

    #[test]
    fn test_center_ignores_display_reordering() {
        let key = CacheKey::new("Portugal", "Lisbon", "Porto", 3);
        let mut itinerary = Itinerary::from_locations(
            key,
            stops(&["Lisbon", "Coimbra", "Porto"]),
            ItinerarySource::Generated,
        );
        let before = itinerary.center();
        itinerary.locations = move_stop(&itinerary.locations, 2, 0).unwrap();
        assert_eq!(itinerary.center(), before);
    }
}
