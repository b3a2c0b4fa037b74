use crate::itinerary::{Coordinates, Location};
use crate::ItineraError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity of a request: the four form values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub country: String,
    pub first_city: String,
    pub last_city: String,
    pub num_cities: u32,
}

impl CacheKey {
    pub fn new(country: &str, first_city: &str, last_city: &str, num_cities: u32) -> Self {
        Self {
            country: country.to_string(),
            first_city: first_city.to_string(),
            last_city: last_city.to_string(),
            num_cities,
        }
    }

    /// `{country}_{first}_{last}_{n}.csv`. Path separators inside a field are
    /// replaced so every key names a file directly inside the cache directory.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.csv",
            sanitize(&self.country),
            sanitize(&self.first_city),
            sanitize(&self.last_city),
            self.num_cities
        )
    }
}

fn sanitize(field: &str) -> String {
    field.replace(['/', '\\'], "-")
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRow {
    name: String,
    /// JSON array literal, e.g. `[38.7223,-9.1393]`.
    coordinates: String,
}

/// One CSV file per request key. Entries are never updated or evicted.
#[derive(Debug, Clone)]
pub struct ItineraryCache {
    dir: PathBuf,
}

impl ItineraryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).exists()
    }

    /// `Ok(None)` on a miss. A file that exists but cannot be read is an error.
    pub fn load(&self, key: &CacheKey) -> Result<Option<Vec<Location>>, ItineraError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let mut rdr = csv::Reader::from_path(&path)?;
        let mut locations = Vec::new();
        for row in rdr.deserialize::<CacheRow>() {
            let row = row?;
            let coordinates: Coordinates =
                serde_json::from_str(&row.coordinates).map_err(|source| {
                    ItineraError::CachedCoordinates {
                        name: row.name.clone(),
                        source,
                    }
                })?;
            locations.push(Location::new(row.name, coordinates));
        }

        debug!(
            "Read cached itinerary — path={} stops={}",
            path.display(),
            locations.len()
        );
        Ok(Some(locations))
    }

    /// Writes the entry unless `locations` is empty. Returns whether a file was written.
    pub fn store(&self, key: &CacheKey, locations: &[Location]) -> Result<bool, ItineraError> {
        if locations.is_empty() {
            return Ok(false);
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let mut wtr = csv::Writer::from_path(&path)?;
        for location in locations {
            let coordinates = serde_json::to_string(&location.coordinates).map_err(|source| {
                ItineraError::CachedCoordinates {
                    name: location.name.clone(),
                    source,
                }
            })?;
            wtr.serialize(CacheRow {
                name: location.name.clone(),
                coordinates,
            })?;
        }
        wtr.flush()?;

        debug!(
            "Wrote itinerary cache — path={} stops={}",
            path.display(),
            locations.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn portugal() -> Vec<Location> {
        vec![
            Location::new("Lisbon", Coordinates::new(38.722252, -9.139337)),
            Location::new("Coimbra", Coordinates::new(40.203314, -8.410257)),
            Location::new("Porto", Coordinates::new(41.157944, -8.629105)),
        ]
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = CacheKey::new("Portugal", "Lisbon", "Porto", 3);
        let b = CacheKey::new("Portugal", "Lisbon", "Porto", 3);
        assert_eq!(a, b);
        assert_eq!(a.file_name(), "Portugal_Lisbon_Porto_3.csv");
        assert_ne!(
            a.file_name(),
            CacheKey::new("Portugal", "Lisbon", "Porto", 4).file_name()
        );
    }

    #[test]
    fn test_key_with_path_separator() {
        let key = CacheKey::new("Bosnia/Herzegovina", "Sarajevo", "Mostar", 5);
        assert_eq!(key.file_name(), "Bosnia-Herzegovina_Sarajevo_Mostar_5.csv");
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let cache = ItineraryCache::new(dir.path());
        let key = CacheKey::new("Portugal", "Lisbon", "Porto", 3);

        assert_eq!(cache.load(&key).unwrap(), None);
        assert!(cache.store(&key, &portugal()).unwrap());
        assert!(cache.contains(&key));
        assert_eq!(cache.load(&key).unwrap(), Some(portugal()));
    }

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let cache = ItineraryCache::new(dir.path());
        let key = CacheKey::new("Portugal", "Lisbon", "Porto", 3);
        cache.store(&key, &portugal()[..1]).unwrap();

        let content = std::fs::read_to_string(cache.path_for(&key)).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("name,coordinates"));
        assert_eq!(lines.next(), Some("Lisbon,\"[38.722252,-9.139337]\""));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_itinerary_is_not_written() {
        let dir = tempdir().unwrap();
        let cache = ItineraryCache::new(dir.path().join("nested"));
        let key = CacheKey::new("Portugal", "Lisbon", "Porto", 3);

        assert!(!cache.store(&key, &[]).unwrap());
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_reads_python_style_literal() {
        let dir = tempdir().unwrap();
        let cache = ItineraryCache::new(dir.path());
        let key = CacheKey::new("Portugal", "Lisbon", "Faro", 3);
        std::fs::write(
            cache.path_for(&key),
            "name,coordinates\nLisbon,\"[38.7223, -9.1393]\"\nFaro,\"[37.0194, -7.9322]\"\n",
        )
        .unwrap();

        let locations = cache.load(&key).unwrap().unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[1].name, "Faro");
        assert_eq!(locations[1].coordinates, Coordinates::new(37.0194, -7.9322));
    }

    #[test]
    fn test_malformed_coordinates() {
        let dir = tempdir().unwrap();
        let cache = ItineraryCache::new(dir.path());
        let key = CacheKey::new("Portugal", "Lisbon", "Faro", 3);
        std::fs::write(cache.path_for(&key), "name,coordinates\nLisbon,somewhere\n").unwrap();

        let err = cache.load(&key).unwrap_err();
        assert!(matches!(err, ItineraError::CachedCoordinates { ref name, .. } if name == "Lisbon"));
    }
}
