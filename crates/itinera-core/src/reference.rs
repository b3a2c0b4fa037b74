// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Itinera contributors

use crate::ItineraError;
use log::debug;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

/// Country preselected in the form.
pub const DEFAULT_COUNTRY: &str = "Portugal";

const BUNDLED_COUNTRIES: &str = include_str!("../data/countries.csv");
const BUNDLED_CITIES: &str = include_str!("../data/cities.csv");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Country {
    #[serde(rename = "country")]
    pub name: String,
    pub code: String,
}

// Extra columns (population, lat/lng, ...) in larger city tables are ignored.
#[derive(Debug, Clone, Deserialize)]
struct CityRow {
    city: String,
    country: String,
}

/// Country → ISO code table plus city → country table. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    countries: Vec<Country>,
    code_index: HashMap<String, usize>,
    cities_by_country: HashMap<String, Vec<String>>,
}

impl ReferenceData {
    /// The small table compiled into the binary.
    pub fn bundled() -> Self {
        Self::from_readers(BUNDLED_COUNTRIES.as_bytes(), BUNDLED_CITIES.as_bytes())
            .expect("Failed to parse bundled reference tables")
    }

    pub fn load(countries_csv: &Path, cities_csv: &Path) -> Result<Self, ItineraError> {
        let countries = std::fs::File::open(countries_csv)?;
        let cities = std::fs::File::open(cities_csv)?;
        let data = Self::from_readers(countries, cities)?;
        debug!(
            "Loaded reference tables — countries={} countries_csv={} cities_csv={}",
            data.countries.len(),
            countries_csv.display(),
            cities_csv.display()
        );
        Ok(data)
    }

    pub fn from_readers<C: Read, T: Read>(countries: C, cities: T) -> Result<Self, csv::Error> {
        let mut data = Self::default();

        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(countries);
        for row in rdr.deserialize::<Country>() {
            let country = row?;
            // First row wins for a repeated country name.
            if !data.code_index.contains_key(&country.name) {
                data.code_index
                    .insert(country.name.clone(), data.countries.len());
                data.countries.push(country);
            }
        }

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(cities);
        for row in rdr.deserialize::<CityRow>() {
            let row = row?;
            if seen.insert((row.country.clone(), row.city.clone())) {
                data.cities_by_country
                    .entry(row.country)
                    .or_default()
                    .push(row.city);
            }
        }

        Ok(data)
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn country_names(&self) -> Vec<String> {
        self.countries.iter().map(|c| c.name.clone()).collect()
    }

    /// Exact, case-sensitive lookup.
    pub fn country_code(&self, country: &str) -> Option<&str> {
        self.code_index
            .get(country)
            .map(|&i| self.countries[i].code.as_str())
    }

    pub fn contains_country(&self, country: &str) -> bool {
        self.code_index.contains_key(country)
    }

    /// Cities listed for `country`, in table order, without repeats.
    pub fn cities_in(&self, country: &str) -> &[String] {
        self.cities_by_country
            .get(country)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The form's preselected country, or the first in the table.
    pub fn default_country(&self) -> Option<&str> {
        if self.contains_country(DEFAULT_COUNTRY) {
            Some(DEFAULT_COUNTRY)
        } else {
            self.countries.first().map(|c| c.name.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_tables() {
        let data = ReferenceData::bundled();
        assert!(!data.countries().is_empty());
        assert_eq!(data.country_code("Portugal"), Some("PT"));
        assert_eq!(data.country_code("portugal"), None);
        assert_eq!(data.default_country(), Some("Portugal"));

        let cities = data.cities_in("Portugal");
        assert!(cities.iter().any(|c| c == "Lisbon"));
        assert!(cities.iter().any(|c| c == "Coimbra"));
        assert!(data.cities_in("Atlantis").is_empty());
    }

    #[test]
    fn test_city_scoping_and_dedup() {
        let countries = "country,code\nSpain,ES\nArgentina,AR\nSpain,XX\n";
        let cities = "city,country,population\nCordoba,Spain,320000\nCordoba,Argentina,1300000\nMadrid,Spain,3200000\nCordoba,Spain,320000\n";
        let data = ReferenceData::from_readers(countries.as_bytes(), cities.as_bytes()).unwrap();

        assert_eq!(data.country_names(), vec!["Spain", "Argentina"]);
        assert_eq!(data.country_code("Spain"), Some("ES"));
        assert_eq!(data.cities_in("Spain"), ["Cordoba", "Madrid"]);
        assert_eq!(data.cities_in("Argentina"), ["Cordoba"]);
    }

    #[test]
    fn test_default_country_falls_back_to_first() {
        let data =
            ReferenceData::from_readers("country,code\nChile,CL\n".as_bytes(), "city,country\n".as_bytes())
                .unwrap();
        assert_eq!(data.default_country(), Some("Chile"));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let countries = dir.path().join("countries.csv");
        let cities = dir.path().join("cities.csv");
        std::fs::write(&countries, "country,code\nJapan,JP\n").unwrap();
        std::fs::write(&cities, "city,country\nKyoto,Japan\n").unwrap();

        let data = ReferenceData::load(&countries, &cities).unwrap();
        assert_eq!(data.country_code("Japan"), Some("JP"));
        assert_eq!(data.cities_in("Japan"), ["Kyoto"]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        assert!(matches!(
            ReferenceData::load(&missing, &missing),
            Err(ItineraError::Io(_))
        ));
    }
}
