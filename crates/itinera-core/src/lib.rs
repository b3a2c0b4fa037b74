// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Itinera contributors

pub mod cache;
pub mod config;
pub mod country_info;
pub mod geocode;
pub mod itinerary;
pub mod map;
pub mod reference;
pub mod session;

#[cfg(test)]
mod test_support;

use itinera_llm::GenerationError;
use std::path::PathBuf;
use thiserror::Error;

pub use geocode::GeocodeError;
pub use itinerary::{Coordinates, Itinerary, Location, Planner, TripRequest};

/// Smallest trip the form accepts.
pub const MIN_CITIES: u32 = 3;

#[derive(Error, Debug)]
pub enum ItineraError {
    #[error("Invalid country name: {0}")]
    InvalidCountry(String),
    #[error("A trip needs at least {min} cities, got {got}")]
    TripTooShort { got: u32, min: u32 },
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error("Itinerary generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("Malformed coordinates for '{name}' in cache file: {source}")]
    CachedCoordinates {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-user configuration directory (settings, GUI log, exported maps).
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "itinera", "itinera")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
