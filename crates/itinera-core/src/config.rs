// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Itinera contributors

use crate::cache::ItineraryCache;
use crate::country_info::RestCountriesClient;
use crate::geocode::{GeocodeError, PositionstackClient};
use crate::reference::ReferenceData;
use crate::ItineraError;
use anyhow::{Context, Result};
use itinera_llm::{GenerationError, OpenAiClient, DEFAULT_MODEL};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_OPENAI_KEY: &str = "OPENAI_KEY";
pub const ENV_POSITIONSTACK_KEY: &str = "POSITIONSTACK_KEY";
pub const ENV_CACHE_DIR: &str = "ITINERA_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_key: String,
    #[serde(default)]
    pub positionstack_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Where itinerary CSVs live. Defaults to the working directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Full reference tables; both must be set, otherwise the bundled ones are used.
    #[serde(default)]
    pub countries_csv: Option<PathBuf>,
    #[serde(default)]
    pub cities_csv: Option<PathBuf>,
    /// Unset means outbound requests never time out.
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_key: String::new(),
            positionstack_key: String::new(),
            model: default_model(),
            cache_dir: None,
            countries_csv: None,
            cities_csv: None,
            http_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Settings file, then environment.
    pub fn load_default() -> Result<Self> {
        let mut settings = SettingsManager::new().load()?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Non-empty environment values replace the file's.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_OPENAI_KEY) {
            self.openai_key = v;
        }
        if let Some(v) = get(ENV_POSITIONSTACK_KEY) {
            self.positionstack_key = v;
        }
        if let Some(v) = get(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(v));
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    pub fn cache(&self) -> ItineraryCache {
        ItineraryCache::new(
            self.cache_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        )
    }

    pub fn reference_data(&self) -> Result<ReferenceData, ItineraError> {
        match (&self.countries_csv, &self.cities_csv) {
            (Some(countries), Some(cities)) => ReferenceData::load(countries, cities),
            (None, None) => Ok(ReferenceData::bundled()),
            (countries, cities) => {
                warn!(
                    "Reference table path ignored; countries_csv and cities_csv must both be set — countries_csv={:?} cities_csv={:?}",
                    countries, cities
                );
                Ok(ReferenceData::bundled())
            }
        }
    }

    pub fn completion_client(&self) -> Result<OpenAiClient, GenerationError> {
        OpenAiClient::new(&self.openai_key, self.timeout())
    }

    pub fn geocoder(&self) -> Result<PositionstackClient, GeocodeError> {
        PositionstackClient::new(&self.positionstack_key, self.timeout())
    }

    pub fn country_info(&self) -> RestCountriesClient {
        RestCountriesClient::new(self.timeout())
    }
}

#[derive(Debug, Clone)]
pub struct SettingsManager {
    config_path: PathBuf,
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsManager {
    pub fn new() -> Self {
        Self::at(crate::get_config_root().join("settings.json"))
    }

    pub fn at(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<Settings> {
        if !self.config_path.exists() {
            return Ok(Settings::default());
        }

        let content =
            fs::read_to_string(&self.config_path).context("Failed to read settings.json")?;

        serde_json::from_str(&content).context("Failed to parse settings.json")
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

        fs::write(&self.config_path, content).context("Failed to write settings.json")
    }
}
