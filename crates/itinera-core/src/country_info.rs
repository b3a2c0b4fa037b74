use log::debug;
use serde_json::Value;
use std::time::Duration;

pub const REST_COUNTRIES_URL: &str = "https://restcountries.com/v3.1/name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub symbol: String,
}

/// Country panel contents. The panel exists only if the official name could
/// be read; every other field is independently optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryInfo {
    pub official_name: String,
    pub capital: Option<String>,
    /// `None` if any listed currency lacks a name or symbol.
    pub currencies: Option<Vec<Currency>>,
    pub flag_png: Option<String>,
}

impl CountryInfo {
    /// Reads the first element of a restcountries v3.1 response array.
    pub fn from_response(body: &Value) -> Option<Self> {
        let country = body.as_array()?.first()?;
        let official_name = official_name(country)?;
        Some(Self {
            official_name,
            capital: capital(country),
            currencies: currencies(country),
            flag_png: flag_png(country),
        })
    }
}

fn official_name(country: &Value) -> Option<String> {
    country
        .get("name")?
        .get("official")?
        .as_str()
        .map(str::to_string)
}

fn capital(country: &Value) -> Option<String> {
    country
        .get("capital")?
        .as_array()?
        .first()?
        .as_str()
        .map(str::to_string)
}

fn currencies(country: &Value) -> Option<Vec<Currency>> {
    country
        .get("currencies")?
        .as_object()?
        .iter()
        .map(|(code, entry)| {
            Some(Currency {
                code: code.clone(),
                name: entry.get("name")?.as_str()?.to_string(),
                symbol: entry.get("symbol")?.as_str()?.to_string(),
            })
        })
        .collect()
}

fn flag_png(country: &Value) -> Option<String> {
    country
        .get("flags")?
        .get("png")?
        .as_str()
        .map(str::to_string)
}

/// Source of country metadata. Lookups never fail loudly.
pub trait CountryInfoSource {
    fn lookup(&self, country: &str) -> Option<CountryInfo>;
}

/// Public restcountries.com API, exact-name lookup.
pub struct RestCountriesClient {
    http: Option<reqwest::blocking::Client>,
    base_url: String,
}

impl RestCountriesClient {
    pub fn new(timeout: Option<Duration>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| debug!("Country info client unavailable — error={}", e))
            .ok();
        Self {
            http,
            base_url: REST_COUNTRIES_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn url_for(&self, country: &str) -> Option<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).ok()?;
        url.path_segments_mut().ok()?.push(country);
        url.query_pairs_mut().append_pair("fullText", "true");
        Some(url)
    }

    fn fetch(&self, country: &str) -> Result<Value, String> {
        let http = self.http.as_ref().ok_or("no HTTP client")?;
        let url = self.url_for(country).ok_or("bad base URL")?;
        http.get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<Value>())
            .map_err(|e| e.to_string())
    }
}

impl CountryInfoSource for RestCountriesClient {
    fn lookup(&self, country: &str) -> Option<CountryInfo> {
        match self.fetch(country) {
            Ok(body) => {
                let info = CountryInfo::from_response(&body);
                if info.is_none() {
                    debug!("Country info response unusable — country={}", country);
                }
                info
            }
            Err(e) => {
                debug!("Country info lookup failed — country={} error={}", country, e);
                None
            }
        }
    }
}
