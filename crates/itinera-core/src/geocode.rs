use crate::itinerary::Coordinates;
use crate::reference::ReferenceData;
use crate::ItineraError;
use log::debug;
use std::time::Duration;
use thiserror::Error;

pub const POSITIONSTACK_URL: &str = "http://api.positionstack.com/v1/forward";

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("no geocoding access key configured")]
    MissingKey,
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no geocoding match for '{query}' in {country_code}")]
    NoMatch { query: String, country_code: String },
}

/// Forward geocoding: free-text place name within one country → best match.
pub trait Geocoder {
    fn forward(&self, query: &str, country_code: &str) -> Result<Coordinates, GeocodeError>;
}

/// positionstack `/v1/forward`, one result per query.
pub struct PositionstackClient {
    http: reqwest::blocking::Client,
    access_key: String,
    endpoint: String,
}

impl PositionstackClient {
    pub fn new(access_key: &str, timeout: Option<Duration>) -> Result<Self, GeocodeError> {
        if access_key.trim().is_empty() {
            return Err(GeocodeError::MissingKey);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            access_key: access_key.trim().to_string(),
            endpoint: POSITIONSTACK_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Geocoder for PositionstackClient {
    fn forward(&self, query: &str, country_code: &str) -> Result<Coordinates, GeocodeError> {
        let body: serde_json::Value = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("access_key", self.access_key.as_str()),
                ("query", query),
                ("country", country_code),
                ("limit", "1"),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        first_match(&body).ok_or_else(|| GeocodeError::NoMatch {
            query: query.to_string(),
            country_code: country_code.to_string(),
        })
    }
}

/// First `data` entry carrying numeric `latitude`/`longitude`.
///
/// No disambiguation: the service's ranking is taken as-is.
pub fn first_match(body: &serde_json::Value) -> Option<Coordinates> {
    let first = body.get("data")?.as_array()?.first()?;
    let lat = first.get("latitude")?.as_f64()?;
    let lon = first.get("longitude")?.as_f64()?;
    Some(Coordinates::new(lat, lon))
}

/// Country name + city name → coordinates, using the reference table for the ISO code.
pub struct CoordinateResolver<'a> {
    reference: &'a ReferenceData,
    geocoder: &'a dyn Geocoder,
}

impl<'a> CoordinateResolver<'a> {
    pub fn new(reference: &'a ReferenceData, geocoder: &'a dyn Geocoder) -> Self {
        Self {
            reference,
            geocoder,
        }
    }

    pub fn resolve(&self, country: &str, city: &str) -> Result<Coordinates, ItineraError> {
        let code = self
            .reference
            .country_code(country)
            .ok_or_else(|| ItineraError::InvalidCountry(country.to_string()))?;
        let coords = self.geocoder.forward(city, code)?;
        debug!(
            "Resolved city — city={} country={} lat={} lon={}",
            city, code, coords.lat, coords.lon
        );
        Ok(coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;
    use serde_json::json;
    use std::cell::RefCell;

    struct RecordingGeocoder {
        calls: RefCell<Vec<(String, String)>>,
    }

    impl Geocoder for RecordingGeocoder {
        fn forward(&self, query: &str, country_code: &str) -> Result<Coordinates, GeocodeError> {
            self.calls
                .borrow_mut()
                .push((query.to_string(), country_code.to_string()));
            Ok(Coordinates::new(38.72, -9.14))
        }
    }

    #[test]
    fn test_first_match_takes_top_result() {
        let body = json!({
            "data": [
                {"latitude": 40.2033, "longitude": -8.4103, "label": "Coimbra, Portugal"},
                {"latitude": 1.0, "longitude": 2.0}
            ]
        });
        assert_eq!(first_match(&body), Some(Coordinates::new(40.2033, -8.4103)));
    }

    #[test]
    fn test_first_match_empty_or_malformed() {
        assert_eq!(first_match(&json!({"data": []})), None);
        assert_eq!(first_match(&json!({"data": [[]]})), None);
        assert_eq!(first_match(&json!({"error": {"code": "invalid_access_key"}})), None);
        assert_eq!(
            first_match(&json!({"data": [{"latitude": "40.2", "longitude": -8.4}]})),
            None
        );
    }

    #[test]
    fn test_resolver_uses_iso_code() {
        let reference = ReferenceData::bundled();
        let geocoder = RecordingGeocoder {
            calls: RefCell::new(Vec::new()),
        };
        let resolver = CoordinateResolver::new(&reference, &geocoder);

        let coords = resolver.resolve("Portugal", "Lisbon").unwrap();
        assert_eq!(coords, Coordinates::new(38.72, -9.14));
        assert_eq!(
            geocoder.calls.borrow().as_slice(),
            [("Lisbon".to_string(), "PT".to_string())]
        );
    }

    #[test]
    fn test_resolver_rejects_unknown_country() {
        let reference = ReferenceData::bundled();
        let geocoder = RecordingGeocoder {
            calls: RefCell::new(Vec::new()),
        };
        let resolver = CoordinateResolver::new(&reference, &geocoder);

        let err = resolver.resolve("Atlantis", "Poseidonia").unwrap_err();
        assert!(matches!(err, ItineraError::InvalidCountry(ref c) if c == "Atlantis"));
        assert!(geocoder.calls.borrow().is_empty());
    }

    #[test]
    fn test_forward_request_shape() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"data": [{"latitude": 40.203314, "longitude": -8.410257}]}"#,
        );
        let client = PositionstackClient::new(" k-123 ", None)
            .unwrap()
            .with_endpoint(format!("{}/v1/forward", base));

        let coords = client.forward("Coimbra", "PT").unwrap();
        assert_eq!(coords, Coordinates::new(40.203314, -8.410257));

        let request = server.join().unwrap();
        let request_line = request.lines().next().unwrap();
        assert_eq!(
            request_line,
            "GET /v1/forward?access_key=k-123&query=Coimbra&country=PT&limit=1 HTTP/1.1"
        );
    }

    #[test]
    fn test_forward_empty_data_is_no_match() {
        let (base, server) = serve_once("200 OK", r#"{"data": []}"#);
        let client = PositionstackClient::new("k", None)
            .unwrap()
            .with_endpoint(format!("{}/v1/forward", base));

        let err = client.forward("Atlantis", "PT").unwrap_err();
        assert!(matches!(
            err,
            GeocodeError::NoMatch { ref query, ref country_code }
                if query == "Atlantis" && country_code == "PT"
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_forward_http_error() {
        let (base, server) = serve_once("401 Unauthorized", r#"{"error": {}}"#);
        let client = PositionstackClient::new("bad", None)
            .unwrap()
            .with_endpoint(format!("{}/v1/forward", base));

        assert!(matches!(
            client.forward("Lisbon", "PT"),
            Err(GeocodeError::Http(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_blank_access_key() {
        assert!(matches!(
            PositionstackClient::new("", None),
            Err(GeocodeError::MissingKey)
        ));
    }
}
