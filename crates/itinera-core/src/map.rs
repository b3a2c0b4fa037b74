use crate::itinerary::{Coordinates, Location};
use std::fmt::Write as _;
use std::path::Path;

/// Zoom suited to a single-country view.
pub const DEFAULT_ZOOM: u8 = 5;

/// Every stop shares one marker color.
pub const MARKER_COLOR: &str = "#FF4B4B";

const TEMPLATE: &str = include_str!("map_template.html");

/// Base map layers. Only the light, neutral one is used for routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileLayer {
    #[default]
    CartoPositron,
}

impl TileLayer {
    /// Leaflet-style template with `{s}` subdomain placeholder.
    pub fn url_template(&self) -> &'static str {
        match self {
            TileLayer::CartoPositron => {
                "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png"
            }
        }
    }

    pub fn attribution(&self) -> &'static str {
        match self {
            TileLayer::CartoPositron => {
                "&copy; OpenStreetMap contributors &copy; CARTO"
            }
        }
    }

    /// Concrete URL for one tile, spreading requests over the a-d subdomains.
    pub fn tile_url(&self, z: u32, x: u32, y: u32) -> String {
        let subdomain = ['a', 'b', 'c', 'd'][((x + y) % 4) as usize];
        self.url_template()
            .replace("{s}", &subdomain.to_string())
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// 1-based visit order.
    pub number: usize,
    pub name: String,
    pub position: Coordinates,
    pub color: &'static str,
}

/// Everything needed to draw a route, independent of the front end.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMap {
    pub center: Coordinates,
    pub zoom: u8,
    pub tiles: TileLayer,
    pub markers: Vec<Marker>,
}

/// First and last stop are the same place (name and coordinates).
pub fn is_closed_loop(locations: &[Location]) -> bool {
    match (locations.first(), locations.last()) {
        (Some(first), Some(last)) => locations.len() > 1 && first == last,
        _ => false,
    }
}

/// One numbered marker per stop, in the given order. A closed loop drops its
/// final marker so the start point is drawn once.
pub fn plot_locations(locations: &[Location], center: Coordinates) -> RouteMap {
    let closed = is_closed_loop(locations);
    let markers = locations
        .iter()
        .enumerate()
        .filter(|(i, _)| !(closed && *i == locations.len() - 1))
        .map(|(i, location)| Marker {
            number: i + 1,
            name: location.name.clone(),
            position: location.coordinates,
            color: MARKER_COLOR,
        })
        .collect();

    RouteMap {
        center,
        zoom: DEFAULT_ZOOM,
        tiles: TileLayer::default(),
        markers,
    }
}

impl RouteMap {
    /// Standalone Leaflet page.
    pub fn to_html(&self, title: &str) -> String {
        let mut markers_js = String::new();
        for marker in &self.markers {
            let popup = js_string(&html_escape::encode_text(&marker.name));
            let _ = writeln!(
                markers_js,
                "    L.marker([{:.6}, {:.6}], {{icon: stopIcon({})}}).addTo(map).bindPopup({});",
                marker.position.lat, marker.position.lon, marker.number, popup
            );
        }

        TEMPLATE
            .replace("{{TITLE}}", &html_escape::encode_text(title))
            .replace("{{COLOR}}", MARKER_COLOR)
            .replace("{{CENTER_LAT}}", &format!("{:.6}", self.center.lat))
            .replace("{{CENTER_LON}}", &format!("{:.6}", self.center.lon))
            .replace("{{ZOOM}}", &self.zoom.to_string())
            .replace("{{TILE_URL}}", &js_string(self.tiles.url_template()))
            .replace("{{TILE_ATTRIBUTION}}", &js_string(self.tiles.attribution()))
            .replace("{{MARKERS}}", &markers_js)
    }

    pub fn write_html(&self, path: &Path, title: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_html(title))
    }
}

// JSON string literals are valid JS string literals; `</` is split so a name
// can never close the surrounding script element.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace("</", "<\\/")
}
