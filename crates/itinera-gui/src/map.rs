use crate::Message;
use iced::advanced::{self, layout, renderer, widget, Layout, Widget};
use iced::widget::image;
use iced::{mouse, Border, Color, Element, Event, Length, Radians, Rectangle};
use itinera_core::map::{Marker, TileLayer};
use log::warn;
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

// --- Slippy Map / Mercator Math ---
pub const TILE_SIZE: f64 = 256.0;

pub fn lon_to_x(lon: f64, zoom: f64) -> f64 {
    ((lon + 180.0) / 360.0) * 2.0f64.powf(zoom) * TILE_SIZE
}

pub fn lat_to_y(lat: f64, zoom: f64) -> f64 {
    let lat_rad = lat.to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0
        * 2.0f64.powf(zoom)
        * TILE_SIZE
}

pub fn x_to_lon(x: f64, zoom: f64) -> f64 {
    (x / (TILE_SIZE * 2.0f64.powf(zoom))) * 360.0 - 180.0
}

pub fn y_to_lat(y: f64, zoom: f64) -> f64 {
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / (TILE_SIZE * 2.0f64.powf(zoom));
    (0.5 * (n.exp() - (-n).exp())).atan().to_degrees()
}

// --- Tile Management ---
const TILE_CACHE_SIZE: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoords {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl TileCoords {
    pub fn url(&self, layer: TileLayer) -> String {
        layer.tile_url(self.z, self.x, self.y)
    }
}

pub struct TileManager {
    layer: TileLayer,
    tiles: Arc<Mutex<LruCache<TileCoords, image::Handle>>>,
    pending: Arc<Mutex<HashSet<TileCoords>>>,
}

impl TileManager {
    pub fn new(layer: TileLayer) -> Self {
        let capacity = NonZeroUsize::new(TILE_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            layer,
            tiles: Arc::new(Mutex::new(LruCache::new(capacity))),
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn get_tile(&self, coords: TileCoords) -> Option<image::Handle> {
        let mut tiles = self.tiles.lock().ok()?;
        tiles.get(&coords).cloned()
    }

    /// Tiles still being fetched. The app polls this to know when to redraw.
    pub fn has_pending(&self) -> bool {
        self.pending.lock().map(|p| !p.is_empty()).unwrap_or(false)
    }

    pub fn request_tile(&self, coords: TileCoords) {
        {
            let Ok(mut pending) = self.pending.lock() else {
                return;
            };
            if pending.contains(&coords) {
                return;
            }
            if let Ok(tiles) = self.tiles.lock() {
                if tiles.contains(&coords) {
                    return;
                }
            }
            pending.insert(coords);
        }

        let tiles_arc = Arc::clone(&self.tiles);
        let pending_arc = Arc::clone(&self.pending);
        let url = coords.url(self.layer);

        std::thread::spawn(move || {
            let resp = ureq::get(&url)
                .set(
                    "User-Agent",
                    concat!("Itinera/", env!("CARGO_PKG_VERSION")),
                )
                .timeout(std::time::Duration::from_secs(10))
                .call();

            match resp {
                Ok(response) => {
                    let mut bytes = Vec::new();
                    if std::io::Read::read_to_end(&mut response.into_reader(), &mut bytes).is_ok()
                    {
                        let handle = image::Handle::from_bytes(bytes);
                        if let Ok(mut tiles) = tiles_arc.lock() {
                            tiles.put(coords, handle);
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch tile — tile={:?} error={}", coords, e);
                }
            }
            if let Ok(mut pending) = pending_arc.lock() {
                pending.remove(&coords);
            }
        });
    }
}

/// Route map: base tiles, the path between stops and one dot per marker.
pub struct RouteView<'a> {
    pub markers: &'a [Marker],
    /// Draw a closing segment from the last marker back to the first.
    pub closed: bool,
    pub hovered_stop: Option<usize>,
    pub tile_manager: &'a TileManager,
    pub zoom: f64,          // Fractional zoom (e.g., 5.4)
    pub center: (f64, f64), // (Lat, Lon)
}

#[derive(Debug, Clone, Copy, Default)]
struct MapState {
    is_dragging: bool,
    last_cursor: Option<iced::Point>,
    // Track values between prop updates to handle multiple events per frame
    current_center: (f64, f64), // (lat, lon)
    current_zoom: f64,
    last_prop_center: Option<(f64, f64)>,
    last_prop_zoom: Option<f64>,
}

fn parse_hex(color: &str) -> Color {
    let hex = color.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0)
    };
    Color::from_rgb8(channel(0), channel(2), channel(4))
}

impl<'a, Theme, Renderer> Widget<Message, Theme, Renderer> for RouteView<'a>
where
    Renderer: renderer::Renderer + advanced::image::Renderer<Handle = image::Handle>,
{
    fn size(&self) -> iced::Size<Length> {
        iced::Size {
            width: Length::Fill,
            height: Length::Fill,
        }
    }

    fn tag(&self) -> widget::tree::Tag {
        widget::tree::Tag::of::<MapState>()
    }

    fn state(&self) -> widget::tree::State {
        widget::tree::State::new(MapState::default())
    }

    fn layout(
        &self,
        _tree: &mut widget::Tree,
        _renderer: &Renderer,
        limits: &layout::Limits,
    ) -> layout::Node {
        layout::Node::new(limits.max())
    }

    fn draw(
        &self,
        tree: &widget::Tree,
        renderer: &mut Renderer,
        _theme: &Theme,
        _style: &renderer::Style,
        layout: Layout<'_>,
        _cursor: mouse::Cursor,
        _viewport: &Rectangle,
    ) {
        let state = tree.state.downcast_ref::<MapState>();
        let bounds = layout.bounds();

        // Prefer internal state for zero-latency feedback during interactions
        let zoom = if state.last_prop_zoom.is_some() {
            state.current_zoom
        } else {
            self.zoom
        };
        let (center_lat, center_lon) = if state.last_prop_center.is_some() {
            state.current_center
        } else {
            self.center
        };

        let zoom_scale = 2.0f64.powf(zoom);

        let camera_center_x = lon_to_x(center_lon, 0.0);
        let camera_center_y = lat_to_y(center_lat, 0.0);

        let to_screen = |lat: f64, lon: f64| {
            let sx = bounds.x
                + (bounds.width / 2.0)
                + ((lon_to_x(lon, 0.0) - camera_center_x) * zoom_scale) as f32;
            let sy = bounds.y
                + (bounds.height / 2.0)
                + ((lat_to_y(lat, 0.0) - camera_center_y) * zoom_scale) as f32;
            (sx, sy)
        };

        renderer.with_layer(bounds, |renderer| {
            renderer.fill_quad(
                renderer::Quad {
                    bounds,
                    border: Border::default(),
                    ..Default::default()
                },
                Color::from_rgb(0.93, 0.93, 0.93),
            );

            // --- Tile Layer ---
            let z = zoom.floor().clamp(0.0, 19.0) as u32;
            let num_tiles = 2u32.pow(z);
            let tile_size_z0 = TILE_SIZE / 2.0f64.powf(z as f64);

            let half_w = (bounds.width as f64 / 2.0) / zoom_scale;
            let half_h = (bounds.height as f64 / 2.0) / zoom_scale;

            let min_tx = ((camera_center_x - half_w) / tile_size_z0).floor() as i32;
            let max_tx = ((camera_center_x + half_w) / tile_size_z0).ceil() as i32;
            let min_ty = ((camera_center_y - half_h) / tile_size_z0).floor() as i32;
            let max_ty = ((camera_center_y + half_h) / tile_size_z0).ceil() as i32;

            for tx in min_tx..=max_tx {
                if tx < 0 || tx >= num_tiles as i32 {
                    continue;
                }
                for ty in min_ty..=max_ty {
                    if ty < 0 || ty >= num_tiles as i32 {
                        continue;
                    }

                    let coords = TileCoords {
                        x: tx as u32,
                        y: ty as u32,
                        z,
                    };
                    let screen_x = bounds.x
                        + (bounds.width / 2.0)
                        + ((tx as f64 * tile_size_z0 - camera_center_x) * zoom_scale) as f32;
                    let screen_y = bounds.y
                        + (bounds.height / 2.0)
                        + ((ty as f64 * tile_size_z0 - camera_center_y) * zoom_scale) as f32;
                    let current_tile_size = (tile_size_z0 * zoom_scale) as f32;

                    let tile_rect = Rectangle {
                        x: screen_x,
                        y: screen_y,
                        width: current_tile_size,
                        height: current_tile_size,
                    };

                    if let Some(handle) = self.tile_manager.get_tile(coords) {
                        renderer.draw_image(
                            advanced::image::Image {
                                handle,
                                filter_method: image::FilterMethod::Linear,
                                rotation: Radians(0.0),
                                opacity: 1.0,
                                snap: false,
                            },
                            tile_rect,
                        );
                    } else {
                        renderer.fill_quad(
                            renderer::Quad {
                                bounds: tile_rect,
                                ..Default::default()
                            },
                            Color::from_rgb(0.88, 0.88, 0.88),
                        );
                        self.tile_manager.request_tile(coords);
                    }
                }
            }
        });

        if self.markers.is_empty() {
            return;
        }

        // --- Route Layer ---
        renderer.with_layer(bounds, |renderer| {
            let mut legs: Vec<(&Marker, &Marker)> =
                self.markers.windows(2).map(|w| (&w[0], &w[1])).collect();
            if self.closed && self.markers.len() > 1 {
                if let (Some(last), Some(first)) = (self.markers.last(), self.markers.first()) {
                    legs.push((last, first));
                }
            }

            let line_color = Color::from_rgba(0.2, 0.2, 0.2, 0.6);
            for (from, to) in legs {
                let (sx1, sy1) = to_screen(from.position.lat, from.position.lon);
                let (sx2, sy2) = to_screen(to.position.lat, to.position.lon);

                // Point interpolation, no path primitive on this renderer
                let dx = sx2 - sx1;
                let dy = sy2 - sy1;
                let distance = (dx * dx + dy * dy).sqrt();
                let steps = (distance / 4.0).ceil().max(1.0) as usize;
                for i in 0..=steps {
                    let t = i as f32 / steps as f32;
                    renderer.fill_quad(
                        renderer::Quad {
                            bounds: Rectangle {
                                x: sx1 + dx * t - 1.0,
                                y: sy1 + dy * t - 1.0,
                                width: 2.0,
                                height: 2.0,
                            },
                            ..Default::default()
                        },
                        line_color,
                    );
                }
            }
        });

        // --- Marker Layer ---
        renderer.with_layer(bounds, |renderer| {
            for (index, marker) in self.markers.iter().enumerate() {
                let is_hovered = self.hovered_stop == Some(index);
                let size = if is_hovered { 18.0 } else { 12.0 };
                let half_size = size / 2.0;
                let (sx, sy) = to_screen(marker.position.lat, marker.position.lon);

                renderer.fill_quad(
                    renderer::Quad {
                        bounds: Rectangle {
                            x: sx - half_size,
                            y: sy - half_size,
                            width: size,
                            height: size,
                        },
                        border: Border {
                            color: Color::WHITE,
                            width: 2.0,
                            radius: half_size.into(),
                        },
                        ..Default::default()
                    },
                    parse_hex(marker.color),
                );
            }
        });
    }

    fn on_event(
        &mut self,
        tree: &mut widget::Tree,
        event: Event,
        layout: Layout<'_>,
        cursor: mouse::Cursor,
        _renderer: &Renderer,
        _clipboard: &mut dyn advanced::Clipboard,
        shell: &mut advanced::Shell<'_, Message>,
        _viewport: &Rectangle,
    ) -> advanced::graphics::core::event::Status {
        let state = tree.state.downcast_mut::<MapState>();
        let bounds = layout.bounds();
        let zoom_prop = self.zoom;
        let center_prop = self.center;

        // Initialize or sync internal state from props if props changed externally
        if state.last_prop_center != Some(center_prop) || state.last_prop_zoom != Some(zoom_prop) {
            state.current_center = center_prop;
            state.current_zoom = zoom_prop;
            state.last_prop_center = Some(center_prop);
            state.last_prop_zoom = Some(zoom_prop);
        }

        let current_zoom = state.current_zoom;
        let (center_lat, center_lon) = state.current_center;

        let camera_x = lon_to_x(center_lon, 0.0);
        let camera_y = lat_to_y(center_lat, 0.0);
        let scale = 2.0f64.powf(current_zoom);

        let cursor_point = cursor.position_in(bounds);
        let mouse_z0 = cursor_point.map(|p| {
            let rx = (p.x as f64) - (bounds.width as f64 / 2.0);
            let ry = (p.y as f64) - (bounds.height as f64 / 2.0);
            (camera_x + rx / scale, camera_y + ry / scale)
        });

        match event {
            Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if let Some(p) = cursor_point {
                    let d = match delta {
                        mouse::ScrollDelta::Lines { y, .. } => y as f64,
                        mouse::ScrollDelta::Pixels { y, .. } => (y as f64) / 100.0,
                    };
                    let min_zoom = (bounds.width as f64 / TILE_SIZE).log2().max(0.0);
                    let new_zoom = (current_zoom + d * 0.2).clamp(min_zoom, 19.0);

                    if (new_zoom - current_zoom).abs() > 0.001 {
                        let new_scale = 2.0f64.powf(new_zoom);

                        let mx = (p.x as f64) - (bounds.width as f64 / 2.0);
                        let my = (p.y as f64) - (bounds.height as f64 / 2.0);

                        let new_camera_x = camera_x + mx / scale - mx / new_scale;
                        let new_camera_y = camera_y + my / scale - my / new_scale;

                        let new_half_w = (bounds.width as f64 / 2.0) / new_scale;
                        let new_camera_x_clamped = if new_half_w * 2.0 >= TILE_SIZE {
                            TILE_SIZE / 2.0
                        } else {
                            new_camera_x.clamp(new_half_w, TILE_SIZE - new_half_w)
                        };
                        let new_camera_y_clamped = new_camera_y.clamp(0.0, TILE_SIZE);

                        let new_center = (
                            y_to_lat(new_camera_y_clamped, 0.0),
                            x_to_lon(new_camera_x_clamped, 0.0),
                        );

                        // Update internal state immediately for next event in same frame
                        state.current_center = new_center;
                        state.current_zoom = new_zoom;

                        shell.publish(Message::MapZoom {
                            new_center,
                            new_zoom,
                        });
                        return advanced::graphics::core::event::Status::Captured;
                    }
                }
            }
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if cursor.is_over(bounds) {
                    if let Some(position) = cursor.position() {
                        state.is_dragging = true;
                        state.last_cursor = Some(position);
                        return advanced::graphics::core::event::Status::Captured;
                    }
                }
            }
            Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                let was_dragging = state.is_dragging;
                state.is_dragging = false;
                state.last_cursor = None;
                if was_dragging {
                    return advanced::graphics::core::event::Status::Captured;
                }
            }
            Event::Mouse(mouse::Event::CursorMoved { position }) => {
                if state.is_dragging {
                    if let Some(last_pos) = state.last_cursor {
                        let delta = position - last_pos;
                        state.last_cursor = Some(position);

                        let new_wx = camera_x - delta.x as f64 / scale;
                        let new_wy = camera_y - delta.y as f64 / scale;

                        let half_vw = (bounds.width as f64 / 2.0) / scale;
                        let half_vh = (bounds.height as f64 / 2.0) / scale;

                        let clamped_wx = if half_vw * 2.0 >= TILE_SIZE {
                            TILE_SIZE / 2.0
                        } else {
                            new_wx.clamp(half_vw, TILE_SIZE - half_vw)
                        };
                        let clamped_wy = if half_vh * 2.0 >= TILE_SIZE {
                            TILE_SIZE / 2.0
                        } else {
                            new_wy.clamp(half_vh, TILE_SIZE - half_vh)
                        };

                        let new_center = (y_to_lat(clamped_wy, 0.0), x_to_lon(clamped_wx, 0.0));
                        state.current_center = new_center;

                        shell.publish(Message::MapZoom {
                            new_center,
                            new_zoom: current_zoom,
                        });
                        return advanced::graphics::core::event::Status::Captured;
                    }
                }

                if let Some((wx, wy)) = mouse_z0 {
                    // 10px hit radius in screen pixels
                    let hit = self.markers.iter().position(|marker| {
                        let tx = lon_to_x(marker.position.lon, 0.0);
                        let ty = lat_to_y(marker.position.lat, 0.0);
                        (tx - wx).powi(2) + (ty - wy).powi(2) < (10.0 / scale).powi(2)
                    });
                    if hit != self.hovered_stop {
                        shell.publish(Message::HoverStop(hit));
                        return advanced::graphics::core::event::Status::Captured;
                    }
                }
            }
            _ => {}
        }

        advanced::graphics::core::event::Status::Ignored
    }

    fn mouse_interaction(
        &self,
        tree: &widget::Tree,
        layout: Layout<'_>,
        cursor: mouse::Cursor,
        _viewport: &Rectangle,
        _renderer: &Renderer,
    ) -> mouse::Interaction {
        let state = tree.state.downcast_ref::<MapState>();
        if state.is_dragging {
            mouse::Interaction::Grabbing
        } else if cursor.is_over(layout.bounds()) {
            mouse::Interaction::Grab
        } else {
            mouse::Interaction::default()
        }
    }
}

impl<'a, Theme, Renderer> From<RouteView<'a>> for Element<'a, Message, Theme, Renderer>
where
    Theme: 'a,
    Renderer: 'a + renderer::Renderer + advanced::image::Renderer<Handle = image::Handle>,
{
    fn from(route_view: RouteView<'a>) -> Self {
        Self::new(route_view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_round_trip() {
        for (lat, lon) in [(38.72, -9.14), (0.0, 0.0), (-33.87, 151.21)] {
            let x = lon_to_x(lon, 5.0);
            let y = lat_to_y(lat, 5.0);
            assert!((x_to_lon(x, 5.0) - lon).abs() < 1e-9);
            assert!((y_to_lat(y, 5.0) - lat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tile_url_uses_layer() {
        let coords = TileCoords { x: 15, y: 12, z: 5 };
        assert_eq!(
            coords.url(TileLayer::CartoPositron),
            "https://d.basemaps.cartocdn.com/light_all/5/15/12.png"
        );
    }

    #[test]
    fn test_marker_color() {
        let c = parse_hex("#FF4B4B");
        assert_eq!(c, Color::from_rgb8(0xFF, 0x4B, 0x4B));
    }
}
