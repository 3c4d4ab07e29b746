use glam::DVec2;
use std::f64::consts::PI;

/// Pixel width of the world at zoom 0. Zoom level z shows the world at
/// TILE_SIZE * 2^z pixels across, so the leveled zooms from the client
/// config (city ~12, street ~16) mean the same thing they do on web maps.
const TILE_SIZE: f64 = 256.0;

/// Latitude limit where the Web Mercator projection stays well-behaved.
const MAX_LAT: f64 = 85.05;

/// Viewport representing the visible map area: center, leveled zoom, and
/// canvas size in braille pixels.
#[derive(Clone)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-85 to 85)
    pub center_lat: f64,
    /// Zoom level (0 = whole world, each step doubles the scale)
    pub zoom: f64,
    /// Lowest zoom the user can reach
    pub min_zoom: f64,
    /// Highest zoom the user can reach
    pub max_zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

impl Viewport {
    pub fn new(
        center_lon: f64,
        center_lat: f64,
        zoom: f64,
        min_zoom: f64,
        max_zoom: f64,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            center_lon,
            center_lat: center_lat.clamp(-MAX_LAT, MAX_LAT),
            zoom: zoom.clamp(min_zoom, max_zoom),
            min_zoom,
            max_zoom,
            width,
            height,
        }
    }

    /// Pixels per normalized-mercator unit at the current zoom.
    pub fn scale(&self) -> f64 {
        Self::scale_at(self.zoom)
    }

    /// Pixels per normalized-mercator unit at an arbitrary zoom.
    pub fn scale_at(zoom: f64) -> f64 {
        TILE_SIZE * zoom.exp2()
    }

    /// Project geographic coordinates into normalized Web Mercator [0,1]^2.
    pub fn mercator(lon: f64, lat: f64) -> DVec2 {
        let x = (lon + 180.0) / 360.0;
        let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
        DVec2::new(x, y)
    }

    /// Inverse of [`Viewport::mercator`].
    pub fn unmercator(m: DVec2) -> (f64, f64) {
        let lon = m.x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * m.y)).sinh().atan().to_degrees();
        (lon, lat)
    }

    /// Project a geographic coordinate (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let m = Self::mercator(lon, lat);
        let c = Self::mercator(self.center_lon, self.center_lat);
        let s = self.scale();

        let px = ((m.x - c.x) * s + self.width as f64 / 2.0).round() as i32;
        let py = ((m.y - c.y) * s + self.height as f64 / 2.0).round() as i32;
        (px, py)
    }

    /// Unproject pixel coordinates back to geographic coordinates (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let c = Self::mercator(self.center_lon, self.center_lat);
        let s = self.scale();

        let m = DVec2::new(
            (px as f64 - self.width as f64 / 2.0) / s + c.x,
            (py as f64 - self.height as f64 / 2.0) / s + c.y,
        );
        Self::unmercator(m)
    }

    /// Pan the viewport by a pixel delta (plain translate, no animation).
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let c = Self::mercator(self.center_lon, self.center_lat);
        let s = self.scale();
        let m = DVec2::new(
            (c.x + dx as f64 / s).rem_euclid(1.0),
            (c.y + dy as f64 / s).clamp(0.0, 1.0),
        );
        let (lon, lat) = Self::unmercator(m);
        self.center_lon = lon;
        self.center_lat = lat.clamp(-MAX_LAT, MAX_LAT);
    }

    /// Move the camera without animation.
    pub fn jump_to(&mut self, lon: f64, lat: f64, zoom: f64) {
        self.center_lon = lon;
        self.center_lat = lat.clamp(-MAX_LAT, MAX_LAT);
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Zoom in half a level, keeping the center fixed.
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + 0.5).clamp(self.min_zoom, self.max_zoom);
    }

    /// Zoom out half a level, keeping the center fixed.
    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom - 0.5).clamp(self.min_zoom, self.max_zoom);
    }

    /// Zoom in towards a specific pixel location
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 0.5);
    }

    /// Zoom out from a specific pixel location
    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, -0.5);
    }

    /// Change zoom while keeping the geography under the anchor pixel fixed.
    fn zoom_at(&mut self, px: i32, py: i32, dz: f64) {
        let (lon, lat) = self.unproject(px, py);

        self.zoom = (self.zoom + dz).clamp(self.min_zoom, self.max_zoom);

        // Pan so the anchor point projects back to the same pixel.
        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
    }

    /// Check if a projected point is visible in the viewport
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }
}
