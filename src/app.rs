use crate::camera::{CameraController, CameraEvent, TickCtx};
use crate::chrome::{fly_padding, Chrome, FlyPadding, PixelRect};
use crate::config::{ClientConfig, ConfigError};
use crate::map::{BasemapRenderer, Viewport};
use crate::registry::{PopupState, Registry};
use crate::selection::{MapEvent, SelectionCoordinator};
use ratatui::layout::Rect;
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a transient notice stays on screen.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

/// A transient on-screen notice (load failures, config failures).
pub struct Notice {
    pub message: String,
    pub created: Instant,
}

/// State of the business directory panel.
pub struct DirectoryPanel {
    pub open: bool,
    pub query: String,
    pub cursor: usize,
    /// Listing indices, alphabetized then filtered by the query.
    pub entries: Vec<usize>,
}

impl DirectoryPanel {
    fn new() -> Self {
        Self {
            open: false,
            query: String::new(),
            cursor: 0,
            entries: Vec::new(),
        }
    }
}

/// Application state
pub struct App {
    pub config: ClientConfig,
    pub viewport: Viewport,
    pub basemap: BasemapRenderer,
    pub registry: Registry,
    pub camera: CameraController,
    pub coordinator: SelectionCoordinator,
    pub chrome: Chrome,
    pub panel: DirectoryPanel,
    pub notices: Vec<Notice>,
    pub events: VecDeque<MapEvent>,
    pub should_quit: bool,
    /// False when configuration failed: the map stays empty and inert.
    pub map_ready: bool,
    /// Unclipped popup rect in frame pixels, recorded at render time.
    pub popup_measured: Option<PixelRect>,
    last_popup_height: Option<i32>,
    /// Popup rect in frame cells as actually drawn, for click routing.
    pub popup_cells: Option<Rect>,
    pub popup_close_cell: Option<(u16, u16)>,
    pub panel_cells: Option<Rect>,
    /// First list row inside the panel (below the search line).
    pub panel_list_row0: u16,
    /// Scroll offset of the rendered list, for click routing.
    pub panel_scroll: usize,
    /// Frame size in cells
    cols: u16,
    rows: u16,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
}

impl App {
    pub fn new(config: ClientConfig, cols: u16, rows: u16) -> Self {
        let viewport = Self::viewport_for(&config, cols, rows);
        Self {
            config,
            viewport,
            basemap: BasemapRenderer::new(),
            registry: Registry::new(),
            camera: CameraController::new(),
            coordinator: SelectionCoordinator::new(),
            chrome: Chrome::new(),
            panel: DirectoryPanel::new(),
            notices: Vec::new(),
            events: VecDeque::new(),
            should_quit: false,
            map_ready: true,
            popup_measured: None,
            last_popup_height: None,
            popup_cells: None,
            popup_close_cell: None,
            panel_cells: None,
            panel_list_row0: 0,
            panel_scroll: 0,
            cols,
            rows,
            last_mouse: None,
        }
    }

    /// Configuration failure is fatal to map creation: the UI still comes
    /// up, with a notice over an empty map. No retry.
    pub fn with_config_error(error: ConfigError, cols: u16, rows: u16, now: Instant) -> Self {
        warn!(error = %error, "configuration failed; map disabled");
        let mut app = Self::new(ClientConfig::fallback(), cols, rows);
        app.map_ready = false;
        app.push_notice(format!("Configuration error: {error}"), now);
        app
    }

    fn viewport_for(config: &ClientConfig, cols: u16, rows: u16) -> Viewport {
        // Braille gives 2x4 resolution per character; account for the map
        // border (2 cells) and the status bar (1 cell).
        let inner_width = (cols as usize).saturating_sub(2);
        let inner_height = (rows as usize).saturating_sub(3);
        Viewport::new(
            config.map.center[0],
            config.map.center[1],
            config.map.zoom,
            config.map.min_zoom,
            config.map.max_zoom,
            inner_width * 2,
            inner_height * 4,
        )
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        self.viewport.width = (cols as usize).saturating_sub(2) * 2;
        self.viewport.height = (rows as usize).saturating_sub(3) * 4;
    }

    /// Full frame size in braille pixels; popup and chrome rects are
    /// measured against this.
    pub fn frame_px(&self) -> (i32, i32) {
        (self.cols as i32 * 2, self.rows as i32 * 4)
    }

    /// Load basemap layers and the listings file. Load failure is a
    /// notice, not a crash: the map keeps running with zero listings.
    pub fn load(&mut self, now: Instant) {
        if !self.map_ready {
            return;
        }

        if self.config.banners.premium.is_none() {
            debug!("premium banner not configured");
        }
        if self.config.banners.rotating.is_empty() {
            debug!("banner slideshow not configured");
        }
        if self.config.brand.is_none() {
            debug!("brand logo not configured");
        }

        crate::data::load_basemap(&mut self.basemap, &self.config.map.basemap);

        match crate::data::load_records(Path::new(&self.config.data.csv_path)) {
            Ok(records) => {
                self.registry = Registry::from_records(&records);
                info!(
                    accepted = self.registry.len(),
                    rejected = self.registry.rejected(),
                    "listings ready"
                );
            }
            Err(error) => {
                warn!(error = %error, "listings load failed");
                self.push_notice(
                    "Failed to load business data. Please check that the data file exists."
                        .to_string(),
                    now,
                );
            }
        }

        self.apply_filter();
    }

    pub fn push_notice(&mut self, message: String, now: Instant) {
        self.notices.push(Notice {
            message,
            created: now,
        });
    }

    /// Fly padding for a selection started right now, derived from the
    /// chrome geometry recorded at the previous render.
    pub fn current_padding(&self) -> FlyPadding {
        let (w, h) = self.frame_px();
        fly_padding(w as u32, h as u32, self.chrome.obstruction_bottom())
    }

    /// Queue a selection (pin click or directory pick).
    pub fn select_listing(&mut self, index: usize) {
        self.events.push_back(MapEvent::SelectionRequested(index));
    }

    /// Close whichever popup is showing, reporting it as an observed event.
    pub fn close_showing_popup(&mut self) {
        if let Some((index, _)) = self.registry.showing_popup() {
            self.registry.close_popup(index);
            self.events.push_back(MapEvent::PopupClosed(index));
        }
    }

    /// Advance all time-driven behavior. Called once per frame.
    pub fn tick(&mut self, now: Instant) {
        while let Some(event) = self.events.pop_front() {
            let padding = self.current_padding();
            self.coordinator.handle_event(
                event,
                &mut self.registry,
                &mut self.camera,
                &self.viewport,
                padding,
                now,
            );
        }

        self.chrome.slideshow.advance(
            now,
            self.config.banners.rotating.len(),
            Duration::from_millis(self.config.banners.interval_ms),
        );

        let safe = self.chrome.safe_area();
        let frame_px = self.frame_px();
        let mut ctx = TickCtx {
            now,
            viewport: &mut self.viewport,
            registry: &mut self.registry,
            popup_rect: self.popup_measured,
            safe,
            frame_px,
        };
        if let Some(CameraEvent::PopupOpened(index)) = self.camera.tick(&mut ctx) {
            self.events.push_back(MapEvent::PopupOpened(index));
        }

        // Late content growth (the image-load analog): if the open popup's
        // measured height changed since the last frame, verify again.
        if let Some((_, PopupState::Open)) = self.registry.showing_popup() {
            if let Some(rect) = self.popup_measured {
                if self.last_popup_height.is_some_and(|h| h != rect.h) {
                    debug!("popup height changed; scheduling re-verify");
                    self.camera.request_reverify(now);
                }
                self.last_popup_height = Some(rect.h);
            }
        } else {
            self.last_popup_height = None;
        }

        self.notices
            .retain(|notice| now.duration_since(notice.created) < NOTICE_TTL);
    }

    // --- directory panel ---

    pub fn toggle_panel(&mut self) {
        self.panel.open = !self.panel.open;
    }

    pub fn panel_type(&mut self, ch: char) {
        if !self.config.search.enabled {
            return;
        }
        self.panel.query.push(ch);
        self.apply_filter();
    }

    pub fn panel_backspace(&mut self) {
        if self.panel.query.pop().is_some() {
            self.apply_filter();
        }
    }

    pub fn panel_move(&mut self, delta: i32) {
        if self.panel.entries.is_empty() {
            return;
        }
        let last = self.panel.entries.len() - 1;
        let cursor = self.panel.cursor as i32 + delta;
        self.panel.cursor = cursor.clamp(0, last as i32) as usize;
    }

    /// Select the entry under the cursor and close the panel.
    pub fn panel_confirm(&mut self) {
        if let Some(&index) = self.panel.entries.get(self.panel.cursor) {
            self.select_listing(index);
            self.panel.open = false;
        }
    }

    /// Re-run the filter over pins and rebuild the directory entries.
    pub fn apply_filter(&mut self) {
        self.registry
            .filter_by_term(&self.panel.query, &self.config.search.fields);
        self.panel.entries = self
            .registry
            .sorted_indices()
            .into_iter()
            .filter(|&i| self.registry.pin(i).is_some_and(|pin| pin.visible))
            .collect();
        if !self.panel.entries.is_empty() {
            self.panel.cursor = self.panel.cursor.min(self.panel.entries.len() - 1);
        } else {
            self.panel.cursor = 0;
        }
    }

    // --- mouse ---

    /// Route a left click through the overlay stack: popup close control,
    /// popup body, directory panel, chrome, then map pins.
    pub fn handle_click(&mut self, col: u16, row: u16) {
        if let Some((cx, cy)) = self.popup_close_cell {
            if col == cx && row == cy {
                self.close_showing_popup();
                return;
            }
        }
        if let Some(rect) = self.popup_cells {
            if rect.contains((col, row).into()) {
                return; // clicks inside the popup don't fall through
            }
        }

        if self.panel.open {
            if let Some(rect) = self.panel_cells {
                if rect.contains((col, row).into()) {
                    if row >= self.panel_list_row0 {
                        let offset = self.panel_scroll + (row - self.panel_list_row0) as usize;
                        if let Some(&index) = self.panel.entries.get(offset) {
                            self.select_listing(index);
                            self.panel.open = false;
                        }
                    }
                    return;
                }
            }
            // Clicking outside the open panel closes it.
            self.panel.open = false;
        }

        if let Some(rect) = self.chrome.client_block {
            if rect.contains_cell(col, row) {
                self.toggle_panel();
                return;
            }
        }
        // Banner and brand clicks just surface the sponsor link.
        if let Some(rect) = self.chrome.banner1 {
            if rect.contains_cell(col, row) {
                if let Some(banner) = &self.config.banners.premium {
                    info!(link = banner.link.as_deref().unwrap_or(""), "banner clicked");
                }
                return;
            }
        }
        if let Some(rect) = self.chrome.banner2 {
            if rect.contains_cell(col, row) {
                if let Some(banner) = self.config.banners.rotating.get(self.chrome.slideshow.index) {
                    info!(link = banner.link.as_deref().unwrap_or(""), "banner clicked");
                }
                return;
            }
        }
        if let Some(rect) = self.chrome.brand {
            if rect.contains_cell(col, row) {
                if let Some(brand) = &self.config.brand {
                    info!(link = brand.link.as_deref().unwrap_or(""), "brand logo clicked");
                }
                return;
            }
        }

        if let Some(index) = self.hit_test_pin(col, row) {
            self.select_listing(index);
        }
    }

    /// Nearest visible pin within a small radius of the clicked cell.
    pub fn hit_test_pin(&self, col: u16, row: u16) -> Option<usize> {
        // Convert terminal coords to braille pixel coords, accounting for
        // the map border (1 cell offset).
        let px = (col.saturating_sub(1) as i32) * 2;
        let py = (row.saturating_sub(1) as i32) * 4;

        self.registry
            .iter()
            .filter(|(_, _, pin)| pin.visible)
            .filter_map(|(index, listing, _)| {
                let (x, y) = self.viewport.project(listing.longitude, listing.latitude);
                let dist = (x - px).abs().max((y - py).abs());
                (dist <= 6).then_some((dist, index))
            })
            .min_by_key(|&(dist, _)| dist)
            .map(|(_, index)| index)
    }

    /// Handle mouse drag - pans the map
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((last_col, last_row)) = self.last_mouse {
            let dx = (last_col as i32 - col as i32) * 2;
            let dy = (last_row as i32 - row as i32) * 4;
            self.viewport.pan(dx, dy);
        }
        self.last_mouse = Some((col, row));
    }

    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    /// Reset the camera to the configured initial view.
    pub fn reset_view(&mut self) {
        self.viewport.jump_to(
            self.config.map.center[0],
            self.config.map.center[1],
            self.config.map.zoom,
        );
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Current zoom for the status bar.
    pub fn zoom_label(&self) -> String {
        format!("z{:.1}", self.viewport.zoom)
    }

    /// Current center coordinates for the status bar.
    pub fn center_label(&self) -> String {
        format!(
            "{:.3}°{}, {:.3}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FLY_DURATION, POPUP_OPEN_DELAY, VERIFY_POLL_INTERVAL};
    use crate::data::RawRecord;

    fn test_config() -> ClientConfig {
        serde_json::from_str(
            r#"{
                "map": { "center": [-81.73, 28.80], "zoom": 12 },
                "data": { "csv_path": "unused.csv" },
                "search": { "fields": ["name", "category"] }
            }"#,
        )
        .unwrap()
    }

    fn records(names: &[&str]) -> Vec<RawRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                [
                    ("name".to_string(), name.to_string()),
                    ("latitude".to_string(), format!("28.8{i}")),
                    ("longitude".to_string(), "-81.73".to_string()),
                ]
                .into_iter()
                .collect()
            })
            .collect()
    }

    fn test_app() -> App {
        let mut app = App::new(test_config(), 120, 40);
        app.registry = Registry::from_records(&records(&[
            "Joe's Coffee",
            "Beta Books",
            "alpha Hardware",
        ]));
        app.apply_filter();
        app
    }

    /// Drive the app through a full selection sequence, rendering the
    /// popup as a fixed-size rect once it starts showing.
    fn run_selection(app: &mut App, index: usize, t0: Instant) -> Instant {
        app.select_listing(index);
        let mut now = t0;
        for _ in 0..40 {
            now += Duration::from_millis(50);
            // "Render": measure the showing popup.
            app.popup_measured = app
                .registry
                .showing_popup()
                .map(|_| PixelRect::new(90, 60, 80, 48));
            app.tick(now);
            if app.registry.open_count() > 0 && app.camera.is_idle() && app.events.is_empty() {
                break;
            }
        }
        now
    }

    #[test]
    fn test_selection_opens_exactly_one_popup() {
        let mut app = test_app();
        let t0 = Instant::now();
        run_selection(&mut app, 0, t0);

        assert_eq!(app.registry.open_count(), 1);
        assert_eq!(app.registry.showing_popup().map(|(i, _)| i), Some(0));
        assert_eq!(app.coordinator.current_open(), Some(0));
        assert_eq!(app.coordinator.active_entry(), Some(0));
    }

    #[test]
    fn test_reselect_closes_previous_before_opening_next() {
        let mut app = test_app();
        let t0 = Instant::now();
        let now = run_selection(&mut app, 0, t0);
        assert_eq!(app.registry.showing_popup().map(|(i, _)| i), Some(0));

        // Select listing 2 while 0's popup is open: 0 closes on the very
        // next tick, long before 2's popup opens.
        app.select_listing(2);
        let step = now + Duration::from_millis(16);
        app.popup_measured = None;
        app.tick(step);
        assert_eq!(app.registry.pin(0).unwrap().popup, PopupState::Closed);
        assert_eq!(app.registry.pin(2).unwrap().popup, PopupState::Closed);

        run_selection(&mut app, 2, step);
        assert_eq!(app.registry.showing_popup().map(|(i, _)| i), Some(2));
        assert_eq!(app.registry.open_count(), 1);
    }

    #[test]
    fn test_popup_close_event_observed_by_coordinator() {
        let mut app = test_app();
        let t0 = Instant::now();
        let now = run_selection(&mut app, 1, t0);
        assert_eq!(app.coordinator.current_open(), Some(1));

        app.close_showing_popup();
        app.tick(now + Duration::from_millis(16));
        assert_eq!(app.coordinator.current_open(), None);
        assert_eq!(app.registry.open_count(), 0);
    }

    #[test]
    fn test_render_timeout_is_silent() {
        let mut app = test_app();
        let t0 = Instant::now();
        app.select_listing(0);

        // Never provide a popup measurement.
        let mut now = t0;
        while now < t0 + FLY_DURATION + POPUP_OPEN_DELAY + VERIFY_POLL_INTERVAL * 20 {
            now += Duration::from_millis(50);
            app.tick(now);
        }

        assert!(app.camera.is_idle());
        assert!(app.notices.is_empty());
        assert_eq!(app.registry.open_count(), 0);
    }

    #[test]
    fn test_notice_expires_after_ttl() {
        let mut app = test_app();
        let t0 = Instant::now();
        app.push_notice("Failed to load business data.".to_string(), t0);
        app.tick(t0 + Duration::from_secs(4));
        assert_eq!(app.notices.len(), 1);
        app.tick(t0 + Duration::from_secs(5));
        assert!(app.notices.is_empty());
    }

    #[test]
    fn test_panel_query_filters_entries_and_pins() {
        let mut app = test_app();
        app.panel_type('c');
        app.panel_type('o');
        app.panel_type('f');

        assert_eq!(app.panel.entries.len(), 1);
        assert_eq!(
            app.registry.listing(app.panel.entries[0]).unwrap().name,
            "Joe's Coffee"
        );
        assert!(!app.registry.pin(1).unwrap().visible);

        app.panel_backspace();
        app.panel_backspace();
        app.panel_backspace();
        assert_eq!(app.panel.entries.len(), 3);
    }

    #[test]
    fn test_panel_entries_alphabetized() {
        let app = test_app();
        let names: Vec<&str> = app
            .panel
            .entries
            .iter()
            .map(|&i| app.registry.listing(i).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha Hardware", "Beta Books", "Joe's Coffee"]);
    }

    #[test]
    fn test_config_error_app_is_inert() {
        let now = Instant::now();
        let mut app = App::with_config_error(
            ConfigError::Invalid("map center [999, 0] out of range".to_string()),
            120,
            40,
            now,
        );
        assert!(!app.map_ready);
        assert_eq!(app.notices.len(), 1);

        app.load(now);
        assert!(app.registry.is_empty());
        assert!(!app.basemap.has_data());
    }

    #[test]
    fn test_out_of_range_selection_never_opens() {
        let mut app = test_app();
        let t0 = Instant::now();
        app.select_listing(99);
        app.tick(t0 + Duration::from_millis(16));
        assert!(app.camera.is_idle());
        assert!(app.registry.showing_popup().is_none());
    }
}
