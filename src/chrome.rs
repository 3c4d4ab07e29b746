use ratatui::layout::Rect;
use std::time::{Duration, Instant};

/// Buffer kept between the popup and anything it must clear: the viewport
/// edges, and the bottom edge of any top obstruction.
pub const EDGE_GAP: i32 = 10;

/// Gap in cells between banner 1 and banner 2.
pub const BANNER_STACK_GAP: u16 = 1;

/// A rectangle in braille-pixel coordinates (cells are 2x4 pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Convert a cell rect from the terminal layout into pixel space.
    pub fn from_cells(rect: Rect) -> Self {
        Self {
            x: rect.x as i32 * 2,
            y: rect.y as i32 * 4,
            w: rect.width as i32 * 2,
            h: rect.height as i32 * 4,
        }
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn contains_cell(&self, col: u16, row: u16) -> bool {
        let px = col as i32 * 2;
        let py = row as i32 * 4;
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }
}

/// Margins, measured inward from each viewport edge, that popup content
/// must stay clear of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeArea {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

/// Compute the safe margins from the current obstruction geometry. The top
/// margin tracks whatever chrome is stacked there; the other edges use
/// fixed buffers. Never cached: obstruction geometry moves with terminal
/// resizes and with banner height changes.
pub fn safe_margins(obstructions: &[PixelRect]) -> SafeArea {
    let top = obstructions
        .iter()
        .map(|rect| rect.bottom() + EDGE_GAP)
        .fold(EDGE_GAP, i32::max);

    SafeArea {
        top,
        bottom: EDGE_GAP,
        left: EDGE_GAP,
        right: EDGE_GAP,
    }
}

/// Space the fly animation reserves around the target so the popup has
/// somewhere to appear. Coarser than [`safe_margins`]: the popup's real
/// height is unknown until its content has rendered, so this estimates it
/// from the viewport width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyPadding {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Expected popup space and buffer for a viewport width.
pub fn popup_reserve(view_w: u32) -> (f64, f64) {
    if view_w <= 400 {
        (300.0, 60.0)
    } else if view_w <= 480 {
        (350.0, 80.0)
    } else if view_w <= 768 {
        (450.0, 100.0)
    } else {
        (600.0, 120.0)
    }
}

/// Padding for the fly animation given the viewport size and the bottom
/// edge of the lowest top obstruction.
pub fn fly_padding(view_w: u32, view_h: u32, obstruction_bottom: f64) -> FlyPadding {
    let (popup_space, buffer) = popup_reserve(view_w);

    let max_percent = if view_w <= 480 { 0.6 } else { 0.7 };
    let top = (obstruction_bottom + popup_space + buffer).min(view_h as f64 * max_percent);

    FlyPadding {
        top,
        bottom: if view_w <= 480 { 30.0 } else { 50.0 },
        left: 0.0,
        right: 0.0,
    }
}

/// Rotating state for the banner 2 slideshow.
pub struct Slideshow {
    pub index: usize,
    last_advance: Option<Instant>,
}

impl Slideshow {
    pub fn new() -> Self {
        Self {
            index: 0,
            last_advance: None,
        }
    }

    /// Advance to the next banner once the interval has elapsed. A single
    /// banner never rotates.
    pub fn advance(&mut self, now: Instant, count: usize, interval: Duration) -> bool {
        if count < 2 {
            return false;
        }
        match self.last_advance {
            None => {
                self.last_advance = Some(now);
                false
            }
            Some(last) if now.duration_since(last) >= interval => {
                self.index = (self.index + 1) % count;
                self.last_advance = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

impl Default for Slideshow {
    fn default() -> Self {
        Self::new()
    }
}

/// Live geometry of the floating chrome, recorded every render so the
/// obstruction model always sees what is actually on screen.
pub struct Chrome {
    pub banner1: Option<PixelRect>,
    pub banner2: Option<PixelRect>,
    pub brand: Option<PixelRect>,
    pub client_block: Option<PixelRect>,
    pub slideshow: Slideshow,
}

impl Chrome {
    pub fn new() -> Self {
        Self {
            banner1: None,
            banner2: None,
            brand: None,
            client_block: None,
            slideshow: Slideshow::new(),
        }
    }

    /// Elements that can occlude the popup from the top of the screen.
    fn top_obstructions(&self) -> Vec<PixelRect> {
        [self.banner1, self.banner2, self.client_block]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Current safe margins. Recomputed from scratch on every call.
    pub fn safe_area(&self) -> SafeArea {
        safe_margins(&self.top_obstructions())
    }

    /// Bottom edge of the banner stack, for the fly padding estimate.
    pub fn obstruction_bottom(&self) -> f64 {
        [self.banner1, self.banner2]
            .into_iter()
            .flatten()
            .map(|rect| rect.bottom())
            .max()
            .unwrap_or(0) as f64
    }
}

impl Default for Chrome {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_reserve_breakpoints() {
        assert_eq!(popup_reserve(375), (300.0, 60.0));
        assert_eq!(popup_reserve(400), (300.0, 60.0));
        assert_eq!(popup_reserve(480), (350.0, 80.0));
        assert_eq!(popup_reserve(768), (450.0, 100.0));
        assert_eq!(popup_reserve(1200), (600.0, 120.0));
    }

    #[test]
    fn test_fly_padding_caps_at_viewport_fraction() {
        // Wide viewport: cap is 70% of height
        let padding = fly_padding(1200, 800, 200.0);
        assert!(padding.top <= 0.7 * 800.0);
        assert_eq!(padding.bottom, 50.0);

        // Narrow viewport: cap is 60% of height
        let padding = fly_padding(375, 600, 200.0);
        assert!(padding.top <= 0.6 * 600.0);
        assert_eq!(padding.bottom, 30.0);
    }

    #[test]
    fn test_fly_padding_uncapped_sum() {
        // Tall viewport so the cap stays out of the way
        let padding = fly_padding(1200, 4000, 100.0);
        assert_eq!(padding.top, 100.0 + 600.0 + 120.0);
        assert_eq!(padding.left, 0.0);
        assert_eq!(padding.right, 0.0);
    }

    #[test]
    fn test_safe_margins_track_lowest_obstruction() {
        let safe = safe_margins(&[
            PixelRect::new(40, 0, 60, 12),
            PixelRect::new(40, 16, 60, 12), // bottom = 28
        ]);
        assert_eq!(safe.top, 28 + EDGE_GAP);
        assert_eq!(safe.bottom, EDGE_GAP);
        assert_eq!(safe.left, EDGE_GAP);
        assert_eq!(safe.right, EDGE_GAP);
    }

    #[test]
    fn test_safe_margins_floor_without_obstructions() {
        let safe = safe_margins(&[]);
        assert_eq!(safe.top, EDGE_GAP);
    }

    #[test]
    fn test_slideshow_needs_two_banners() {
        let t0 = Instant::now();
        let mut slideshow = Slideshow::new();
        assert!(!slideshow.advance(t0, 1, Duration::from_millis(10)));
        assert!(!slideshow.advance(t0 + Duration::from_secs(60), 1, Duration::from_millis(10)));
        assert_eq!(slideshow.index, 0);
    }

    #[test]
    fn test_slideshow_rotates_and_wraps() {
        let t0 = Instant::now();
        let interval = Duration::from_millis(7000);
        let mut slideshow = Slideshow::new();

        assert!(!slideshow.advance(t0, 3, interval)); // arms the timer
        assert!(slideshow.advance(t0 + interval, 3, interval));
        assert_eq!(slideshow.index, 1);
        assert!(slideshow.advance(t0 + interval * 2, 3, interval));
        assert!(slideshow.advance(t0 + interval * 3, 3, interval));
        assert_eq!(slideshow.index, 0);
    }

    #[test]
    fn test_chrome_safe_area_follows_recorded_rects() {
        let mut chrome = Chrome::new();
        assert_eq!(chrome.safe_area().top, EDGE_GAP);

        chrome.banner1 = Some(PixelRect::new(50, 4, 80, 12));
        assert_eq!(chrome.safe_area().top, 16 + EDGE_GAP);
        assert_eq!(chrome.obstruction_bottom(), 16.0);

        // Banner growth moves the safe zone on the next call
        chrome.banner2 = Some(PixelRect::new(50, 20, 80, 16));
        assert_eq!(chrome.safe_area().top, 36 + EDGE_GAP);
    }
}
