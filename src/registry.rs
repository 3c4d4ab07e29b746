use crate::data::{validate, Listing, RawRecord};
use tracing::warn;

/// Lifecycle of a pin's popup overlay.
///
/// `Opening` popups render clipped to the map area; once the camera
/// controller has verified layout, the popup is promoted to `Open` and
/// renders at frame level, above the floating chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Closed,
    Opening,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinGlyph {
    /// Standard teardrop pin in the configured color
    Standard,
    /// Building glyph for the chamber itself
    Landmark,
}

/// The rendered-marker handle for one listing.
#[derive(Debug, Clone)]
pub struct Pin {
    pub popup: PopupState,
    pub visible: bool,
    pub glyph: PinGlyph,
}

/// In-memory store of validated listings and their pins. One pin per
/// listing, created at load; listings are never removed during a session,
/// only shown or hidden by the search filter.
pub struct Registry {
    listings: Vec<Listing>,
    pins: Vec<Pin>,
    rejected: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            listings: Vec::new(),
            pins: Vec::new(),
            rejected: 0,
        }
    }

    /// Validate raw records and create one pin per accepted listing.
    /// Rejected records are logged and counted, never surfaced.
    pub fn from_records(records: &[RawRecord]) -> Self {
        let mut registry = Self::new();

        for record in records {
            match validate(record) {
                Ok(listing) => {
                    let glyph = if listing.is_chamber() {
                        PinGlyph::Landmark
                    } else {
                        PinGlyph::Standard
                    };
                    registry.listings.push(listing);
                    registry.pins.push(Pin {
                        popup: PopupState::Closed,
                        visible: true,
                        glyph,
                    });
                }
                Err(rejection) => {
                    warn!(reason = %rejection, "dropping listing record");
                    registry.rejected += 1;
                }
            }
        }

        registry
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// How many records validation dropped during the load.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn listing(&self, index: usize) -> Option<&Listing> {
        self.listings.get(index)
    }

    pub fn pin(&self, index: usize) -> Option<&Pin> {
        self.pins.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Listing, &Pin)> {
        self.listings
            .iter()
            .zip(&self.pins)
            .enumerate()
            .map(|(i, (listing, pin))| (i, listing, pin))
    }

    /// Close every popup. Idempotent: closing when nothing is open is a
    /// no-op. Returns true if anything was actually open.
    pub fn close_all_popups(&mut self) -> bool {
        let mut any = false;
        for pin in &mut self.pins {
            if pin.popup != PopupState::Closed {
                pin.popup = PopupState::Closed;
                any = true;
            }
        }
        any
    }

    /// Start opening a popup: closes every other popup first, so at most
    /// one popup is ever away from `Closed`.
    pub fn begin_opening(&mut self, index: usize) {
        if index >= self.pins.len() {
            return;
        }
        self.close_all_popups();
        self.pins[index].popup = PopupState::Opening;
    }

    /// Promote an `Opening` popup to `Open` once its layout is verified.
    pub fn promote_open(&mut self, index: usize) -> bool {
        match self.pins.get_mut(index) {
            Some(pin) if pin.popup == PopupState::Opening => {
                pin.popup = PopupState::Open;
                true
            }
            _ => false,
        }
    }

    /// Close a single popup. Returns true if it was not already closed.
    pub fn close_popup(&mut self, index: usize) -> bool {
        match self.pins.get_mut(index) {
            Some(pin) if pin.popup != PopupState::Closed => {
                pin.popup = PopupState::Closed;
                true
            }
            _ => false,
        }
    }

    /// The pin whose popup is currently showing (Opening or Open), if any.
    pub fn showing_popup(&self) -> Option<(usize, PopupState)> {
        self.pins
            .iter()
            .enumerate()
            .find(|(_, pin)| pin.popup != PopupState::Closed)
            .map(|(i, pin)| (i, pin.popup))
    }

    /// Number of pins in state `Open` (the invariant keeps this <= 1).
    pub fn open_count(&self) -> usize {
        self.pins
            .iter()
            .filter(|p| p.popup == PopupState::Open)
            .count()
    }

    /// Show/hide pins by case-folded substring match over the configured
    /// attribute list. Empty term shows everything. Total: unknown or
    /// missing fields simply don't match.
    pub fn filter_by_term(&mut self, term: &str, fields: &[String]) {
        if term.is_empty() {
            for pin in &mut self.pins {
                pin.visible = true;
            }
            return;
        }

        let needle = term.to_lowercase();
        for (listing, pin) in self.listings.iter().zip(&mut self.pins) {
            pin.visible = fields.iter().any(|field| {
                listing
                    .attribute(field)
                    .is_some_and(|value| value.to_lowercase().contains(&needle))
            });
        }
    }

    /// Listing indices ordered for the directory: alphabetical by
    /// case-folded name, load order as the tie-breaker.
    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.listings.len()).collect();
        indices.sort_by_key(|&i| (self.listings[i].name.to_lowercase(), i));
        indices
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawRecord;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn three_listings() -> Registry {
        Registry::from_records(&[
            record(&[("name", "Joe's Coffee"), ("latitude", "39.78"), ("longitude", "-89.65"), ("category", "Cafe")]),
            record(&[("name", "alpha Hardware"), ("latitude", "39.79"), ("longitude", "-89.66")]),
            record(&[("name", "Beta Books"), ("latitude", "39.80"), ("longitude", "-89.67")]),
        ])
    }

    #[test]
    fn test_from_records_drops_invalid_rows() {
        let registry = Registry::from_records(&[
            record(&[("name", "Good Diner"), ("latitude", "39.78"), ("longitude", "-89.65")]),
            record(&[("name", "Bad Diner"), ("longitude", "-89.60")]),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.rejected(), 1);
        assert_eq!(registry.listing(0).unwrap().name, "Good Diner");
    }

    #[test]
    fn test_close_all_is_idempotent() {
        let mut registry = three_listings();
        registry.begin_opening(1);
        registry.promote_open(1);

        assert!(registry.close_all_popups());
        let after_first: Vec<_> = (0..3).map(|i| registry.pin(i).unwrap().popup).collect();
        assert!(!registry.close_all_popups());
        let after_second: Vec<_> = (0..3).map(|i| registry.pin(i).unwrap().popup).collect();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_at_most_one_popup_away_from_closed() {
        let mut registry = three_listings();
        registry.begin_opening(0);
        registry.promote_open(0);
        registry.begin_opening(2);

        assert_eq!(registry.pin(0).unwrap().popup, PopupState::Closed);
        assert_eq!(registry.pin(2).unwrap().popup, PopupState::Opening);
        assert!(registry.open_count() <= 1);
    }

    #[test]
    fn test_promote_requires_opening() {
        let mut registry = three_listings();
        assert!(!registry.promote_open(0));
        registry.begin_opening(0);
        assert!(registry.promote_open(0));
        assert_eq!(registry.open_count(), 1);
    }

    #[test]
    fn test_filter_by_term_matches_configured_fields_only() {
        let mut registry = three_listings();

        registry.filter_by_term("COFFEE", &["name".to_string()]);
        assert!(registry.pin(0).unwrap().visible);
        assert!(!registry.pin(1).unwrap().visible);

        registry.filter_by_term("COFFEE", &["category".to_string()]);
        assert!(!registry.pin(0).unwrap().visible);

        registry.filter_by_term("", &["name".to_string()]);
        assert!((0..3).all(|i| registry.pin(i).unwrap().visible));
    }

    #[test]
    fn test_filter_ignores_unknown_fields() {
        let mut registry = three_listings();
        registry.filter_by_term("joe", &["no_such_field".to_string()]);
        assert!((0..3).all(|i| !registry.pin(i).unwrap().visible));
    }

    #[test]
    fn test_sorted_indices_case_insensitive() {
        let registry = three_listings();
        let order: Vec<&str> = registry
            .sorted_indices()
            .into_iter()
            .map(|i| registry.listing(i).unwrap().name.as_str())
            .collect();
        assert_eq!(order, vec!["alpha Hardware", "Beta Books", "Joe's Coffee"]);
    }

    #[test]
    fn test_chamber_gets_landmark_glyph() {
        let registry = Registry::from_records(&[record(&[
            ("name", "Tavares Chamber of Commerce"),
            ("latitude", "28.8"),
            ("longitude", "-81.7"),
        ])]);
        assert_eq!(registry.pin(0).unwrap().glyph, PinGlyph::Landmark);
    }
}
