use crate::camera::{CameraController, CameraRequest, FOCUS_ZOOM};
use crate::chrome::FlyPadding;
use crate::map::Viewport;
use crate::registry::Registry;
use std::time::Instant;
use tracing::debug;

/// Typed cross-module events, drained once per tick. Selection can come
/// from a pin click or a directory pick; popup close can come from inside
/// the popup itself, which is why it is observed here rather than being a
/// direct call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    SelectionRequested(usize),
    PopupOpened(usize),
    PopupClosed(usize),
}

/// Enforces the single-open-popup invariant and wires pin/directory
/// selection to the camera controller.
pub struct SelectionCoordinator {
    current_open: Option<usize>,
    active_entry: Option<usize>,
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        Self {
            current_open: None,
            active_entry: None,
        }
    }

    /// The popup the coordinator believes is open, if any.
    pub fn current_open(&self) -> Option<usize> {
        self.current_open
    }

    /// The directory entry highlighted as active, if any.
    pub fn active_entry(&self) -> Option<usize> {
        self.active_entry
    }

    /// Select a listing: close every open popup, then hand the move to the
    /// camera controller. Out-of-range indices are ignored.
    pub fn select(
        &mut self,
        index: usize,
        registry: &mut Registry,
        camera: &mut CameraController,
        viewport: &Viewport,
        padding: FlyPadding,
        now: Instant,
    ) -> bool {
        let Some(listing) = registry.listing(index) else {
            debug!(index, "selection index out of range");
            return false;
        };
        let request = CameraRequest {
            longitude: listing.longitude,
            latitude: listing.latitude,
            zoom: FOCUS_ZOOM,
            padding,
        };

        registry.close_all_popups();
        self.current_open = None;
        self.active_entry = Some(index);

        camera.begin_focus(index, request, viewport, now);
        true
    }

    /// Close every popup. Idempotent.
    pub fn close_all(&mut self, registry: &mut Registry) {
        registry.close_all_popups();
        self.current_open = None;
    }

    /// Observe one drained event.
    pub fn handle_event(
        &mut self,
        event: MapEvent,
        registry: &mut Registry,
        camera: &mut CameraController,
        viewport: &Viewport,
        padding: FlyPadding,
        now: Instant,
    ) {
        match event {
            MapEvent::SelectionRequested(index) => {
                self.select(index, registry, camera, viewport, padding, now);
            }
            MapEvent::PopupOpened(index) => {
                self.current_open = Some(index);
            }
            MapEvent::PopupClosed(index) => {
                if self.current_open == Some(index) {
                    self.current_open = None;
                }
            }
        }
    }
}

impl Default for SelectionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
