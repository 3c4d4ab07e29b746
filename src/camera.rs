use crate::chrome::{FlyPadding, PixelRect, SafeArea};
use crate::map::Viewport;
use crate::registry::Registry;
use glam::DVec2;
use std::time::{Duration, Instant};
use tracing::debug;

/// Zoom level every focus animation flies to.
pub const FOCUS_ZOOM: f64 = 16.0;
/// Nominal duration of the fly animation.
pub const FLY_DURATION: Duration = Duration::from_millis(1000);
/// The popup opens on a fixed delay slightly past the fly, not on an
/// animation-complete callback, to tolerate late rendering.
pub const POPUP_OPEN_DELAY: Duration = Duration::from_millis(1100);
/// Layout poll cadence and budget while waiting for the popup to measure.
pub const VERIFY_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const VERIFY_POLL_BUDGET: u32 = 10;
/// Delay before the one-shot re-verify that catches late content growth.
pub const REVERIFY_DELAY: Duration = Duration::from_millis(250);
/// Extra pixels added to a corrective pan beyond the exact violation.
pub const CORRECTION_BUFFER: i32 = 20;

/// One camera move, consumed when the fly starts.
#[derive(Debug, Clone, Copy)]
pub struct CameraRequest {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub padding: FlyPadding,
}

/// Everything the controller needs from the world for one tick.
pub struct TickCtx<'a> {
    pub now: Instant,
    pub viewport: &'a mut Viewport,
    pub registry: &'a mut Registry,
    /// Unclipped rect of the popup as last rendered, frame-pixel space.
    pub popup_rect: Option<PixelRect>,
    pub safe: SafeArea,
    /// Full frame size in pixels (popup rects are measured against this).
    pub frame_px: (i32, i32),
}

/// Emitted by [`CameraController::tick`] so the coordinator can observe
/// popup lifecycle without being called into directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraEvent {
    PopupOpened(usize),
}

struct Fly {
    start: Instant,
    from_center: DVec2,
    to_center: DVec2,
    from_zoom: f64,
    to_zoom: f64,
}

enum Phase {
    Idle,
    Flying { fly: Fly, target: usize },
    OpeningPopup { open_at: Instant, target: usize },
    Verifying {
        target: usize,
        polls_left: u32,
        next_poll: Instant,
    },
}

struct Reverify {
    generation: u64,
    due: Instant,
}

/// Drives the fly-then-open-then-verify sequence for a selected pin.
///
/// Each sequence runs under a generation number; starting a new sequence
/// bumps it, so any deferred effect stamped with an older generation is
/// dropped instead of applying a stale correction to the wrong popup.
pub struct CameraController {
    phase: Phase,
    generation: u64,
    reverify: Option<Reverify>,
}

impl CameraController {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            reverify: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// The pin the current sequence is focused on, if one is in flight.
    pub fn target(&self) -> Option<usize> {
        match self.phase {
            Phase::Idle => None,
            Phase::Flying { target, .. }
            | Phase::OpeningPopup { target, .. }
            | Phase::Verifying { target, .. } => Some(target),
        }
    }

    /// Start a focus sequence. Any in-flight sequence is replaced outright
    /// and its deferred effects invalidated.
    pub fn begin_focus(
        &mut self,
        target: usize,
        request: CameraRequest,
        viewport: &Viewport,
        now: Instant,
    ) -> u64 {
        self.generation += 1;

        let to_zoom = request.zoom.clamp(viewport.min_zoom, viewport.max_zoom);
        let fly = Fly {
            start: now,
            from_center: Viewport::mercator(viewport.center_lon, viewport.center_lat),
            to_center: padded_center(&request, to_zoom),
            from_zoom: viewport.zoom,
            to_zoom,
        };
        self.phase = Phase::Flying { fly, target };
        self.generation
    }

    /// Ask for a one-shot re-verify of the showing popup (late content
    /// growth). Stamped with the current generation.
    pub fn request_reverify(&mut self, now: Instant) {
        self.reverify = Some(Reverify {
            generation: self.generation,
            due: now + REVERIFY_DELAY,
        });
    }

    /// Advance the sequence. Call once per frame from the tick loop.
    pub fn tick(&mut self, ctx: &mut TickCtx) -> Option<CameraEvent> {
        let mut event = None;

        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => Phase::Idle,

            Phase::Flying { fly, target } => {
                let elapsed = ctx.now.saturating_duration_since(fly.start);
                if elapsed >= FLY_DURATION {
                    apply_fly(ctx.viewport, &fly, 1.0);
                    Phase::OpeningPopup {
                        open_at: fly.start + POPUP_OPEN_DELAY,
                        target,
                    }
                } else {
                    let t = elapsed.as_secs_f64() / FLY_DURATION.as_secs_f64();
                    apply_fly(ctx.viewport, &fly, ease_in_out_cubic(t));
                    Phase::Flying { fly, target }
                }
            }

            Phase::OpeningPopup { open_at, target } => {
                if ctx.now >= open_at {
                    ctx.registry.begin_opening(target);
                    Phase::Verifying {
                        target,
                        polls_left: VERIFY_POLL_BUDGET,
                        next_poll: ctx.now + VERIFY_POLL_INTERVAL,
                    }
                } else {
                    Phase::OpeningPopup { open_at, target }
                }
            }

            Phase::Verifying {
                target,
                polls_left,
                next_poll,
            } => {
                match ctx.popup_rect.filter(|rect| rect.h > 0) {
                    Some(rect) => {
                        // Layout exists: promote to frame level, then make
                        // sure every edge clears the safe zone.
                        if ctx.registry.promote_open(target) {
                            event = Some(CameraEvent::PopupOpened(target));
                        }
                        correct_position(ctx.viewport, rect, ctx.safe, ctx.frame_px);
                        self.reverify = Some(Reverify {
                            generation: self.generation,
                            due: ctx.now + REVERIFY_DELAY,
                        });
                        Phase::Idle
                    }
                    None if ctx.now >= next_poll => {
                        if polls_left <= 1 {
                            // Give up silently; the popup stays wherever
                            // the renderer put it.
                            debug!(index = target, "popup never acquired layout");
                            Phase::Idle
                        } else {
                            Phase::Verifying {
                                target,
                                polls_left: polls_left - 1,
                                next_poll: ctx.now + VERIFY_POLL_INTERVAL,
                            }
                        }
                    }
                    None => Phase::Verifying {
                        target,
                        polls_left,
                        next_poll,
                    },
                }
            }
        };

        self.run_due_reverify(ctx);
        event
    }

    fn run_due_reverify(&mut self, ctx: &mut TickCtx) {
        let Some(reverify) = self.reverify.take_if(|reverify| ctx.now >= reverify.due) else {
            return;
        };

        if reverify.generation != self.generation {
            debug!("dropping stale popup correction");
            return;
        }
        if let Some(rect) = ctx.popup_rect.filter(|rect| rect.h > 0) {
            correct_position(ctx.viewport, rect, ctx.safe, ctx.frame_px);
        }
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

/// Final camera center so the target sits at the center of the padded
/// sub-viewport: large top padding pushes the target toward the bottom of
/// the screen, leaving the reserved space above it for the popup.
fn padded_center(request: &CameraRequest, to_zoom: f64) -> DVec2 {
    let target = Viewport::mercator(request.longitude, request.latitude);
    let padding = &request.padding;

    let dx = (padding.left - padding.right) / 2.0;
    let dy = (padding.top - padding.bottom) / 2.0;

    target - DVec2::new(dx, dy) / Viewport::scale_at(to_zoom)
}

fn apply_fly(viewport: &mut Viewport, fly: &Fly, k: f64) {
    let center = fly.from_center.lerp(fly.to_center, k);
    let (lon, lat) = Viewport::unmercator(center);
    let zoom = fly.from_zoom + (fly.to_zoom - fly.from_zoom) * k;
    viewport.jump_to(lon, lat, zoom);
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// If any popup edge violates its safe margin, translate the viewport by
/// exactly the violation plus a small buffer. A plain pan, not a re-fly.
/// Returns true if a correction was applied.
fn correct_position(
    viewport: &mut Viewport,
    rect: PixelRect,
    safe: SafeArea,
    frame_px: (i32, i32),
) -> bool {
    let (frame_w, frame_h) = frame_px;

    let top_violation = safe.top - rect.y;
    let bottom_violation = rect.bottom() - (frame_h - safe.bottom);
    let left_violation = safe.left - rect.x;
    let right_violation = rect.right() - (frame_w - safe.right);

    // Positive pan moves the world up/left on screen.
    let mut dx = 0;
    let mut dy = 0;

    if top_violation > 0 {
        dy = -(top_violation + CORRECTION_BUFFER);
    } else if bottom_violation > 0 {
        dy = bottom_violation + CORRECTION_BUFFER;
    }

    if left_violation > 0 {
        dx = -(left_violation + CORRECTION_BUFFER);
    } else if right_violation > 0 {
        dx = right_violation + CORRECTION_BUFFER;
    }

    if dx != 0 || dy != 0 {
        viewport.pan(dx, dy);
        true
    } else {
        false
    }
}
