mod geometry;
mod projection;
mod renderer;

pub use geometry::{draw_circle, draw_line};
pub use projection::Viewport;
pub use renderer::{BasemapRenderer, LineString, StyleRule, BRAND_RULES};
