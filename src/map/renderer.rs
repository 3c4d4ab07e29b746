use crate::braille::BrailleCanvas;
use crate::map::geometry::draw_line;
use crate::map::projection::Viewport;
use ratatui::style::Color;

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// One named linework layer of the basemap (roads, water, parks, ...).
pub struct BasemapLayer {
    pub name: String,
    pub lines: Vec<LineString>,
    pub color: Color,
}

/// A single entry of the brand restyle mapping: any layer whose name
/// contains the predicate substring gets its color overridden.
pub struct StyleRule {
    pub name_contains: &'static str,
    pub color: Color,
}

/// The fixed brand palette applied over whatever layer names the client's
/// basemap files carry. First matching rule wins.
pub const BRAND_RULES: &[StyleRule] = &[
    StyleRule { name_contains: "water", color: Color::Rgb(0x78, 0xb6, 0xe4) },
    StyleRule { name_contains: "ocean", color: Color::Rgb(0xad, 0xd3, 0xf0) },
    StyleRule { name_contains: "motorway", color: Color::Rgb(0xcd, 0x29, 0x2c) },
    StyleRule { name_contains: "highway", color: Color::Rgb(0xcd, 0x29, 0x2c) },
    StyleRule { name_contains: "road", color: Color::Rgb(0xcd, 0x29, 0x2c) },
    StyleRule { name_contains: "street", color: Color::Rgb(0x93, 0x95, 0x98) },
    StyleRule { name_contains: "park", color: Color::Rgb(0xb3, 0xdd, 0xc0) },
    StyleRule { name_contains: "golf", color: Color::Rgb(0xb3, 0xdd, 0xc0) },
    StyleRule { name_contains: "airport", color: Color::Rgb(0xb3, 0xdd, 0xc0) },
    StyleRule { name_contains: "boundary", color: Color::Rgb(0x4a, 0x4a, 0x4a) },
];

/// Basemap renderer over named linework layers.
pub struct BasemapRenderer {
    layers: Vec<BasemapLayer>,
    default_color: Color,
}

impl BasemapRenderer {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            default_color: Color::DarkGray,
        }
    }

    /// Add a named layer. Layers render in insertion order, first at the back.
    pub fn add_layer(&mut self, name: &str, lines: Vec<LineString>) {
        self.layers.push(BasemapLayer {
            name: name.to_string(),
            lines,
            color: self.default_color,
        });
    }

    /// Check if any basemap data is loaded
    pub fn has_data(&self) -> bool {
        self.layers.iter().any(|l| !l.lines.is_empty())
    }

    pub fn layers(&self) -> &[BasemapLayer] {
        &self.layers
    }

    /// One-time brand restyle pass: recolor layers whose names match the
    /// rule predicates. Call once after all layers are loaded; layers added
    /// later keep the default color.
    pub fn apply_brand_style(&mut self, rules: &[StyleRule]) {
        for layer in &mut self.layers {
            let name = layer.name.to_lowercase();
            if let Some(rule) = rules.iter().find(|r| name.contains(r.name_contains)) {
                layer.color = rule.color;
            }
        }
    }

    /// Render each layer to its own canvas so the UI can color them
    /// independently. Canvas dimensions are in character cells.
    pub fn render(&self, cols: usize, rows: usize, viewport: &Viewport) -> Vec<(BrailleCanvas, Color)> {
        self.layers
            .iter()
            .filter(|layer| !layer.lines.is_empty())
            .map(|layer| {
                let mut canvas = BrailleCanvas::new(cols, rows);
                for line in &layer.lines {
                    draw_linestring(&mut canvas, line, viewport);
                }
                (canvas, layer.color)
            })
            .collect()
    }
}

impl Default for BasemapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw a linestring with viewport culling
fn draw_linestring(canvas: &mut BrailleCanvas, line: &LineString, viewport: &Viewport) {
    if line.len() < 2 {
        return;
    }

    let mut prev: Option<(i32, i32)> = None;

    for &(lon, lat) in line {
        let (px, py) = viewport.project(lon, lat);

        if let Some((prev_x, prev_y)) = prev {
            let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
            if dist < viewport.width && viewport.line_might_be_visible((prev_x, prev_y), (px, py)) {
                draw_line(canvas, prev_x, prev_y, px, py);
            }
        }

        prev = Some((px, py));
    }
}
