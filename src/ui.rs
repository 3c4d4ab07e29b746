use crate::app::App;
use crate::braille::BrailleCanvas;
use crate::chrome::{PixelRect, BANNER_STACK_GAP};
use crate::data::Listing;
use crate::map::draw_circle;
use crate::registry::{PinGlyph, PopupState};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame,
};

const POPUP_WIDTH: u16 = 40;
const PANEL_WIDTH: u16 = 34;

/// Render the UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Split into map area and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    app.popup_measured = None;
    app.popup_cells = None;
    app.popup_close_cell = None;
    let showing = app.registry.showing_popup();

    render_map(frame, app, chunks[0]);

    // An Opening popup lives inside the map's stacking context: the
    // floating chrome draws over it. Once Open it has been re-homed to
    // frame level and draws above the chrome.
    if matches!(showing, Some((_, PopupState::Opening))) {
        render_popup(frame, app, chunks[0], area);
    }

    render_chrome(frame, app, chunks[0]);

    if app.panel.open {
        render_panel(frame, app, chunks[0]);
    } else {
        app.panel_cells = None;
    }

    if matches!(showing, Some((_, PopupState::Open))) {
        render_popup(frame, app, chunks[0], area);
    }

    render_notices(frame, app, area);
    render_status_bar(frame, app, chunks[1]);
}

fn render_map(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", app.config.client.name),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !app.map_ready {
        return;
    }

    // Render at the actual inner size; braille gives 2x4 per character.
    let mut viewport = app.viewport.clone();
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    let layers = app
        .basemap
        .render(inner.width as usize, inner.height as usize, &viewport);

    // Halo around the pin the camera is working on or showing
    let focus = app
        .registry
        .showing_popup()
        .map(|(i, _)| i)
        .or_else(|| app.camera.target());
    let halo = focus.and_then(|i| app.registry.listing(i)).map(|listing| {
        let (px, py) = viewport.project(listing.longitude, listing.latitude);
        let mut canvas = BrailleCanvas::new(inner.width as usize, inner.height as usize);
        draw_circle(&mut canvas, px, py, 5);
        canvas
    });

    // Pin glyphs and, close up, name labels
    let pin_color = app.config.pin_color();
    let custom_glyph = app.config.pins.glyph;
    let mut pins = Vec::new();
    let mut labels = Vec::new();
    for (index, listing, pin) in app.registry.iter() {
        if !pin.visible {
            continue;
        }
        let (px, py) = viewport.project(listing.longitude, listing.latitude);
        if !viewport.is_visible(px, py) || px < 0 || py < 0 {
            continue;
        }
        let (col, row) = ((px / 2) as u16, (py / 4) as u16);
        if col >= inner.width || row >= inner.height {
            continue;
        }

        let glyph = match pin.glyph {
            PinGlyph::Landmark => '⌂',
            PinGlyph::Standard => custom_glyph.unwrap_or('◉'),
        };
        let style = if Some(index) == focus {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(pin_color)
        };
        pins.push((col, row, glyph, style));

        if viewport.zoom >= 14.0 {
            let label: String = listing.name.chars().take(18).collect();
            labels.push((col + 2, row, label, Style::default().fg(Color::Gray)));
        }
    }

    frame.render_widget(
        MapWidget {
            layers,
            halo,
            pins,
            labels,
        },
        inner,
    );
}

/// Composites braille layers, the focus halo, pin glyphs, and labels.
struct MapWidget {
    layers: Vec<(BrailleCanvas, Color)>,
    halo: Option<BrailleCanvas>,
    pins: Vec<(u16, u16, char, Style)>,
    labels: Vec<(u16, u16, String, Style)>,
}

impl MapWidget {
    fn render_canvas(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for cy in 0..canvas.height().min(area.height as usize) {
            for cx in 0..canvas.width().min(area.width as usize) {
                if let Some(ch) = canvas.cell_char(cx, cy) {
                    let x = area.x + cx as u16;
                    let y = area.y + cy as u16;
                    buf[(x, y)].set_char(ch).set_fg(color);
                }
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for (canvas, color) in &self.layers {
            Self::render_canvas(canvas, *color, area, buf);
        }
        if let Some(halo) = &self.halo {
            Self::render_canvas(halo, Color::Yellow, area, buf);
        }

        for (col, row, text, style) in &self.labels {
            let y = area.y + row;
            for (i, ch) in text.chars().enumerate() {
                let x = area.x + col + i as u16;
                if x < area.x + area.width && y < area.y + area.height {
                    buf[(x, y)].set_char(ch).set_style(*style);
                }
            }
        }

        for (col, row, glyph, style) in &self.pins {
            let x = area.x + col;
            let y = area.y + row;
            if x < area.x + area.width && y < area.y + area.height {
                buf[(x, y)].set_char(*glyph).set_style(*style);
            }
        }
    }
}

/// Floating chrome: client block, banners, brand logo. Their rects are
/// recorded every frame so the obstruction model sees live geometry.
fn render_chrome(frame: &mut Frame, app: &mut App, area: Rect) {
    app.chrome.client_block = None;
    app.chrome.banner1 = None;
    app.chrome.banner2 = None;
    app.chrome.brand = None;

    // Client block, top left
    let name = format!(" {} · [b] businesses ", app.config.client.name);
    let width = (name.chars().count() as u16).min(area.width.saturating_sub(4));
    if width > 4 && area.height > 6 {
        let rect = Rect::new(area.x + 2, area.y + 1, width, 1);
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(truncate(&name, width as usize))
                .style(Style::default().fg(Color::White).bg(Color::Rgb(0x00, 0x1f, 0x3f))),
            rect,
        );
        app.chrome.client_block = Some(PixelRect::from_cells(rect));
    }

    // Banner 1, premium position: top center
    let mut stack_bottom = area.y + 1;
    if let Some(banner) = &app.config.banners.premium {
        if let Some(rect) = banner_rect(area, stack_bottom, &banner.text) {
            draw_banner(frame, rect, &banner.text, "✦ sponsor");
            app.chrome.banner1 = Some(PixelRect::from_cells(rect));
            stack_bottom = rect.y + rect.height;
        }
    }

    // Banner 2, rotating slideshow, stacked below banner 1 with a gap
    // recomputed from banner 1's actual height.
    if !app.config.banners.rotating.is_empty() {
        let index = app.chrome.slideshow.index % app.config.banners.rotating.len();
        let banner = &app.config.banners.rotating[index];
        let top = stack_bottom + BANNER_STACK_GAP;
        if let Some(rect) = banner_rect(area, top, &banner.text) {
            draw_banner(frame, rect, &banner.text, "sponsor");
            app.chrome.banner2 = Some(PixelRect::from_cells(rect));
        }
    }

    // Brand logo block, bottom right
    if let Some(brand) = &app.config.brand {
        let width = (brand.text.chars().count() as u16 + 2).min(area.width.saturating_sub(4));
        if width > 2 && area.height > 8 {
            let rect = Rect::new(
                area.x + area.width.saturating_sub(width + 2),
                area.y + area.height.saturating_sub(2),
                width,
                1,
            );
            frame.render_widget(Clear, rect);
            frame.render_widget(
                Paragraph::new(format!(" {} ", truncate(&brand.text, width as usize - 2)))
                    .style(Style::default().fg(Color::Black).bg(Color::Gray)),
                rect,
            );
            app.chrome.brand = Some(PixelRect::from_cells(rect));
        }
    }
}

/// Centered banner rect; height grows to two text rows for long copy, so
/// banner geometry genuinely depends on content.
fn banner_rect(area: Rect, top: u16, text: &str) -> Option<Rect> {
    if area.width < 20 || top + 4 >= area.y + area.height {
        return None;
    }
    let max_width = (area.width / 2).max(24).min(area.width.saturating_sub(4));
    let len = text.chars().count() as u16;
    let text_rows = if len + 2 > max_width { 2 } else { 1 };
    let width = (len + 4).min(max_width);
    let x = area.x + (area.width - width) / 2;
    Some(Rect::new(x, top, width, text_rows + 2))
}

fn draw_banner(frame: &mut Frame, rect: Rect, text: &str, title: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(Color::Yellow),
        ));
    frame.render_widget(Clear, rect);
    let inner_width = rect.width.saturating_sub(2) as usize;
    frame.render_widget(
        Paragraph::new(wrap_text(text, inner_width).join("\n"))
            .style(Style::default().fg(Color::White))
            .block(block),
        rect,
    );
}

fn render_panel(frame: &mut Frame, app: &mut App, area: Rect) {
    let width = PANEL_WIDTH.min(area.width.saturating_sub(6));
    let top = area.y + 3;
    let height = area.height.saturating_sub(5);
    if width < 10 || height < 4 {
        app.panel_cells = None;
        return;
    }
    let rect = Rect::new(area.x + 1, top, width, height);
    frame.render_widget(Clear, rect);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            format!(" Businesses ({}) ", app.panel.entries.len()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    let mut list_top = inner.y;
    if app.config.search.enabled {
        let query_line = if app.panel.query.is_empty() {
            Line::from(Span::styled(
                truncate(&app.config.search.placeholder, inner.width as usize),
                Style::default().fg(Color::DarkGray),
            ))
        } else {
            Line::from(vec![
                Span::styled("/", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    truncate(&app.panel.query, inner.width as usize - 1),
                    Style::default().fg(Color::White),
                ),
            ])
        };
        frame.render_widget(Paragraph::new(query_line), Rect::new(inner.x, inner.y, inner.width, 1));
        list_top += 1;
    }

    let visible_rows = (inner.y + inner.height).saturating_sub(list_top) as usize;
    // Keep the cursor in view
    let mut scroll = app.panel_scroll;
    if app.panel.cursor < scroll {
        scroll = app.panel.cursor;
    } else if visible_rows > 0 && app.panel.cursor >= scroll + visible_rows {
        scroll = app.panel.cursor - visible_rows + 1;
    }
    app.panel_scroll = scroll;

    let rows: Vec<(usize, usize)> = app
        .panel
        .entries
        .iter()
        .copied()
        .enumerate()
        .skip(scroll)
        .take(visible_rows)
        .collect();
    for (row, entry) in rows {
        let Some(listing) = app.registry.listing(entry) else {
            continue;
        };
        let y = list_top + (row - scroll) as u16;
        let is_cursor = row == app.panel.cursor;
        let is_active = app.coordinator.active_entry() == Some(entry);

        let mut style = Style::default().fg(Color::White);
        if is_active {
            style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
        }
        if is_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        let marker = if is_active { "▸ " } else { "  " };
        let text = truncate(&format!("{marker}{}", listing.name), inner.width as usize);
        frame.render_widget(
            Paragraph::new(text).style(style),
            Rect::new(inner.x, y, inner.width, 1),
        );
    }

    app.panel_cells = Some(rect);
    app.panel_list_row0 = list_top;
}

/// Popup overlay. While `Opening` it stays clipped to the map area; once
/// `Open` it draws at frame level, above the floating chrome. The
/// unclipped rect is recorded as this frame's measurement.
fn render_popup(frame: &mut Frame, app: &mut App, map_area: Rect, frame_area: Rect) {
    let Some((index, state)) = app.registry.showing_popup() else {
        return;
    };
    let Some(listing) = app.registry.listing(index) else {
        return;
    };

    let inner = Rect::new(
        map_area.x + 1,
        map_area.y + 1,
        map_area.width.saturating_sub(2),
        map_area.height.saturating_sub(2),
    );

    let width = POPUP_WIDTH.min(frame_area.width.saturating_sub(4)) as i32;
    if width < 12 {
        return;
    }
    let lines = popup_lines(listing, width as usize - 2);
    let height = lines.len() as i32 + 2;

    // Anchored above the pin, centered
    let (px, py) = app.viewport.project(listing.longitude, listing.latitude);
    let anchor_col = inner.x as i32 + px / 2;
    let anchor_row = inner.y as i32 + py / 4;
    let x = anchor_col - width / 2;
    let y = anchor_row - height - 1;

    // Measurement is the unclipped rect, like a DOM bounding box that can
    // extend past the viewport.
    app.popup_measured = Some(PixelRect::new(x * 2, y * 4, width * 2, height * 4));

    let clip = match state {
        PopupState::Opening => inner,
        _ => frame_area,
    };
    let Some(draw) = intersect(x, y, width, height, clip) else {
        return;
    };

    frame.render_widget(Clear, draw);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));
    frame.render_widget(Paragraph::new(lines).block(block), draw);

    // Close control in the top-right corner
    if draw.width >= 3 {
        let close = (draw.x + draw.width - 2, draw.y);
        frame
            .buffer_mut()[close]
            .set_char('✕')
            .set_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD));
        app.popup_close_cell = Some(close);
    }
    app.popup_cells = Some(draw);
}

/// Popup content: only fields with values appear.
fn popup_lines(listing: &Listing, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    lines.push(Line::from(Span::styled(
        truncate(&listing.name, width),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));

    if let Some(category) = &listing.category {
        lines.push(Line::from(Span::styled(
            truncate(category, width),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    if let Some(address) = &listing.address {
        lines.push(Line::from(truncate(address, width)));
        let mut locality = String::new();
        if let Some(city) = &listing.city {
            locality.push_str(city);
        }
        if let Some(state) = &listing.state {
            if !locality.is_empty() {
                locality.push_str(", ");
            }
            locality.push_str(state);
        }
        if let Some(zip) = &listing.zip {
            if !locality.is_empty() {
                locality.push(' ');
            }
            locality.push_str(zip);
        }
        if !locality.is_empty() {
            lines.push(Line::from(truncate(&locality, width)));
        }
    }

    if let Some(link) = listing.call_link() {
        lines.push(Line::from(vec![
            Span::styled("☎ ", Style::default().fg(Color::Green)),
            Span::raw(truncate(&link, width.saturating_sub(2))),
        ]));
    }

    if let Some(description) = &listing.description {
        for wrapped in wrap_text(description, width).into_iter().take(4) {
            lines.push(Line::from(Span::styled(
                wrapped,
                Style::default().fg(Color::Gray),
            )));
        }
    }

    if let Some(website) = listing.website_link() {
        lines.push(Line::from(vec![
            Span::styled("↗ ", Style::default().fg(Color::Blue)),
            Span::styled(
                truncate(website, width.saturating_sub(2)),
                Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            ),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled("↗ ", Style::default().fg(Color::Blue)),
        Span::styled(
            truncate(&listing.directions_link(), width.saturating_sub(2)),
            Style::default().fg(Color::Blue),
        ),
    ]));

    // Business card image placeholder; arrives as extra height, which the
    // camera's re-verify pass has to account for.
    if let Some(card) = &listing.business_card {
        lines.push(Line::from(Span::styled(
            "─".repeat(width),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(Span::styled(
            truncate(&format!("▦ {card}"), width),
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines
}

fn render_notices(frame: &mut Frame, app: &App, area: Rect) {
    for (i, notice) in app.notices.iter().enumerate() {
        let width = (notice.message.chars().count() as u16 + 4).min(area.width.saturating_sub(2));
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + 1 + (i as u16) * 3;
        if y + 3 > area.y + area.height {
            break;
        }
        let rect = Rect::new(x, y, width, 3);
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(truncate(&notice.message, (width as usize).saturating_sub(2)))
                .style(Style::default().fg(Color::White).bg(Color::Red))
                .block(Block::default().borders(Borders::ALL)),
            rect,
        );
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let visible = app
        .registry
        .iter()
        .filter(|(_, _, pin)| pin.visible)
        .count();

    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_label(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_label(), Style::default().fg(Color::Cyan)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{visible}/{} pins", app.registry.len()),
            Style::default().fg(Color::Green),
        ),
    ];
    if app.registry.rejected() > 0 {
        spans.push(Span::styled(
            format!(" ({} dropped)", app.registry.rejected()),
            Style::default().fg(Color::Red),
        ));
    }
    spans.push(Span::styled(
        if app.panel.open {
            " | type to search, enter to jump, esc to close"
        } else {
            " | b:businesses hjkl:pan +/-:zoom r:reset q:quit"
        },
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Greedy word wrap; long words are split hard.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(current);
            current = word.to_string();
        }
        while current.chars().count() > width {
            let head: String = current.chars().take(width).collect();
            let tail: String = current.chars().skip(width).collect();
            lines.push(head);
            current = tail;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Intersect an unclipped popup rect (possibly negative origin) with a
/// clip region, in cell coordinates.
fn intersect(x: i32, y: i32, w: i32, h: i32, clip: Rect) -> Option<Rect> {
    let x0 = x.max(clip.x as i32);
    let y0 = y.max(clip.y as i32);
    let x1 = (x + w).min(clip.x as i32 + clip.width as i32);
    let y1 = (y + h).min(clip.y as i32 + clip.height as i32);
    if x1 - x0 < 2 || y1 - y0 < 2 {
        return None;
    }
    Some(Rect::new(
        x0 as u16,
        y0 as u16,
        (x1 - x0) as u16,
        (y1 - y0) as u16,
    ))
}
