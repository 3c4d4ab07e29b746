use anyhow::Result;
use bizmap::app::App;
use bizmap::config::ClientConfig;
use bizmap::ui;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    // Run the app
    let result = run(&mut terminal, Path::new(&config_path));

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Diagnostics go to a file when BIZMAP_LOG is set; stderr belongs to the
/// terminal UI.
fn init_tracing() {
    let Ok(filter) = std::env::var("BIZMAP_LOG") else {
        return;
    };
    let Ok(file) = std::fs::File::create("bizmap.log") else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(file)
        .with_ansi(false)
        .init();
}

fn run(terminal: &mut DefaultTerminal, config_path: &Path) -> Result<()> {
    let size = terminal.size()?;
    let start = Instant::now();

    // A broken config is fatal to map creation but not to the UI: the app
    // comes up inert, showing the notice.
    let mut app = match ClientConfig::load(config_path) {
        Ok(config) => App::new(config, size.width, size.height),
        Err(error) => App::with_config_error(error, size.width, size.height, start),
    };
    app.load(start);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| ui::render(frame, &mut app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        handle_key(&mut app, key.code);
                    }
                }
                Event::Mouse(mouse) => {
                    handle_mouse(&mut app, mouse);
                }
                Event::Resize(width, height) => {
                    app.resize(width, height);
                }
                _ => {}
            }
        }

        // Advance animations, popups, slideshow, notices
        app.tick(Instant::now());

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode) {
    // The open directory panel owns the keyboard: typing searches.
    if app.panel.open {
        match code {
            KeyCode::Esc => app.panel.open = false,
            KeyCode::Enter => app.panel_confirm(),
            KeyCode::Up => app.panel_move(-1),
            KeyCode::Down => app.panel_move(1),
            KeyCode::Backspace => app.panel_backspace(),
            KeyCode::Char(ch) => app.panel_type(ch),
            _ => {}
        }
        return;
    }

    match code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Esc => {
            // Esc closes the popup first, then quits
            if app.registry.showing_popup().is_some() {
                app.close_showing_popup();
            } else {
                app.quit();
            }
        }

        KeyCode::Char('b') | KeyCode::Char('B') => app.toggle_panel(),

        // Pan with hjkl or arrow keys
        KeyCode::Left | KeyCode::Char('h') => app.viewport.pan(-10, 0),
        KeyCode::Right | KeyCode::Char('l') => app.viewport.pan(10, 0),
        KeyCode::Up | KeyCode::Char('k') => app.viewport.pan(0, -6),
        KeyCode::Down | KeyCode::Char('j') => app.viewport.pan(0, 6),

        // Zoom
        KeyCode::Char('+') | KeyCode::Char('=') => app.viewport.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.viewport.zoom_out(),

        // Reset view
        KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(),

        _ => {}
    }
}

/// Convert terminal coords to braille pixel coords, accounting for the map
/// border (1 cell offset). Each cell is 2 braille pixels wide, 4 tall.
fn pixel_pos(col: u16, row: u16) -> (i32, i32) {
    (
        (col.saturating_sub(1) as i32) * 2,
        (row.saturating_sub(1) as i32) * 4,
    )
}

/// Handle mouse events for clicking, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => {
            let (px, py) = pixel_pos(mouse.column, mouse.row);
            app.viewport.zoom_in_at(px, py);
        }
        MouseEventKind::ScrollDown => {
            let (px, py) = pixel_pos(mouse.column, mouse.row);
            app.viewport.zoom_out_at(px, py);
        }
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.viewport.pan(-15, 0),
        MouseEventKind::ScrollRight => app.viewport.pan(15, 0),
        // Click selects a pin or chrome element; drag pans
        MouseEventKind::Down(MouseButton::Left) => {
            app.handle_click(mouse.column, mouse.row);
            app.last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            app.handle_drag(mouse.column, mouse.row);
        }
        MouseEventKind::Up(MouseButton::Left) => {
            app.end_drag();
        }
        _ => {}
    }
}
