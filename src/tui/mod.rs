//! Terminal User Interface for Sentinel
//!
//! `sentinel watch <event-id>` follows one investigation:
//! - Canvas graph of the agent trace, updated live
//! - Replay of the stored sequence at the configured cadence
//! - Inspector panel for the selected node

pub mod app;
pub mod msg; // Key bindings (what the user asked for)
pub mod ui;

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{poll, read, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::{debug, warn};

use crate::config::Config;
use crate::trace::{Investigation, TraceFeed, TraceSource};

use app::App;
use msg::key_to_action;

/// Run the TUI for one investigation
pub fn run<S: TraceSource>(
    source: &S,
    investigation_id: &str,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load before touching the terminal so a missing investigation is a plain error
    let investigation = Investigation::open(source, investigation_id, config)?;
    let feed = source.subscribe(investigation_id, investigation.store().last_id())?;
    let mut app = App::new(investigation);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app, ensuring cleanup happens even on error
    let result = run_event_loop(&mut terminal, &mut app, feed, config.tick_rate());

    // Restore terminal - this MUST run even if app fails
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();

    result
}

/// The single dispatcher: keys, subscription drains and replay time are
/// applied one after another on this thread.
fn run_event_loop<B: Backend, F: TraceFeed>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut feed: F,
    tick_rate: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut last_frame = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Wake for input, the next replay tick, or the poll cadence
        let timeout = app
            .investigation
            .replay()
            .time_until_next_tick()
            .map_or(tick_rate, |next| next.min(tick_rate));

        if poll(timeout)? {
            if let Event::Key(key) = read()? {
                if key.kind == KeyEventKind::Press {
                    let action = key_to_action(key.code, key.modifiers, app.show_help);
                    if app.handle_action(action) {
                        debug!("quit");
                        return Ok(());
                    }
                }
            }
        }

        pump_feed(app, &mut feed);

        let now = Instant::now();
        app.on_elapsed(now - last_frame);
        last_frame = now;
    }
}

/// Apply whatever the feed has. A failed drain is retried on the next pass.
fn pump_feed<F: TraceFeed>(app: &mut App, feed: &mut F) {
    match feed.drain() {
        Ok(arrivals) if !arrivals.is_empty() => {
            debug!(count = arrivals.len(), "trace events arrived");
            app.on_arrivals(arrivals);
        }
        Ok(_) => {}
        Err(e) => {
            warn!("trace feed unavailable, retrying: {}", e);
            app.set_status("Trace feed unavailable, retrying...");
        }
    }
}
