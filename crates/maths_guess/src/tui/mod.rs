//! Terminal UI for Maths Guess.

mod app;
mod screen;
mod screens;

pub use app::TuiApp;
pub use screen::{Screen, ScreenCommand, UserIntent};
pub use screens::{GameScreen, InputFocus, StatsScreen, StatsState, summary_lines};

use std::io;

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};

use crate::{GameApi, GameController, SessionStore};

/// Runs the interactive terminal UI until the player quits.
///
/// The terminal is restored even when the event loop fails.
pub async fn run_tui<A, S>(controller: GameController<A, S>) -> Result<()>
where
    A: GameApi + 'static,
    S: SessionStore + 'static,
{
    info!("Starting Maths Guess TUI");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = TuiApp::new(controller);
    let res = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = ?err, "TUI event loop error");
    }

    res
}
