//! Screen trait and command type for the terminal UI.

use crossterm::event::KeyEvent;
use ratatui::Frame;

use crate::GameView;

/// Something the player asked the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    /// Start a new game.
    Start,
    /// Reload the persisted session.
    Resume,
    /// Ask the current question draft.
    Ask,
    /// Submit the current guess draft.
    Guess,
    /// Replace the question draft.
    EditQuestion(String),
    /// Replace the guess draft.
    EditGuess(String),
    /// Hide the error banner.
    DismissError,
    /// Reload aggregate statistics.
    RefreshStats,
}

/// The result of handling a key on a screen.
///
/// Screens return this from [`Screen::handle_key`] to drive the
/// [`TuiApp`](crate::tui::TuiApp) event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenCommand {
    /// Nothing to do.
    Stay,
    /// Forward an intent to the controller.
    Intent(UserIntent),
    /// Navigate to the game screen.
    GoToGame,
    /// Navigate to the statistics screen.
    GoToStats,
    /// Exit the application.
    Quit,
}

/// Implemented by each screen of the terminal UI.
///
/// Screens only read [`GameView`] snapshots and emit commands; they never
/// call the controller themselves.
pub trait Screen {
    /// Renders the screen into the provided [`Frame`].
    fn render(&self, frame: &mut Frame, view: &GameView);

    /// Handles a key event and returns the resulting [`ScreenCommand`].
    fn handle_key(&mut self, key: KeyEvent, view: &GameView) -> ScreenCommand;
}
