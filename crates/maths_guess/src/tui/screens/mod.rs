//! Individual screens of the terminal UI.

mod game;
mod stats;

pub use game::{GameScreen, InputFocus};
pub use stats::{StatsScreen, StatsState, summary_lines};
