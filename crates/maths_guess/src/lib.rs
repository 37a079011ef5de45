//! Maths Guess - client for the number-guessing game service
//!
//! The player starts a session, asks yes/no maths questions about a hidden
//! number and submits guesses until the game is won or lost. The server
//! holds all game state; this crate owns the client side of it.
//!
//! # Architecture
//!
//! - **Session store**: persists the active session id across restarts
//! - **Game API**: typed boundary to the remote service, one call per endpoint
//! - **Controller**: the session state machine every screen reads from
//! - **TUI**: terminal screens that render controller state
//!
//! # Example
//!
//! ```no_run
//! use maths_guess::{GameController, MemorySessionStore, RestGameClient};
//!
//! # async fn example() {
//! let controller = GameController::new(
//!     RestGameClient::new("http://127.0.0.1:8000"),
//!     MemorySessionStore::new(),
//! );
//! controller.start().await;
//! controller.ask("Is it even?").await;
//! println!("can ask again: {}", controller.snapshot().can_ask());
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod config;
mod controller;
mod session_store;
pub mod tui;

// Crate-level exports - Game service boundary
pub use api::{
    AggregateStatistics, Answer, ApiError, ApiErrorKind, AskQuestionRequest, GameApi, GameState,
    GameStatus, GuessOutcome, GuessRequest, GuessValue, Operation, QuestionAnswer, RestGameClient, SessionId,
    StartedGame,
};

// Crate-level exports - Configuration
pub use config::{ClientConfig, ConfigError, SERVER_URL_ENV, SESSION_FILE_ENV};

// Crate-level exports - Controller
pub use controller::{
    ActionOutcome, GameController, GameView, QuestionAnswerRecord, SessionPhase, parse_guess,
};

// Crate-level exports - Session persistence
pub use session_store::{FileSessionStore, MemorySessionStore, SESSION_KEY, SessionStore, StoreError};
