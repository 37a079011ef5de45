//! Remote game service boundary: wire types, errors and the HTTP client.

mod client;
mod error;
mod models;

pub use client::{GameApi, RestGameClient};
pub use error::{ApiError, ApiErrorKind, Operation};
pub use models::{
    AggregateStatistics, Answer, AskQuestionRequest, GameState, GameStatus, GuessOutcome,
    GuessRequest, GuessValue, QuestionAnswer, SessionId, StartedGame,
};
