//! Wire types exchanged with the game service.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::EnumString;
use tracing::instrument;

/// Opaque identifier the server assigns to one game.
pub type SessionId = String;

/// Progress of a session as reported by the server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameState {
    /// Questions may still be asked.
    Asking,
    /// Question budget exhausted; only guesses remain.
    GuessOnly,
    /// The secret number was guessed.
    Won,
    /// Guesses ran out.
    Lost,
}

impl GameState {
    /// Returns `true` for `won` and `lost`.
    #[instrument]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Yes/no answer to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Answer {
    /// Yes.
    Yes,
    /// No.
    No,
}

/// Response to `POST /api/game/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedGame {
    /// Id of the freshly created session.
    pub game_id: SessionId,
    /// Whether the server picked a secret number.
    #[serde(default = "secret_number_set_default")]
    pub secret_number_set: bool,
    /// Size of the initial candidate set.
    pub possible_count: u32,
    /// Question budget for the game.
    pub max_questions: u32,
    /// Guess budget for the game.
    pub max_guesses: u32,
}

fn secret_number_set_default() -> bool {
    true
}

/// Authoritative snapshot from `GET /api/game/{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    /// Session id echoed by the server.
    pub game_id: SessionId,
    /// Questions asked so far.
    pub question_count: u32,
    /// Questions left before the game switches to guess-only.
    pub remaining_questions: u32,
    /// Candidates still consistent with the answers.
    pub possible_count: u32,
    /// Guesses made so far.
    pub guess_attempts: u32,
    /// Guesses left.
    pub remaining_guesses: u32,
    /// Current phase.
    pub game_state: GameState,
    /// Set only in the `won` state.
    pub won: bool,
    /// Set iff the state is terminal.
    pub game_over: bool,
}

impl GameStatus {
    /// Checks that the redundant `game_over`/`won` flags agree with `game_state`.
    #[instrument(skip(self), fields(game_state = %self.game_state))]
    pub fn is_consistent(&self) -> bool {
        self.game_over == self.game_state.is_terminal()
            && self.won == (self.game_state == GameState::Won)
    }
}

/// Body of `POST /api/game/{id}/question`.
#[derive(Debug, Clone, Serialize)]
pub struct AskQuestionRequest<'a> {
    /// Question text, already trimmed.
    pub question: &'a str,
}

/// Response to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// The server's verdict.
    pub answer: Answer,
    /// Candidates left after this answer.
    pub possible_count: u32,
    /// Questions asked including this one.
    pub question_count: u32,
    /// Questions left.
    pub remaining_questions: u32,
    /// State after the question.
    pub game_state: GameState,
}

/// A guessed number as typed by the player.
///
/// Whole numbers go over the wire as JSON integers and anything else as a
/// JSON float, so range and integrality checks stay with the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Display)]
#[serde(untagged)]
pub enum GuessValue {
    /// A whole number.
    #[display("{_0}")]
    Whole(i64),
    /// A finite number with a fractional part, or one too large for `i64`.
    #[display("{_0}")]
    Fraction(f64),
}

/// Body of `POST /api/game/{id}/guess`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GuessRequest {
    /// Guessed number, unvalidated.
    pub guess: GuessValue,
}

/// Result of the most recent guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessOutcome {
    /// Whether the guess hit the secret number.
    pub correct: bool,
    /// Whether this guess ended the game.
    pub game_over: bool,
    /// Whether the game was won.
    pub won: bool,
    /// Revealed only once the game is over.
    #[serde(default)]
    pub secret_number: Option<i64>,
    /// Guesses left.
    pub remaining_guesses: u32,
}

/// Cross-session totals from `GET /api/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    /// Finished games.
    pub total_games: u64,
    /// Games won.
    pub wins: u64,
    /// Games lost.
    pub losses: u64,
    /// Questions asked across all finished games.
    pub total_questions: u64,
    /// Fewest questions in a won game, if any game was won.
    #[serde(default)]
    pub best_game_questions: Option<u64>,
    /// Games where the computer guessed.
    #[serde(default)]
    pub mode1_games: u64,
    /// Wins where the computer guessed.
    #[serde(default)]
    pub mode1_wins: u64,
    /// Games where the player guessed.
    #[serde(default)]
    pub mode2_games: u64,
    /// Wins where the player guessed.
    #[serde(default)]
    pub mode2_wins: u64,
}

impl AggregateStatistics {
    /// Win rate as a percentage (0.0–100.0); zero when no games were played.
    #[instrument(skip(self))]
    pub fn win_rate(&self) -> f64 {
        if self.total_games == 0 {
            0.0
        } else {
            (self.wins as f64 / self.total_games as f64) * 100.0
        }
    }

    /// Mean questions per finished game; zero when no games were played.
    #[instrument(skip(self))]
    pub fn average_questions(&self) -> f64 {
        if self.total_games == 0 {
            0.0
        } else {
            self.total_questions as f64 / self.total_games as f64
        }
    }
}
