//! Game service error types.

use derive_more::{Display, Error};
use tracing::instrument;

/// Which remote call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Operation {
    /// `POST /api/game/start`
    #[display("start")]
    Start,
    /// `GET /api/game/{id}/status`
    #[display("status")]
    Status,
    /// `POST /api/game/{id}/question`
    #[display("question")]
    Question,
    /// `POST /api/game/{id}/guess`
    #[display("guess")]
    Guess,
    /// `POST /api/game/{id}/end`
    #[display("end")]
    End,
    /// `GET /api/stats`
    #[display("stats")]
    Stats,
    /// `GET /api/health`
    #[display("health")]
    Health,
}

impl Operation {
    /// Message shown when the server gives no detail.
    #[instrument]
    pub fn fallback_message(self) -> &'static str {
        match self {
            Self::Start => "Failed to start game",
            Self::Status => "Failed to load game",
            Self::Question => "Failed to ask question",
            Self::Guess => "Failed to guess",
            Self::End => "Failed to end game",
            Self::Stats => "Failed to load stats",
            Self::Health => "Game server is not healthy",
        }
    }
}

/// Failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ApiErrorKind {
    /// Server unreachable or the connection broke.
    #[display("transport")]
    Transport,
    /// A success response whose body could not be decoded.
    #[display("decode")]
    Decode,
    /// The server does not know the session.
    #[display("not found")]
    NotFound,
    /// Any other non-success status.
    #[display("server status {}", status)]
    Server {
        /// HTTP status code.
        status: u16,
    },
}

/// Error returned by every [`GameApi`](crate::GameApi) call.
///
/// `Display` yields only the human-readable message; the location is kept
/// for logs.
#[derive(Debug, Clone, Display, Error)]
#[display("{}", message)]
pub struct ApiError {
    /// Failure category.
    pub kind: ApiErrorKind,
    /// Message fit for the player.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ApiError {
    /// Creates a new error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Network failure with a generic message.
    #[track_caller]
    pub fn transport(op: Operation, err: impl std::fmt::Display) -> Self {
        Self::new(
            ApiErrorKind::Transport,
            format!("{}: network error ({})", op.fallback_message(), err),
        )
    }

    /// Undecodable success body.
    #[track_caller]
    pub fn decode(op: Operation, err: impl std::fmt::Display) -> Self {
        Self::new(
            ApiErrorKind::Decode,
            format!("{}: malformed response ({})", op.fallback_message(), err),
        )
    }

    /// Non-success status, using the server detail when present.
    #[track_caller]
    pub fn from_status(op: Operation, status: u16, detail: Option<String>) -> Self {
        let kind = if status == 404 {
            ApiErrorKind::NotFound
        } else {
            ApiErrorKind::Server { status }
        };
        let message = detail
            .unwrap_or_else(|| format!("{} (HTTP {})", op.fallback_message(), status));
        Self::new(kind, message)
    }

    /// Returns `true` when the server reported the session unknown.
    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}
