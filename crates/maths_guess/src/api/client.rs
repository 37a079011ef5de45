//! Typed HTTP client for the game service.

use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use crate::api::error::{ApiError, Operation};
use crate::api::models::{
    AggregateStatistics, AskQuestionRequest, GameStatus, GuessOutcome, GuessRequest, GuessValue,
    QuestionAnswer, StartedGame,
};

/// One operation per game service endpoint.
///
/// The controller only talks to the server through this trait, so tests can
/// swap in a scripted fake.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Creates a brand-new session.
    async fn start_game(&self) -> Result<StartedGame, ApiError>;

    /// Fetches the authoritative status of a session.
    async fn fetch_status(&self, session_id: &str) -> Result<GameStatus, ApiError>;

    /// Asks a yes/no question about the secret number.
    async fn ask_question(
        &self,
        session_id: &str,
        question: &str,
    ) -> Result<QuestionAnswer, ApiError>;

    /// Submits a guess. The server decides whether it is a valid whole number
    /// in range.
    async fn submit_guess(
        &self,
        session_id: &str,
        guess: GuessValue,
    ) -> Result<GuessOutcome, ApiError>;

    /// Tells the server the session is finished so it counts toward statistics.
    async fn end_game(&self, session_id: &str) -> Result<(), ApiError>;

    /// Fetches totals across all finished sessions.
    async fn fetch_statistics(&self) -> Result<AggregateStatistics, ApiError>;

    /// Checks that the server answers at all.
    async fn health(&self) -> Result<(), ApiError>;
}

/// `reqwest` implementation of [`GameApi`].
#[derive(Debug, Clone)]
pub struct RestGameClient {
    base_url: String,
    client: reqwest::Client,
}

impl RestGameClient {
    /// Creates a client for the service rooted at `base_url`.
    #[instrument(skip_all, fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "Creating game service client");
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Returns the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and returns the response only if its status is a success.
    #[instrument(skip(self, body), fields(method = %method))]
    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        op: Operation,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "Sending request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Request failed");
            ApiError::transport(op, e)
        })?;

        let status = response.status();
        debug!(status = %status, "Received response");

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let detail = extract_detail(&text);
        warn!(status = %status, detail = ?detail, "Server rejected request");
        Err(ApiError::from_status(op, status.as_u16(), detail))
    }

    /// Sends a request and decodes a JSON success body.
    async fn send_json<B, T>(
        &self,
        op: Operation,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(op, method, path, body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::transport(op, e))?;
        serde_json::from_str(&text).map_err(|e| {
            error!(error = %e, body = %text, "Failed to decode response");
            ApiError::decode(op, e)
        })
    }
}

#[async_trait]
impl GameApi for RestGameClient {
    #[instrument(skip(self))]
    async fn start_game(&self) -> Result<StartedGame, ApiError> {
        info!("Starting new game");
        let started: StartedGame = self
            .send_json(Operation::Start, Method::POST, "/api/game/start", None::<&()>)
            .await?;
        info!(session_id = %started.game_id, possible = started.possible_count, "Game started");
        Ok(started)
    }

    #[instrument(skip(self))]
    async fn fetch_status(&self, session_id: &str) -> Result<GameStatus, ApiError> {
        let path = format!("/api/game/{}/status", session_id);
        let status: GameStatus = self
            .send_json(Operation::Status, Method::GET, &path, None::<&()>)
            .await?;
        debug!(
            game_state = %status.game_state,
            remaining_questions = status.remaining_questions,
            remaining_guesses = status.remaining_guesses,
            "Got status"
        );
        Ok(status)
    }

    #[instrument(skip(self, question))]
    async fn ask_question(
        &self,
        session_id: &str,
        question: &str,
    ) -> Result<QuestionAnswer, ApiError> {
        info!(question = %question, "Asking question");
        let path = format!("/api/game/{}/question", session_id);
        let body = AskQuestionRequest { question };
        let answer: QuestionAnswer = self
            .send_json(Operation::Question, Method::POST, &path, Some(&body))
            .await?;
        info!(answer = %answer.answer, "Question answered");
        Ok(answer)
    }

    #[instrument(skip(self))]
    async fn submit_guess(
        &self,
        session_id: &str,
        guess: GuessValue,
    ) -> Result<GuessOutcome, ApiError> {
        info!("Submitting guess");
        let path = format!("/api/game/{}/guess", session_id);
        let body = GuessRequest { guess };
        let outcome: GuessOutcome = self
            .send_json(Operation::Guess, Method::POST, &path, Some(&body))
            .await?;
        info!(correct = outcome.correct, game_over = outcome.game_over, "Guess judged");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn end_game(&self, session_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/game/{}/end", session_id);
        self.send(Operation::End, Method::POST, &path, None::<&()>)
            .await?;
        info!("Game reported as ended");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_statistics(&self) -> Result<AggregateStatistics, ApiError> {
        self.send_json(Operation::Stats, Method::GET, "/api/stats", None::<&()>)
            .await
    }

    #[instrument(skip(self))]
    async fn health(&self) -> Result<(), ApiError> {
        self.send(Operation::Health, Method::GET, "/api/health", None::<&()>)
            .await?;
        Ok(())
    }
}

/// Pulls a human-readable message out of an error body.
///
/// FastAPI-style bodies carry either `{"detail": "text"}` or a list of
/// validation entries with a `msg` field.
fn extract_detail(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    match json.get("detail")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_string() {
        let detail = extract_detail(r#"{"detail":"Game session not found."}"#);
        assert_eq!(detail.as_deref(), Some("Game session not found."));
    }

    #[test]
    fn test_extract_detail_validation_list() {
        let body = r#"{"detail":[{"loc":["body","guess"],"msg":"value is not a valid integer"},
            {"loc":["body"],"msg":"field required"}]}"#;
        assert_eq!(
            extract_detail(body).as_deref(),
            Some("value is not a valid integer; field required")
        );
    }

    #[test]
    fn test_extract_detail_missing() {
        assert_eq!(extract_detail("<html>Bad Gateway</html>"), None);
        assert_eq!(extract_detail(r#"{"error":"x"}"#), None);
        assert_eq!(extract_detail(r#"{"detail":"  "}"#), None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = RestGameClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
