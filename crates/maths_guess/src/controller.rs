//! Game session controller: the state machine behind every screen.
//!
//! The controller owns which session is active, what the player may do next,
//! and the locally accumulated question history. Counters and game state are
//! never inferred from a mutation's own response; every `ask`/`guess` is
//! followed by a status fetch and only that fetch updates [`SessionPhase`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use derive_getters::Getters;
use derive_new::new;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{
    AggregateStatistics, Answer, ApiError, GameApi, GameState, GameStatus, GuessOutcome, GuessValue,
    SessionId,
};
use crate::session_store::SessionStore;

/// Where the controller stands with respect to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing persisted and nothing in flight.
    NoSession,
    /// A session id is known and its first status fetch is pending.
    Loading {
        /// Session being loaded.
        session_id: SessionId,
    },
    /// Status is known.
    Ready {
        /// Active session.
        session_id: SessionId,
        /// Latest authoritative snapshot.
        status: GameStatus,
    },
    /// Starting a game failed.
    Error {
        /// Message shown to the player.
        message: String,
        /// Session that was active before the failure, if any.
        last_known_session: Option<SessionId>,
    },
}

impl SessionPhase {
    /// Id of the session currently being loaded or played.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Loading { session_id } | Self::Ready { session_id, .. } => Some(session_id),
            Self::NoSession | Self::Error { .. } => None,
        }
    }

    /// Latest status snapshot, only in `Ready`.
    pub fn status(&self) -> Option<&GameStatus> {
        match self {
            Self::Ready { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// One question the player asked and the server's answer.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct QuestionAnswerRecord {
    /// Trimmed question text.
    pub question: String,
    /// Answer returned for it.
    pub answer: Answer,
}

/// What happened to a user intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action and its follow-up refresh completed.
    Applied,
    /// A local precondition failed; no network call was made.
    Rejected,
    /// Another action is still in flight.
    Busy,
    /// A remote call failed; the error is in [`GameView::error`].
    Failed,
    /// The session changed while the call was in flight; the result was dropped.
    Stale,
}

/// Snapshot of controller state for rendering.
#[derive(Debug, Clone, Getters)]
pub struct GameView {
    phase: SessionPhase,
    history: Vec<QuestionAnswerRecord>,
    last_guess: Option<GuessOutcome>,
    error: Option<String>,
    busy: bool,
    question_input: String,
    guess_input: String,
}

impl GameView {
    fn empty(phase: SessionPhase) -> Self {
        Self {
            phase,
            history: Vec::new(),
            last_guess: None,
            error: None,
            busy: false,
            question_input: String::new(),
            guess_input: String::new(),
        }
    }

    /// Latest status snapshot, if the session is ready.
    pub fn status(&self) -> Option<&GameStatus> {
        self.phase.status()
    }

    /// Id of the active session.
    pub fn session_id(&self) -> Option<&str> {
        self.phase.session_id()
    }

    /// Whether a question may be asked right now.
    pub fn can_ask(&self) -> bool {
        self.status()
            .is_some_and(|s| s.game_state == GameState::Asking)
    }

    /// Whether the current game has finished.
    pub fn is_game_over(&self) -> bool {
        self.status().is_some_and(|s| s.game_over)
    }

    /// Whether a guess may be submitted right now.
    pub fn can_guess(&self) -> bool {
        self.status().is_some() && !self.is_game_over() && !self.busy
    }
}

#[derive(Debug)]
struct ControllerInner {
    view: GameView,
    /// Bumped whenever the active session is replaced or dropped.
    epoch: u64,
    /// Last session whose end was reported.
    reported: Option<SessionId>,
    /// End-of-game reports not yet collected.
    reports: Vec<JoinHandle<()>>,
}

/// Releases the busy flag on every exit path.
///
/// Must be created after any lock on the state has been released, since its
/// `Drop` takes the same lock.
struct BusyGuard {
    state: Arc<Mutex<ControllerInner>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        lock(&self.state).view.busy = false;
    }
}

fn lock(state: &Mutex<ControllerInner>) -> MutexGuard<'_, ControllerInner> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parses guess input. Blank, non-numeric and non-finite input is rejected;
/// every finite number is passed on for the server to judge.
#[instrument]
pub fn parse_guess(input: &str) -> Option<GuessValue> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(GuessValue::Whole(value));
    }
    let value = trimmed.parse::<f64>().ok().filter(|v| v.is_finite())?;
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(GuessValue::Whole(value as i64))
    } else {
        Some(GuessValue::Fraction(value))
    }
}

/// Drives one player's game sessions against a [`GameApi`].
///
/// Cloning is cheap and clones share state. The state lock is never held
/// across a network call; a single busy flag serializes intents.
#[derive(Debug)]
pub struct GameController<A, S> {
    api: Arc<A>,
    store: Arc<S>,
    state: Arc<Mutex<ControllerInner>>,
}

impl<A, S> Clone for GameController<A, S> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
        }
    }
}

impl<A, S> GameController<A, S>
where
    A: GameApi + 'static,
    S: SessionStore + 'static,
{
    /// Creates a controller, reading any persisted session id.
    ///
    /// Starts in [`SessionPhase::Loading`] when an id was persisted; call
    /// [`GameController::resume`] to fetch its status.
    #[instrument(skip_all)]
    pub fn new(api: A, store: S) -> Self {
        let (phase, error) = match store.load() {
            Ok(Some(session_id)) => {
                info!(session_id = %session_id, "Found persisted session");
                (SessionPhase::Loading { session_id }, None)
            }
            Ok(None) => {
                debug!("No persisted session");
                (SessionPhase::NoSession, None)
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                (SessionPhase::NoSession, Some(e.message))
            }
        };

        let mut view = GameView::empty(phase);
        view.error = error;

        Self {
            api: Arc::new(api),
            store: Arc::new(store),
            state: Arc::new(Mutex::new(ControllerInner {
                view,
                epoch: 0,
                reported: None,
                reports: Vec::new(),
            })),
        }
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> GameView {
        lock(&self.state).view.clone()
    }

    /// Replaces the question input draft.
    pub fn set_question_input(&self, text: impl Into<String>) {
        lock(&self.state).view.question_input = text.into();
    }

    /// Replaces the guess input draft.
    pub fn set_guess_input(&self, text: impl Into<String>) {
        lock(&self.state).view.guess_input = text.into();
    }

    /// Dismisses the error banner.
    pub fn dismiss_error(&self) {
        lock(&self.state).view.error = None;
    }

    fn busy_guard(&self) -> BusyGuard {
        BusyGuard {
            state: Arc::clone(&self.state),
        }
    }

    fn is_current(inner: &ControllerInner, epoch: u64, session_id: &str) -> bool {
        inner.epoch == epoch && inner.view.phase.session_id() == Some(session_id)
    }

    /// Starts a brand-new game, abandoning any current one.
    #[instrument(skip(self))]
    pub async fn start(&self) -> ActionOutcome {
        let epoch = {
            let mut inner = lock(&self.state);
            if inner.view.busy {
                debug!("Start ignored while busy");
                return ActionOutcome::Busy;
            }
            inner.view.busy = true;
            inner.view.error = None;
            inner.view.history.clear();
            inner.view.last_guess = None;
            inner.view.question_input.clear();
            inner.view.guess_input.clear();
            inner.epoch += 1;
            inner.epoch
        };
        let _busy = self.busy_guard();

        info!("Starting new game");
        let started = match self.api.start_game().await {
            Ok(started) => started,
            Err(e) => {
                error!(error = %e, kind = %e.kind, "Failed to start game");
                let mut inner = lock(&self.state);
                if inner.epoch != epoch {
                    return ActionOutcome::Stale;
                }
                let last_known_session = inner
                    .view
                    .phase
                    .session_id()
                    .map(str::to_string)
                    .or_else(|| self.store.load().ok().flatten());
                inner.view.error = Some(e.message.clone());
                inner.view.phase = SessionPhase::Error {
                    message: e.message,
                    last_known_session,
                };
                return ActionOutcome::Failed;
            }
        };

        let session_id = started.game_id;
        {
            let mut inner = lock(&self.state);
            if inner.epoch != epoch {
                debug!(session_id = %session_id, "Discarding stale start");
                return ActionOutcome::Stale;
            }
            if let Err(e) = self.store.save(&session_id) {
                warn!(error = %e, "Session will not survive a restart");
                inner.view.error = Some(e.message);
            }
            inner.view.phase = SessionPhase::Loading {
                session_id: session_id.clone(),
            };
        }
        info!(session_id = %session_id, max_questions = started.max_questions, max_guesses = started.max_guesses, "Game created");

        match self.refresh(epoch, &session_id).await {
            Ok(_) => ActionOutcome::Applied,
            Err(outcome) => outcome,
        }
    }

    /// Loads the persisted session (or the last known one after an error)
    /// and fetches its status.
    ///
    /// Switching to a session other than the one shown starts from an empty
    /// history, as `start` does.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> ActionOutcome {
        let (epoch, session_id) = {
            let mut inner = lock(&self.state);
            if inner.view.busy {
                return ActionOutcome::Busy;
            }
            let persisted = match self.store.load() {
                Ok(persisted) => persisted,
                Err(e) => {
                    warn!(error = %e, "Failed to read persisted session");
                    None
                }
            };
            let fallback = match &inner.view.phase {
                SessionPhase::Loading { session_id } | SessionPhase::Ready { session_id, .. } => {
                    Some(session_id.clone())
                }
                SessionPhase::Error {
                    last_known_session, ..
                } => last_known_session.clone(),
                SessionPhase::NoSession => None,
            };
            let Some(session_id) = persisted.or(fallback) else {
                debug!("Nothing to resume");
                inner.view.phase = SessionPhase::NoSession;
                return ActionOutcome::Rejected;
            };
            if inner.view.phase.session_id() != Some(session_id.as_str()) {
                debug!(session_id = %session_id, "Switching to a different session");
                inner.view.history.clear();
                inner.view.last_guess = None;
                inner.view.question_input.clear();
                inner.view.guess_input.clear();
                inner.epoch += 1;
            }
            inner.view.busy = true;
            inner.view.error = None;
            inner.view.phase = SessionPhase::Loading {
                session_id: session_id.clone(),
            };
            (inner.epoch, session_id)
        };
        let _busy = self.busy_guard();

        info!(session_id = %session_id, "Resuming session");
        match self.refresh(epoch, &session_id).await {
            Ok(_) => ActionOutcome::Applied,
            Err(outcome) => outcome,
        }
    }

    /// Asks a yes/no question. A no-op unless the game is in the `asking`
    /// state and the trimmed question is non-blank.
    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> ActionOutcome {
        let question = question.trim();
        let (epoch, session_id) = {
            let mut inner = lock(&self.state);
            if inner.view.busy {
                return ActionOutcome::Busy;
            }
            if question.is_empty() || !inner.view.can_ask() {
                debug!(can_ask = inner.view.can_ask(), "Question rejected locally");
                return ActionOutcome::Rejected;
            }
            let Some(session_id) = inner.view.session_id().map(str::to_string) else {
                return ActionOutcome::Rejected;
            };
            inner.view.busy = true;
            inner.view.error = None;
            (inner.epoch, session_id)
        };
        let _busy = self.busy_guard();

        match self.api.ask_question(&session_id, question).await {
            Ok(reply) => {
                let mut inner = lock(&self.state);
                if !Self::is_current(&inner, epoch, &session_id) {
                    debug!("Discarding stale answer");
                    return ActionOutcome::Stale;
                }
                inner
                    .view
                    .history
                    .push(QuestionAnswerRecord::new(question.to_string(), reply.answer));
                inner.view.question_input.clear();
                info!(answer = %reply.answer, asked = inner.view.history.len(), "Question recorded");
            }
            Err(e) => {
                warn!(error = %e, kind = %e.kind, "Question failed");
                let mut inner = lock(&self.state);
                if !Self::is_current(&inner, epoch, &session_id) {
                    return ActionOutcome::Stale;
                }
                inner.view.error = Some(e.message);
                return ActionOutcome::Failed;
            }
        }

        match self.refresh(epoch, &session_id).await {
            Ok(_) => ActionOutcome::Applied,
            Err(outcome) => outcome,
        }
    }

    /// Submits a guess typed as text.
    ///
    /// Blank or non-numeric input is rejected before any network call; any
    /// finite number is sent and the server decides whether it is valid. When the follow-up status shows the game over, the
    /// end of the game is reported to the server exactly once in the
    /// background.
    #[instrument(skip(self))]
    pub async fn guess(&self, input: &str) -> ActionOutcome {
        let (epoch, session_id, value) = {
            let mut inner = lock(&self.state);
            if inner.view.busy {
                return ActionOutcome::Busy;
            }
            let Some(value) = parse_guess(input) else {
                debug!("Guess rejected locally");
                return ActionOutcome::Rejected;
            };
            if inner.view.status().is_none() || inner.view.is_game_over() {
                debug!("No game accepting guesses");
                return ActionOutcome::Rejected;
            }
            let Some(session_id) = inner.view.session_id().map(str::to_string) else {
                return ActionOutcome::Rejected;
            };
            inner.view.busy = true;
            inner.view.error = None;
            (inner.epoch, session_id, value)
        };
        let _busy = self.busy_guard();

        match self.api.submit_guess(&session_id, value).await {
            Ok(outcome) => {
                let mut inner = lock(&self.state);
                if !Self::is_current(&inner, epoch, &session_id) {
                    debug!("Discarding stale guess outcome");
                    return ActionOutcome::Stale;
                }
                info!(value = %value, correct = outcome.correct, "Guess recorded");
                inner.view.last_guess = Some(outcome);
                inner.view.guess_input.clear();
            }
            Err(e) => {
                warn!(error = %e, kind = %e.kind, "Guess failed");
                let mut inner = lock(&self.state);
                if !Self::is_current(&inner, epoch, &session_id) {
                    return ActionOutcome::Stale;
                }
                inner.view.error = Some(e.message);
                return ActionOutcome::Failed;
            }
        }

        match self.refresh(epoch, &session_id).await {
            Ok(status) => {
                if status.game_over {
                    self.report_end(&session_id);
                }
                ActionOutcome::Applied
            }
            Err(outcome) => outcome,
        }
    }

    /// Drops the current session locally without contacting the server.
    #[instrument(skip(self))]
    pub fn forget(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        let mut inner = lock(&self.state);
        inner.epoch += 1;
        inner.view.phase = SessionPhase::NoSession;
        inner.view.history.clear();
        inner.view.last_guess = None;
        inner.view.error = None;
        inner.view.question_input.clear();
        inner.view.guess_input.clear();
        info!("Session forgotten");
    }

    /// Fetches aggregate statistics.
    #[instrument(skip(self))]
    pub async fn statistics(&self) -> Result<AggregateStatistics, ApiError> {
        let stats = self.api.fetch_statistics().await?;
        debug!(total_games = stats.total_games, wins = stats.wins, "Got statistics");
        Ok(stats)
    }

    /// Number of end-of-game reports still tracked.
    ///
    /// Finished reports are dropped whenever a new one is started.
    pub fn pending_reports(&self) -> usize {
        lock(&self.state).reports.len()
    }

    /// Waits for pending end-of-game reports to finish.
    #[instrument(skip(self))]
    pub async fn flush_reports(&self) {
        let reports = std::mem::take(&mut lock(&self.state).reports);
        debug!(pending = reports.len(), "Flushing end-of-game reports");
        for report in reports {
            if let Err(e) = report.await {
                warn!(error = %e, "End-of-game report task failed");
            }
        }
    }

    /// Fetches status and applies it, or invalidates the session on failure.
    #[instrument(skip(self, epoch))]
    async fn refresh(&self, epoch: u64, session_id: &str) -> Result<GameStatus, ActionOutcome> {
        let result = self.api.fetch_status(session_id).await;

        let mut inner = lock(&self.state);
        if !Self::is_current(&inner, epoch, session_id) {
            debug!("Discarding stale status");
            return Err(ActionOutcome::Stale);
        }

        match result {
            Ok(status) => {
                check_status(&status, inner.view.status());
                inner.view.phase = SessionPhase::Ready {
                    session_id: session_id.to_string(),
                    status: status.clone(),
                };
                Ok(status)
            }
            Err(e) => {
                warn!(error = %e, kind = %e.kind, "Status fetch failed; dropping session");
                if let Err(store_err) = self.store.clear() {
                    warn!(error = %store_err, "Failed to clear persisted session");
                }
                inner.epoch += 1;
                inner.view.phase = SessionPhase::NoSession;
                inner.view.error = Some(e.message);
                Err(ActionOutcome::Failed)
            }
        }
    }

    /// Reports a finished game once, without waiting for the result.
    #[instrument(skip(self))]
    fn report_end(&self, session_id: &str) {
        let mut inner = lock(&self.state);
        if inner.reported.as_deref() == Some(session_id) {
            debug!("End already reported");
            return;
        }
        inner.reported = Some(session_id.to_string());
        inner.reports.retain(|report| !report.is_finished());

        let api = Arc::clone(&self.api);
        let session_id = session_id.to_string();
        info!(session_id = %session_id, "Reporting end of game");
        let handle = tokio::spawn(async move {
            // Best effort: a failed report is logged and the statistic is lost.
            if let Err(e) = api.end_game(&session_id).await {
                warn!(session_id = %session_id, error = %e, "Failed to report end of game");
            }
        });
        inner.reports.push(handle);
    }
}

/// Logs status snapshots that break the server contract.
fn check_status(status: &GameStatus, previous: Option<&GameStatus>) {
    if !status.is_consistent() {
        warn!(
            game_state = %status.game_state,
            game_over = status.game_over,
            won = status.won,
            "Inconsistent status from server"
        );
    }
    debug_assert!(
        status.is_consistent(),
        "game_over/won disagree with game_state: {:?}",
        status
    );

    if let Some(previous) = previous.filter(|p| p.game_id == status.game_id)
        && (status.remaining_questions > previous.remaining_questions
            || status.remaining_guesses > previous.remaining_guesses
            || status.possible_count > previous.possible_count)
    {
        warn!(?previous, current = ?status, "Counters moved backwards");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_guess_accepts_integers() {
        assert_eq!(parse_guess("250"), Some(GuessValue::Whole(250)));
        assert_eq!(parse_guess("  -3 "), Some(GuessValue::Whole(-3)));
        assert_eq!(parse_guess("9999"), Some(GuessValue::Whole(9999)));
    }

    #[test]
    fn test_parse_guess_accepts_whole_floats() {
        assert_eq!(parse_guess("42.0"), Some(GuessValue::Whole(42)));
        assert_eq!(parse_guess("1e2"), Some(GuessValue::Whole(100)));
    }

    #[test]
    fn test_parse_guess_passes_fractions_through() {
        assert_eq!(parse_guess("12.5"), Some(GuessValue::Fraction(12.5)));
        assert_eq!(parse_guess("-0.25"), Some(GuessValue::Fraction(-0.25)));
    }

    #[test]
    fn test_parse_guess_rejects_garbage() {
        assert_eq!(parse_guess(""), None);
        assert_eq!(parse_guess("   "), None);
        assert_eq!(parse_guess("abc"), None);
        assert_eq!(parse_guess("NaN"), None);
        assert_eq!(parse_guess("inf"), None);
        assert_eq!(parse_guess("12,5"), None);
    }

    #[test]
    fn test_phase_accessors() {
        let phase = SessionPhase::Error {
            message: "boom".to_string(),
            last_known_session: Some("old".to_string()),
        };
        assert_eq!(phase.session_id(), None);
        assert!(phase.status().is_none());

        let phase = SessionPhase::Loading {
            session_id: "abc".to_string(),
        };
        assert_eq!(phase.session_id(), Some("abc"));
    }
}
