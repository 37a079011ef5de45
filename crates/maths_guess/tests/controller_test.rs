//! Tests for the game session controller against a scripted in-memory server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use maths_guess::{
    ActionOutcome, AggregateStatistics, Answer, ApiError, GameApi, GameController, GameState,
    GameStatus, GuessOutcome, GuessValue, MemorySessionStore, Operation, QuestionAnswer,
    SessionPhase, SessionStore, StartedGame,
};

#[derive(Debug, Clone)]
struct FakeGame {
    secret: i64,
    question_count: u32,
    max_questions: u32,
    possible_count: u32,
    guess_attempts: u32,
    max_guesses: u32,
    won: bool,
    game_over: bool,
}

impl FakeGame {
    fn state(&self) -> GameState {
        if self.game_over {
            if self.won { GameState::Won } else { GameState::Lost }
        } else if self.question_count >= self.max_questions {
            GameState::GuessOnly
        } else {
            GameState::Asking
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    games: HashMap<String, FakeGame>,
    next_id: u32,
    secret: i64,
    max_questions: u32,
    max_guesses: u32,
    calls: Vec<&'static str>,
    ended: Vec<String>,
    failures: HashMap<&'static str, (u16, Option<String>)>,
    guess_gate: Option<(Arc<Notify>, Arc<Notify>)>,
    stats: AggregateStatistics,
}

/// Scripted game server recording every call it receives.
#[derive(Debug, Clone)]
struct FakeServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeServer {
    fn new(secret: i64, max_questions: u32, max_guesses: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                secret,
                max_questions,
                max_guesses,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("Fake server lock poisoned")
    }

    fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    fn ended(&self) -> Vec<String> {
        self.lock().ended.clone()
    }

    fn fail(&self, op: &'static str, status: u16, detail: Option<&str>) {
        self.lock()
            .failures
            .insert(op, (status, detail.map(str::to_string)));
    }

    fn heal(&self, op: &'static str) {
        self.lock().failures.remove(op);
    }

    fn expire(&self, session_id: &str) {
        self.lock().games.remove(session_id);
    }

    fn gate_next_guess(&self, entered: Arc<Notify>, release: Arc<Notify>) {
        self.lock().guess_gate = Some((entered, release));
    }

    /// Records the call and returns the injected failure, if any.
    fn enter(&self, name: &'static str, op: Operation) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.push(name);
        match state.failures.get(name) {
            Some((status, detail)) => Err(ApiError::from_status(op, *status, detail.clone())),
            None => Ok(()),
        }
    }

    fn not_found() -> ApiError {
        ApiError::from_status(
            Operation::Status,
            404,
            Some("Game session not found.".to_string()),
        )
    }
}

#[async_trait]
impl GameApi for FakeServer {
    async fn start_game(&self) -> Result<StartedGame, ApiError> {
        self.enter("start", Operation::Start)?;
        let mut state = self.lock();
        state.next_id += 1;
        let game_id = format!("game-{}", state.next_id);
        let game = FakeGame {
            secret: state.secret,
            question_count: 0,
            max_questions: state.max_questions,
            possible_count: 501,
            guess_attempts: 0,
            max_guesses: state.max_guesses,
            won: false,
            game_over: false,
        };
        state.games.insert(game_id.clone(), game);
        Ok(StartedGame {
            game_id,
            secret_number_set: true,
            possible_count: 501,
            max_questions: state.max_questions,
            max_guesses: state.max_guesses,
        })
    }

    async fn fetch_status(&self, session_id: &str) -> Result<GameStatus, ApiError> {
        self.enter("status", Operation::Status)?;
        let state = self.lock();
        let game = state.games.get(session_id).ok_or_else(Self::not_found)?;
        Ok(GameStatus {
            game_id: session_id.to_string(),
            question_count: game.question_count,
            remaining_questions: game.max_questions.saturating_sub(game.question_count),
            possible_count: game.possible_count,
            guess_attempts: game.guess_attempts,
            remaining_guesses: game.max_guesses.saturating_sub(game.guess_attempts),
            game_state: game.state(),
            won: game.won,
            game_over: game.game_over,
        })
    }

    async fn ask_question(
        &self,
        session_id: &str,
        _question: &str,
    ) -> Result<QuestionAnswer, ApiError> {
        self.enter("question", Operation::Question)?;
        let mut state = self.lock();
        let game = state.games.get_mut(session_id).ok_or_else(Self::not_found)?;
        if game.state() != GameState::Asking {
            return Err(ApiError::from_status(
                Operation::Question,
                400,
                Some("Maximum questions reached; you can only guess now.".to_string()),
            ));
        }
        game.question_count += 1;
        game.possible_count = (game.possible_count / 2).max(1);
        let answer = if game.secret % 2 == 0 { Answer::Yes } else { Answer::No };
        Ok(QuestionAnswer {
            answer,
            possible_count: game.possible_count,
            question_count: game.question_count,
            remaining_questions: game.max_questions.saturating_sub(game.question_count),
            game_state: game.state(),
        })
    }

    async fn submit_guess(
        &self,
        session_id: &str,
        guess: GuessValue,
    ) -> Result<GuessOutcome, ApiError> {
        self.enter("guess", Operation::Guess)?;
        let guess = match guess {
            GuessValue::Whole(value) => value,
            GuessValue::Fraction(_) => {
                return Err(ApiError::from_status(
                    Operation::Guess,
                    422,
                    Some("Input should be a valid integer".to_string()),
                ));
            }
        };
        let gate = self.lock().guess_gate.take();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }

        let mut state = self.lock();
        let game = state.games.get_mut(session_id).ok_or_else(Self::not_found)?;
        game.guess_attempts += 1;
        let correct = guess == game.secret;
        if correct {
            game.won = true;
            game.game_over = true;
        } else if game.guess_attempts >= game.max_guesses {
            game.game_over = true;
        }
        Ok(GuessOutcome {
            correct,
            game_over: game.game_over,
            won: game.won,
            secret_number: game.game_over.then_some(game.secret),
            remaining_guesses: game.max_guesses.saturating_sub(game.guess_attempts),
        })
    }

    async fn end_game(&self, session_id: &str) -> Result<(), ApiError> {
        self.enter("end", Operation::End)?;
        self.lock().ended.push(session_id.to_string());
        Ok(())
    }

    async fn fetch_statistics(&self) -> Result<AggregateStatistics, ApiError> {
        self.enter("stats", Operation::Stats)?;
        Ok(self.lock().stats.clone())
    }

    async fn health(&self) -> Result<(), ApiError> {
        self.enter("health", Operation::Health)
    }
}

type TestController = GameController<FakeServer, Arc<MemorySessionStore>>;

fn setup(
    secret: i64,
    max_questions: u32,
    max_guesses: u32,
) -> (FakeServer, Arc<MemorySessionStore>, TestController) {
    let server = FakeServer::new(secret, max_questions, max_guesses);
    let store = Arc::new(MemorySessionStore::new());
    let controller = GameController::new(server.clone(), Arc::clone(&store));
    (server, store, controller)
}

async fn started(
    secret: i64,
    max_questions: u32,
    max_guesses: u32,
) -> (FakeServer, Arc<MemorySessionStore>, TestController) {
    let (server, store, controller) = setup(secret, max_questions, max_guesses);
    assert_eq!(controller.start().await, ActionOutcome::Applied);
    (server, store, controller)
}

#[tokio::test]
async fn test_initial_phase_without_persisted_session() {
    let (server, _store, controller) = setup(100, 10, 5);
    assert_eq!(controller.snapshot().phase(), &SessionPhase::NoSession);
    assert!(!controller.snapshot().can_ask());
    assert!(server.calls().is_empty());
}

#[tokio::test]
async fn test_initial_phase_with_persisted_session_is_loading() {
    let server = FakeServer::new(100, 10, 5);
    let store = Arc::new(MemorySessionStore::with_session("game-42"));
    let controller = GameController::new(server.clone(), store);

    assert_eq!(
        controller.snapshot().phase(),
        &SessionPhase::Loading {
            session_id: "game-42".to_string()
        }
    );
    assert!(server.calls().is_empty(), "Loading must not touch the network");
}

#[tokio::test]
async fn test_start_persists_server_id_and_loads_status() {
    let (server, store, controller) = started(100, 10, 5).await;

    let view = controller.snapshot();
    assert_eq!(view.session_id(), Some("game-1"));
    assert_eq!(store.load().expect("Load failed").as_deref(), Some("game-1"));
    assert!(view.history().is_empty());

    let status = view.status().expect("Status missing");
    assert_eq!(status.game_state, GameState::Asking);
    assert_eq!(status.remaining_questions, 10);
    assert_eq!(status.remaining_guesses, 5);
    assert_eq!(server.calls(), vec!["start", "status"]);
}

#[tokio::test]
async fn test_ask_then_guess_scenario() {
    let (server, _store, controller) = started(100, 10, 5).await;

    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Applied);
    let view = controller.snapshot();
    assert_eq!(view.history().len(), 1);
    assert_eq!(view.history()[0].question, "Is it even?");
    assert_eq!(view.history()[0].answer, Answer::Yes);
    assert_eq!(view.status().expect("Status missing").remaining_questions, 9);

    assert_eq!(controller.guess("250").await, ActionOutcome::Applied);
    let view = controller.snapshot();
    let outcome = view.last_guess().clone().expect("Guess outcome missing");
    assert!(!outcome.correct);
    assert!(!outcome.game_over);
    assert_eq!(outcome.secret_number, None);
    assert_eq!(outcome.remaining_guesses, 4);

    let status = view.status().expect("Status missing");
    assert_eq!(view.history().len(), 1);
    assert_eq!(status.remaining_guesses, 4);
    assert_eq!(status.game_state, GameState::Asking);
    assert!(view.can_ask());
    assert!(!view.is_game_over());

    controller.flush_reports().await;
    assert!(server.ended().is_empty());
    assert_eq!(
        server.calls(),
        vec!["start", "status", "question", "status", "guess", "status"]
    );
}

#[tokio::test]
async fn test_successful_actions_clear_inputs() {
    let (_server, _store, controller) = started(100, 10, 5).await;

    controller.set_question_input("Is it even?");
    let question = controller.snapshot().question_input().clone();
    assert_eq!(controller.ask(&question).await, ActionOutcome::Applied);
    assert!(controller.snapshot().question_input().is_empty());

    controller.set_guess_input("12");
    let guess = controller.snapshot().guess_input().clone();
    assert_eq!(controller.guess(&guess).await, ActionOutcome::Applied);
    assert!(controller.snapshot().guess_input().is_empty());
}

#[tokio::test]
async fn test_question_is_trimmed() {
    let (_server, _store, controller) = started(7, 10, 5).await;

    assert_eq!(controller.ask("  Is it odd?  ").await, ActionOutcome::Applied);
    assert_eq!(controller.snapshot().history()[0].question, "Is it odd?");
}

#[tokio::test]
async fn test_blank_question_is_rejected_without_network() {
    let (server, _store, controller) = started(100, 10, 5).await;
    let before = server.calls().len();

    assert_eq!(controller.ask("   ").await, ActionOutcome::Rejected);
    assert_eq!(server.calls().len(), before);
    assert!(controller.snapshot().history().is_empty());
}

#[tokio::test]
async fn test_ask_without_session_is_rejected() {
    let (server, _store, controller) = setup(100, 10, 5);

    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Rejected);
    assert!(server.calls().is_empty());
}

#[tokio::test]
async fn test_guess_only_blocks_questions() {
    let (server, _store, controller) = started(100, 1, 5).await;

    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Applied);
    let view = controller.snapshot();
    assert_eq!(
        view.status().expect("Status missing").game_state,
        GameState::GuessOnly
    );
    assert!(!view.can_ask());
    assert!(view.can_guess());

    let before = server.calls().len();
    assert_eq!(controller.ask("Is it prime?").await, ActionOutcome::Rejected);
    assert_eq!(server.calls().len(), before);
    assert_eq!(controller.snapshot().history().len(), 1);
}

#[tokio::test]
async fn test_remaining_questions_never_increase() {
    let (_server, _store, controller) = started(100, 3, 5).await;

    let mut previous = controller
        .snapshot()
        .status()
        .expect("Status missing")
        .remaining_questions;
    for _ in 0..3 {
        assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Applied);
        let remaining = controller
            .snapshot()
            .status()
            .expect("Status missing")
            .remaining_questions;
        assert!(remaining <= previous);
        previous = remaining;
    }
    assert_eq!(previous, 0);
}

#[tokio::test]
async fn test_ask_failure_keeps_history_and_session() {
    let (server, store, controller) = started(100, 10, 5).await;
    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Applied);

    server.fail("question", 500, Some("Failed to determine answer: timeout"));
    assert_eq!(controller.ask("Is it > 100?").await, ActionOutcome::Failed);

    let view = controller.snapshot();
    assert_eq!(view.history().len(), 1);
    assert_eq!(
        view.error().as_deref(),
        Some("Failed to determine answer: timeout")
    );
    assert_eq!(view.session_id(), Some("game-1"));
    assert_eq!(store.load().expect("Load failed").as_deref(), Some("game-1"));

    server.heal("question");
    assert_eq!(controller.ask("Is it > 100?").await, ActionOutcome::Applied);
    let view = controller.snapshot();
    assert_eq!(view.history().len(), 2);
    assert!(view.error().is_none());
}

#[tokio::test]
async fn test_empty_guess_makes_no_call_and_no_change() {
    let (server, _store, controller) = started(100, 10, 5).await;
    let before_calls = server.calls().len();
    let before = controller.snapshot();

    assert_eq!(controller.guess("").await, ActionOutcome::Rejected);
    assert_eq!(controller.guess("abc").await, ActionOutcome::Rejected);

    let after = controller.snapshot();
    assert_eq!(server.calls().len(), before_calls);
    assert_eq!(after.phase(), before.phase());
    assert_eq!(after.last_guess(), before.last_guess());
    assert_eq!(after.history(), before.history());
    assert_eq!(after.error(), before.error());
}

#[tokio::test]
async fn test_out_of_range_guess_is_passed_through() {
    let (server, _store, controller) = started(100, 10, 5).await;
    server.fail("guess", 400, Some("Guess must be between 0 and 500."));

    assert_eq!(controller.guess("9999").await, ActionOutcome::Failed);
    let view = controller.snapshot();
    assert_eq!(
        view.error().as_deref(),
        Some("Guess must be between 0 and 500.")
    );
    assert!(view.last_guess().is_none());
    assert_eq!(view.session_id(), Some("game-1"));
    assert_eq!(server.calls().last(), Some(&"guess"));
}

#[tokio::test]
async fn test_fractional_guess_is_judged_by_server() {
    let (server, store, controller) = started(100, 10, 5).await;
    let before = server.calls().len();

    assert_eq!(controller.guess("12.5").await, ActionOutcome::Failed);

    let view = controller.snapshot();
    assert_eq!(server.calls().len(), before + 1);
    assert_eq!(server.calls().last(), Some(&"guess"));
    assert_eq!(
        view.error().as_deref(),
        Some("Input should be a valid integer")
    );
    assert!(view.last_guess().is_none());
    assert_eq!(view.session_id(), Some("game-1"));
    assert_eq!(store.load().expect("Load failed").as_deref(), Some("game-1"));
    assert_eq!(
        view.status().expect("Status missing").remaining_guesses,
        5
    );
}

#[tokio::test]
async fn test_winning_guess_reports_end_exactly_once() {
    let (server, _store, controller) = started(100, 10, 5).await;

    assert_eq!(controller.guess("100").await, ActionOutcome::Applied);
    controller.flush_reports().await;

    let view = controller.snapshot();
    assert!(view.is_game_over());
    assert!(!view.can_ask());
    assert!(!view.can_guess());
    let status = view.status().expect("Status missing");
    assert_eq!(status.game_state, GameState::Won);
    assert!(status.won);
    let outcome = view.last_guess().clone().expect("Guess outcome missing");
    assert!(outcome.correct);
    assert_eq!(outcome.secret_number, Some(100));
    assert_eq!(server.ended(), vec!["game-1".to_string()]);

    // Terminal state: further guesses are local no-ops.
    assert_eq!(controller.guess("100").await, ActionOutcome::Rejected);
    controller.flush_reports().await;
    assert_eq!(server.ended().len(), 1);
}

#[tokio::test]
async fn test_losing_game_reports_end_exactly_once() {
    let (server, _store, controller) = started(100, 10, 3).await;

    for guess in ["1", "2"] {
        assert_eq!(controller.guess(guess).await, ActionOutcome::Applied);
    }
    controller.flush_reports().await;
    assert!(server.ended().is_empty());

    assert_eq!(controller.guess("3").await, ActionOutcome::Applied);
    controller.flush_reports().await;

    let view = controller.snapshot();
    let status = view.status().expect("Status missing");
    assert_eq!(status.game_state, GameState::Lost);
    assert!(status.game_over);
    assert!(!status.won);
    assert_eq!(status.remaining_guesses, 0);
    assert_eq!(server.ended(), vec!["game-1".to_string()]);
    assert_eq!(server.calls().iter().filter(|c| **c == "end").count(), 1);
}

#[tokio::test]
async fn test_finished_reports_are_pruned() {
    let (server, _store, controller) = started(100, 10, 5).await;

    assert_eq!(controller.guess("100").await, ActionOutcome::Applied);
    assert_eq!(controller.pending_reports(), 1);
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(server.ended(), vec!["game-1".to_string()]);

    assert_eq!(controller.start().await, ActionOutcome::Applied);
    assert_eq!(controller.guess("100").await, ActionOutcome::Applied);
    assert_eq!(controller.pending_reports(), 1);

    controller.flush_reports().await;
    assert_eq!(controller.pending_reports(), 0);
    assert_eq!(
        server.ended(),
        vec!["game-1".to_string(), "game-2".to_string()]
    );
}

#[tokio::test]
async fn test_failed_end_report_does_not_block_or_retry() {
    let (server, _store, controller) = started(100, 10, 5).await;
    server.fail("end", 503, None);

    assert_eq!(controller.guess("100").await, ActionOutcome::Applied);
    controller.flush_reports().await;

    let view = controller.snapshot();
    assert!(view.is_game_over());
    assert!(view.error().is_none());
    assert_eq!(server.calls().iter().filter(|c| **c == "end").count(), 1);
}

#[tokio::test]
async fn test_resume_with_unknown_session_clears_store() {
    let server = FakeServer::new(100, 10, 5);
    let store = Arc::new(MemorySessionStore::with_session("gone"));
    let controller = GameController::new(server.clone(), Arc::clone(&store));

    assert_eq!(controller.resume().await, ActionOutcome::Failed);

    let view = controller.snapshot();
    assert_eq!(view.phase(), &SessionPhase::NoSession);
    assert_eq!(view.error().as_deref(), Some("Game session not found."));
    assert_eq!(store.load().expect("Load failed"), None);

    // Nothing left to retry against.
    assert_eq!(controller.resume().await, ActionOutcome::Rejected);
    assert_eq!(server.calls(), vec!["status"]);
}

#[tokio::test]
async fn test_resume_restores_persisted_game() {
    let server = FakeServer::new(100, 10, 5);
    let store = Arc::new(MemorySessionStore::new());
    let first = GameController::new(server.clone(), Arc::clone(&store));
    assert_eq!(first.start().await, ActionOutcome::Applied);
    assert_eq!(first.ask("Is it even?").await, ActionOutcome::Applied);

    let second = GameController::new(server.clone(), Arc::clone(&store));
    assert_eq!(second.resume().await, ActionOutcome::Applied);

    let view = second.snapshot();
    assert_eq!(view.session_id(), Some("game-1"));
    assert_eq!(view.status().expect("Status missing").question_count, 1);
    // History is client-owned and does not survive into a new controller.
    assert!(view.history().is_empty());
}

#[tokio::test]
async fn test_resume_into_other_session_starts_fresh_history() {
    let server = FakeServer::new(100, 10, 5);
    let store = Arc::new(MemorySessionStore::new());
    let first = GameController::new(server.clone(), Arc::clone(&store));
    assert_eq!(first.start().await, ActionOutcome::Applied);
    assert_eq!(first.ask("Is it even?").await, ActionOutcome::Applied);
    assert_eq!(first.guess("3").await, ActionOutcome::Applied);
    first.set_question_input("Is it prime?");

    // Another client on the same store starts a new game.
    let second = GameController::new(server.clone(), Arc::clone(&store));
    assert_eq!(second.start().await, ActionOutcome::Applied);

    assert_eq!(first.resume().await, ActionOutcome::Applied);
    let view = first.snapshot();
    assert_eq!(view.session_id(), Some("game-2"));
    assert!(view.history().is_empty());
    assert!(view.last_guess().is_none());
    assert!(view.question_input().is_empty());
    assert_eq!(
        view.status().expect("Status missing").remaining_guesses,
        5
    );
}

#[tokio::test]
async fn test_resume_same_session_keeps_history() {
    let (_server, _store, controller) = started(100, 10, 5).await;
    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Applied);
    assert_eq!(controller.guess("3").await, ActionOutcome::Applied);

    assert_eq!(controller.resume().await, ActionOutcome::Applied);
    let view = controller.snapshot();
    assert_eq!(view.session_id(), Some("game-1"));
    assert_eq!(view.history().len(), 1);
    assert!(view.last_guess().is_some());
}

#[tokio::test]
async fn test_resume_waits_for_in_flight_guess_before_switching() {
    let server = FakeServer::new(100, 10, 5);
    let store = Arc::new(MemorySessionStore::new());
    let first = GameController::new(server.clone(), Arc::clone(&store));
    assert_eq!(first.start().await, ActionOutcome::Applied);

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    server.gate_next_guess(Arc::clone(&entered), Arc::clone(&release));
    let in_flight = first.clone();
    let task = tokio::spawn(async move { in_flight.guess("100").await });
    entered.notified().await;

    // The guess holds the busy flag; switch sessions from another client.
    let second = GameController::new(server.clone(), Arc::clone(&store));
    assert_eq!(second.start().await, ActionOutcome::Applied);
    assert_eq!(first.resume().await, ActionOutcome::Busy);

    release.notify_one();
    assert_eq!(task.await.expect("Task panicked"), ActionOutcome::Applied);
    assert_eq!(first.resume().await, ActionOutcome::Applied);
    let view = first.snapshot();
    assert_eq!(view.session_id(), Some("game-2"));
    assert!(view.last_guess().is_none());
}

#[tokio::test]
async fn test_expired_session_after_ask_drops_session_but_keeps_history() {
    let (server, store, controller) = started(100, 10, 5).await;

    server.fail("status", 404, Some("Game session not found."));
    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Failed);

    let view = controller.snapshot();
    assert_eq!(view.phase(), &SessionPhase::NoSession);
    assert_eq!(view.history().len(), 1);
    assert_eq!(store.load().expect("Load failed"), None);
    assert!(!view.can_ask());

    // The dead id is never used again.
    let before = server.calls().len();
    assert_eq!(controller.guess("5").await, ActionOutcome::Rejected);
    assert_eq!(server.calls().len(), before);
}

#[tokio::test]
async fn test_expired_session_on_guess_refresh() {
    let (server, store, controller) = started(100, 10, 5).await;
    server.expire("game-1");

    assert_eq!(controller.guess("5").await, ActionOutcome::Failed);
    assert_eq!(controller.snapshot().phase(), &SessionPhase::NoSession);
    assert_eq!(store.load().expect("Load failed"), None);
}

#[tokio::test]
async fn test_start_failure_enters_error_and_keeps_store() {
    let (server, store, controller) = started(100, 10, 5).await;
    server.fail("start", 500, None);

    assert_eq!(controller.start().await, ActionOutcome::Failed);

    let view = controller.snapshot();
    match view.phase() {
        SessionPhase::Error {
            message,
            last_known_session,
        } => {
            assert_eq!(message, "Failed to start game (HTTP 500)");
            assert_eq!(last_known_session.as_deref(), Some("game-1"));
        }
        other => panic!("Expected error phase, got {:?}", other),
    }
    assert_eq!(store.load().expect("Load failed").as_deref(), Some("game-1"));
    assert!(!view.can_ask());

    // The last known session can be picked up again.
    assert_eq!(controller.resume().await, ActionOutcome::Applied);
    assert_eq!(controller.snapshot().session_id(), Some("game-1"));
}

#[tokio::test]
async fn test_start_failure_without_prior_session() {
    let (server, store, controller) = setup(100, 10, 5);
    server.fail("start", 502, Some("Bad gateway"));

    assert_eq!(controller.start().await, ActionOutcome::Failed);
    assert_eq!(
        controller.snapshot().phase(),
        &SessionPhase::Error {
            message: "Bad gateway".to_string(),
            last_known_session: None,
        }
    );
    assert_eq!(store.load().expect("Load failed"), None);
}

#[tokio::test]
async fn test_new_game_clears_history_and_outcome() {
    let (server, store, controller) = started(100, 10, 5).await;
    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Applied);
    assert_eq!(controller.guess("3").await, ActionOutcome::Applied);

    assert_eq!(controller.start().await, ActionOutcome::Applied);

    let view = controller.snapshot();
    assert!(view.history().is_empty());
    assert!(view.last_guess().is_none());
    assert_eq!(view.session_id(), Some("game-2"));
    assert_eq!(store.load().expect("Load failed").as_deref(), Some("game-2"));
    assert_eq!(
        view.status().expect("Status missing").remaining_guesses,
        5
    );
    assert_eq!(server.lock().games.len(), 2);
}

#[tokio::test]
async fn test_second_action_while_busy_is_refused() {
    let (server, _store, controller) = started(100, 10, 5).await;
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    server.gate_next_guess(Arc::clone(&entered), Arc::clone(&release));

    let in_flight = controller.clone();
    let task = tokio::spawn(async move { in_flight.guess("7").await });
    entered.notified().await;

    assert!(*controller.snapshot().busy());
    let before = server.calls().len();
    assert_eq!(controller.guess("8").await, ActionOutcome::Busy);
    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Busy);
    assert_eq!(controller.start().await, ActionOutcome::Busy);
    assert_eq!(server.calls().len(), before);

    release.notify_one();
    assert_eq!(task.await.expect("Task panicked"), ActionOutcome::Applied);
    assert!(!*controller.snapshot().busy());
    assert_eq!(
        controller
            .snapshot()
            .status()
            .expect("Status missing")
            .remaining_guesses,
        4
    );
}

#[tokio::test]
async fn test_result_for_forgotten_session_is_discarded() {
    let (server, store, controller) = started(100, 10, 5).await;
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    server.gate_next_guess(Arc::clone(&entered), Arc::clone(&release));

    let in_flight = controller.clone();
    let task = tokio::spawn(async move { in_flight.guess("100").await });
    entered.notified().await;

    controller.forget();
    release.notify_one();

    assert_eq!(task.await.expect("Task panicked"), ActionOutcome::Stale);
    let view = controller.snapshot();
    assert_eq!(view.phase(), &SessionPhase::NoSession);
    assert!(view.last_guess().is_none());
    assert!(!*view.busy());
    assert_eq!(store.load().expect("Load failed"), None);

    controller.flush_reports().await;
    assert!(server.ended().is_empty());
}

#[tokio::test]
async fn test_statistics_with_no_games() {
    let (_server, _store, controller) = setup(100, 10, 5);

    let stats = controller.statistics().await.expect("Stats failed");
    assert_eq!(stats.total_games, 0);
    assert_eq!(stats.win_rate(), 0.0);
    assert_eq!(stats.average_questions(), 0.0);
}

#[tokio::test]
async fn test_statistics_failure_surfaces_message() {
    let (server, _store, controller) = setup(100, 10, 5);
    server.fail("stats", 500, None);

    let err = controller.statistics().await.expect_err("Stats should fail");
    assert_eq!(err.to_string(), "Failed to load stats (HTTP 500)");
}

#[tokio::test]
async fn test_status_snapshots_keep_game_over_consistent() {
    let (_server, _store, controller) = started(100, 2, 2).await;

    let mut snapshots = vec![controller.snapshot()];
    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Applied);
    snapshots.push(controller.snapshot());
    assert_eq!(controller.ask("Is it even?").await, ActionOutcome::Applied);
    snapshots.push(controller.snapshot());
    assert_eq!(controller.guess("1").await, ActionOutcome::Applied);
    snapshots.push(controller.snapshot());
    assert_eq!(controller.guess("2").await, ActionOutcome::Applied);
    snapshots.push(controller.snapshot());

    for view in &snapshots {
        let status = view.status().expect("Status missing");
        assert!(status.is_consistent());
        assert_eq!(
            status.game_over,
            matches!(status.game_state, GameState::Won | GameState::Lost)
        );
    }
    assert!(snapshots.last().expect("No snapshots").is_game_over());
}
