//! Terminal UI event loop driving the game controller.

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{Terminal, backend::Backend};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, instrument, warn};

use crate::tui::screen::{Screen, ScreenCommand, UserIntent};
use crate::tui::screens::{GameScreen, StatsScreen};
use crate::{
    ActionOutcome, AggregateStatistics, ApiError, GameApi, GameController, SessionPhase,
    SessionStore,
};

/// Active screen.
#[derive(Debug)]
enum ActiveScreen {
    Game(GameScreen),
    Stats(StatsScreen),
}

/// Runs the screens and forwards intents to a [`GameController`].
///
/// Controller actions run on background tasks so the screen keeps
/// redrawing (and shows the busy state) while a request is in flight.
#[derive(Debug)]
pub struct TuiApp<A, S> {
    controller: GameController<A, S>,
    pending_action: Option<JoinHandle<ActionOutcome>>,
    pending_stats: Option<JoinHandle<Result<AggregateStatistics, ApiError>>>,
}

impl<A, S> TuiApp<A, S>
where
    A: GameApi + 'static,
    S: SessionStore + 'static,
{
    /// Creates the app around a controller.
    #[instrument(skip_all)]
    pub fn new(controller: GameController<A, S>) -> Self {
        info!("Creating TuiApp");
        Self {
            controller,
            pending_action: None,
            pending_stats: None,
        }
    }

    /// Runs the event loop until the player quits.
    #[instrument(skip(self, terminal))]
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()>
    where
        <B as Backend>::Error: Send + Sync + 'static,
    {
        info!("Starting TUI event loop");

        if matches!(self.controller.snapshot().phase(), SessionPhase::Loading { .. }) {
            self.dispatch(UserIntent::Resume);
        }

        let mut screen = ActiveScreen::Game(GameScreen::new());

        loop {
            self.collect_finished(&mut screen).await;

            let view = self.controller.snapshot();
            terminal.draw(|f| match &screen {
                ActiveScreen::Game(s) => s.render(f, &view),
                ActiveScreen::Stats(s) => s.render(f, &view),
            })?;

            if event::poll(Duration::from_millis(100))?
                && let Event::Key(key) = event::read()?
            {
                // Crossterm reports both press and release on some platforms.
                if key.kind == KeyEventKind::Release {
                    continue;
                }

                let command = match &mut screen {
                    ActiveScreen::Game(s) => s.handle_key(key, &view),
                    ActiveScreen::Stats(s) => s.handle_key(key, &view),
                };
                debug!(command = ?command, "Handling screen command");

                match command {
                    ScreenCommand::Stay => {}
                    ScreenCommand::Intent(UserIntent::RefreshStats) => {
                        if let ActiveScreen::Stats(s) = &mut screen {
                            s.set_loading();
                        }
                        self.load_stats();
                    }
                    ScreenCommand::Intent(intent) => self.dispatch(intent),
                    ScreenCommand::GoToGame => {
                        info!("Navigating to game");
                        screen = ActiveScreen::Game(GameScreen::new());
                    }
                    ScreenCommand::GoToStats => {
                        info!("Navigating to stats");
                        screen = ActiveScreen::Stats(StatsScreen::new());
                        self.load_stats();
                    }
                    ScreenCommand::Quit => break,
                }
            }

            sleep(Duration::from_millis(10)).await;
        }

        info!("TUI quitting");
        if let Some(action) = self.pending_action.take()
            && let Err(e) = action.await
        {
            warn!(error = %e, "Pending action failed during shutdown");
        }
        self.controller.flush_reports().await;
        Ok(())
    }

    /// Applies an intent: draft edits immediately, network actions in the background.
    #[instrument(skip(self))]
    fn dispatch(&mut self, intent: UserIntent) {
        match intent {
            UserIntent::EditQuestion(text) => self.controller.set_question_input(text),
            UserIntent::EditGuess(text) => self.controller.set_guess_input(text),
            UserIntent::DismissError => self.controller.dismiss_error(),
            UserIntent::RefreshStats => self.load_stats(),
            UserIntent::Start | UserIntent::Resume | UserIntent::Ask | UserIntent::Guess => {
                if self.pending_action.is_some() {
                    debug!("Action already in flight");
                    return;
                }
                let controller = self.controller.clone();
                let view = controller.snapshot();
                let question = view.question_input().clone();
                let guess = view.guess_input().clone();
                self.pending_action = Some(tokio::spawn(async move {
                    match intent {
                        UserIntent::Start => controller.start().await,
                        UserIntent::Resume => controller.resume().await,
                        UserIntent::Ask => controller.ask(&question).await,
                        _ => controller.guess(&guess).await,
                    }
                }));
            }
        }
    }

    fn load_stats(&mut self) {
        if self.pending_stats.is_some() {
            return;
        }
        let controller = self.controller.clone();
        self.pending_stats = Some(tokio::spawn(
            async move { controller.statistics().await },
        ));
    }

    /// Harvests background tasks that have completed.
    async fn collect_finished(&mut self, screen: &mut ActiveScreen) {
        if self.pending_action.as_ref().is_some_and(|h| h.is_finished())
            && let Some(handle) = self.pending_action.take()
        {
            match handle.await {
                Ok(outcome) => debug!(outcome = ?outcome, "Action finished"),
                Err(e) => warn!(error = %e, "Action task failed"),
            }
        }

        if self.pending_stats.as_ref().is_some_and(|h| h.is_finished())
            && let Some(handle) = self.pending_stats.take()
        {
            match handle.await {
                Ok(result) => {
                    if let ActiveScreen::Stats(s) = screen {
                        s.set_result(result);
                    }
                }
                Err(e) => warn!(error = %e, "Statistics task failed"),
            }
        }
    }
}
