//! Maths Guess - unified CLI
//!
//! Interactive terminal UI plus one-shot commands sharing the persisted session.

#![warn(missing_docs)]

mod cli;

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use cli::{Cli, Command};
use maths_guess::{
    ActionOutcome, ClientConfig, FileSessionStore, GameApi, GameController, GameView,
    RestGameClient, SessionPhase, tui::summary_lines,
};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

type Controller = GameController<RestGameClient, FileSessionStore>;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if matches!(cli.command, Command::Play) {
        initialize_file_tracing()?;
    } else {
        initialize_stderr_tracing();
    }

    let config = ClientConfig::resolve(
        Some(cli.config.as_path()),
        cli.server_url.clone(),
        cli.session_file.clone(),
    )?;
    info!(server_url = %config.server_url(), session_file = %config.session_file().display(), "Configuration resolved");

    let controller = GameController::new(
        RestGameClient::new(config.server_url()),
        FileSessionStore::new(config.session_file()),
    );

    let result = match cli.command {
        Command::Play => maths_guess::tui::run_tui(controller.clone()).await,
        Command::Start => run_start(&controller).await,
        Command::Status => run_status(&controller).await,
        Command::Ask { question } => run_ask(&controller, &question.join(" ")).await,
        Command::Guess { value } => run_guess(&controller, &value).await,
        Command::Stats => run_stats(&controller).await,
        Command::Forget => {
            controller.forget();
            println!("Forgot the saved game.");
            Ok(())
        }
        Command::Ping => run_ping(config.server_url()).await,
    };

    controller.flush_reports().await;
    result
}

/// Starts a new game.
#[instrument(skip(controller))]
async fn run_start(controller: &Controller) -> Result<()> {
    let outcome = controller.start().await;
    let view = controller.snapshot();
    check(outcome, &view, "A game is already being started")?;
    print_view(&view);
    Ok(())
}

/// Prints the persisted game's status.
#[instrument(skip(controller))]
async fn run_status(controller: &Controller) -> Result<()> {
    load(controller).await?;
    print_view(&controller.snapshot());
    Ok(())
}

/// Asks one question about the persisted game.
#[instrument(skip(controller))]
async fn run_ask(controller: &Controller, question: &str) -> Result<()> {
    load(controller).await?;
    let outcome = controller.ask(question).await;
    let view = controller.snapshot();
    if let Some(record) = view.history().last()
        && outcome == ActionOutcome::Applied
    {
        println!("Q: {}\nA: {}", record.question, record.answer);
    }
    check(
        outcome,
        &view,
        "Cannot ask now: the question is blank or the game no longer accepts questions",
    )?;
    print_view(&view);
    Ok(())
}

/// Submits one guess for the persisted game.
#[instrument(skip(controller))]
async fn run_guess(controller: &Controller, value: &str) -> Result<()> {
    load(controller).await?;
    let outcome = controller.guess(value).await;
    let view = controller.snapshot();
    check(
        outcome,
        &view,
        "Cannot guess now: enter a number for a game that is still running",
    )?;
    print_view(&view);
    Ok(())
}

/// Prints aggregate statistics.
#[instrument(skip(controller))]
async fn run_stats(controller: &Controller) -> Result<()> {
    let stats = controller.statistics().await?;
    println!("=== Game Statistics ===");
    for line in summary_lines(&stats) {
        println!("{}", line);
    }
    Ok(())
}

/// Checks server health.
#[instrument]
async fn run_ping(server_url: &str) -> Result<()> {
    RestGameClient::new(server_url).health().await?;
    println!("Game server at {} is up.", server_url);
    Ok(())
}

/// Resumes the persisted session, failing when there is none.
async fn load(controller: &Controller) -> Result<()> {
    let outcome = controller.resume().await;
    check(
        outcome,
        &controller.snapshot(),
        "No saved game. Run `maths_guess start` first",
    )
}

/// Turns an action outcome into a CLI result.
fn check(outcome: ActionOutcome, view: &GameView, rejected: &str) -> Result<()> {
    match outcome {
        ActionOutcome::Applied => Ok(()),
        ActionOutcome::Rejected => bail!("{}", rejected),
        ActionOutcome::Busy => bail!("Another action is in progress"),
        ActionOutcome::Stale => bail!("The game changed while the request was in flight"),
        ActionOutcome::Failed => Err(anyhow!(
            "{}",
            view.error().clone().unwrap_or_else(|| "Request failed".to_string())
        )),
    }
}

fn print_view(view: &GameView) {
    match view.phase() {
        SessionPhase::Ready { session_id, status } => {
            println!("Game: {}", session_id);
            println!(
                "Questions: {} (remaining {})",
                status.question_count, status.remaining_questions
            );
            println!("Possible numbers: {}", status.possible_count);
            println!(
                "Guesses: {} (remaining {})",
                status.guess_attempts, status.remaining_guesses
            );
            println!("State: {}", status.game_state);
        }
        SessionPhase::NoSession => println!("No active game."),
        SessionPhase::Loading { session_id } => println!("Game {} is loading.", session_id),
        SessionPhase::Error { message, .. } => println!("Error: {}", message),
    }

    if let Some(outcome) = view.last_guess() {
        let verdict = if outcome.correct { "Correct!" } else { "Incorrect." };
        match outcome.secret_number.filter(|_| outcome.game_over) {
            Some(secret) => println!("{} The secret number was {}.", verdict, secret),
            None => println!("{}", verdict),
        }
    }

    if view.is_game_over() {
        let won = view.status().is_some_and(|s| s.won);
        println!("{}", if won { "You won!" } else { "You lost." });
    } else if view.status().is_some() && !view.can_ask() {
        println!("You've reached the max questions. You can only guess now.");
    }
}

/// Logs to a file so output does not interfere with the TUI.
fn initialize_file_tracing() -> Result<()> {
    let log_file = std::fs::File::create("maths_guess_tui.log")?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,maths_guess=debug")),
        )
        .with_writer(std::sync::Arc::new(log_file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn initialize_stderr_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
