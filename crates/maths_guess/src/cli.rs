//! Command-line interface for maths_guess.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Maths Guess - guess the server's secret number with yes/no maths questions
#[derive(Parser, Debug)]
#[command(name = "maths_guess")]
#[command(about = "Client for the maths number-guessing game", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, default_value = "maths_guess.toml")]
    pub config: PathBuf,

    /// Game server URL (overrides config and environment)
    #[arg(long, global = true)]
    pub server_url: Option<String>,

    /// File holding the persisted session id (overrides config and environment)
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play interactively in the terminal UI
    Play,

    /// Start a new game and persist its id
    Start,

    /// Show the status of the persisted game
    Status,

    /// Ask a yes/no question about the secret number
    Ask {
        /// Question text
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Submit a guess
    Guess {
        /// Guessed number
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Show statistics across all finished games
    Stats,

    /// Forget the persisted game without contacting the server
    Forget,

    /// Check that the game server is reachable
    Ping,
}
