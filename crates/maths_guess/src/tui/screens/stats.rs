//! Statistics screen: totals across every finished game.

use crossterm::event::{KeyCode, KeyEvent};
use derive_getters::Getters;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
};
use tracing::{info, instrument};

use crate::tui::screen::{Screen, ScreenCommand, UserIntent};
use crate::{AggregateStatistics, ApiError, GameView};

/// Load state of the statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsState {
    /// Request in flight.
    Loading,
    /// Statistics received.
    Loaded(AggregateStatistics),
    /// Request failed with this message.
    Failed(String),
}

/// State for the statistics screen.
#[derive(Debug, Getters)]
pub struct StatsScreen {
    state: StatsState,
}

impl StatsScreen {
    /// Creates a screen waiting for statistics.
    #[instrument]
    pub fn new() -> Self {
        Self {
            state: StatsState::Loading,
        }
    }

    /// Marks the statistics as reloading.
    pub fn set_loading(&mut self) {
        self.state = StatsState::Loading;
    }

    /// Stores the result of a statistics fetch.
    #[instrument(skip(self, result))]
    pub fn set_result(&mut self, result: Result<AggregateStatistics, ApiError>) {
        self.state = match result {
            Ok(stats) => {
                info!(total_games = stats.total_games, "Statistics loaded");
                StatsState::Loaded(stats)
            }
            Err(e) => StatsState::Failed(e.message),
        };
    }
}

impl Default for StatsScreen {
    fn default() -> Self {
        Self::new()
    }
}

/// Lines describing the statistics, as shown on screen.
#[instrument(skip(stats))]
pub fn summary_lines(stats: &AggregateStatistics) -> Vec<String> {
    if stats.total_games == 0 {
        return vec!["No games played yet.".to_string()];
    }

    let mut lines = vec![
        format!("Total games: {}", stats.total_games),
        format!("Wins: {}   Losses: {}", stats.wins, stats.losses),
        format!("Win rate: {:.1}%", stats.win_rate()),
        format!("Average questions/game: {:.1}", stats.average_questions()),
    ];
    if let Some(best) = stats.best_game_questions {
        lines.push(format!("Best game: {} questions", best));
    }
    lines.push(String::new());
    lines.push(format!(
        "Mode 2 (User Guesses): Games {}, Wins {}",
        stats.mode2_games, stats.mode2_wins
    ));
    lines
}

impl Screen for StatsScreen {
    #[instrument(skip(self, frame, _view))]
    fn render(&self, frame: &mut Frame, _view: &GameView) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let title = Paragraph::new("Statistics")
            .style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, chunks[0]);

        let (lines, color): (Vec<Line>, Color) = match &self.state {
            StatsState::Loading => (vec![Line::from("Loading…")], Color::Yellow),
            StatsState::Loaded(stats) => (
                summary_lines(stats).into_iter().map(Line::from).collect(),
                Color::Green,
            ),
            StatsState::Failed(message) => (vec![Line::from(message.clone())], Color::Red),
        };
        let body = Paragraph::new(lines)
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).title("Summary"));
        frame.render_widget(body, chunks[1]);

        let help = Paragraph::new("Esc / b: Back to game | r: Refresh | q: Quit")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, chunks[2]);
    }

    #[instrument(skip(self, key, _view))]
    fn handle_key(&mut self, key: KeyEvent, _view: &GameView) -> ScreenCommand {
        match key.code {
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('B') => {
                info!("Returning to game from stats");
                ScreenCommand::GoToGame
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                ScreenCommand::Intent(UserIntent::RefreshStats)
            }
            KeyCode::Char('q') | KeyCode::Char('Q') => ScreenCommand::Quit,
            _ => ScreenCommand::Stay,
        }
    }
}
