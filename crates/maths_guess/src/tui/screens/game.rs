//! Game screen: status counters, question history and the two input fields.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use derive_getters::Getters;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use tracing::{debug, instrument};

use crate::tui::screen::{Screen, ScreenCommand, UserIntent};
use crate::{GameView, SessionPhase};

/// Which input field receives typed characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFocus {
    /// The yes/no question field.
    #[default]
    Question,
    /// The numeric guess field.
    Guess,
}

impl InputFocus {
    /// Switches to the other field.
    #[instrument]
    pub fn toggle(self) -> Self {
        match self {
            Self::Question => Self::Guess,
            Self::Guess => Self::Question,
        }
    }
}

/// State for the game screen.
#[derive(Debug, Default, Getters)]
pub struct GameScreen {
    focus: InputFocus,
}

impl GameScreen {
    /// Creates a game screen with the question field focused.
    #[instrument]
    pub fn new() -> Self {
        Self::default()
    }

    /// Field that effectively receives input, given what the game allows.
    fn effective_focus(&self, view: &GameView) -> InputFocus {
        if view.can_ask() {
            self.focus
        } else {
            InputFocus::Guess
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, view: &GameView) {
        let session = match view.phase() {
            SessionPhase::NoSession => "No game".to_string(),
            SessionPhase::Loading { session_id } => format!("Loading {}…", short_id(session_id)),
            SessionPhase::Ready { session_id, .. } => format!("Game {}…", short_id(session_id)),
            SessionPhase::Error { .. } => "Could not start game".to_string(),
        };
        let busy = if *view.busy() { "  ⏳ working" } else { "" };
        let title = Paragraph::new(format!("Maths Guessing Game | {}{}", session, busy))
            .style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, view: &GameView) {
        let text = match view.status() {
            Some(status) => format!(
                "Questions: {} (remaining {})   Possible numbers: {}   Guesses: {} (remaining {})   State: {}",
                status.question_count,
                status.remaining_questions,
                status.possible_count,
                status.guess_attempts,
                status.remaining_guesses,
                status.game_state
            ),
            None => idle_hint(view.phase()),
        };
        let status = Paragraph::new(text)
            .style(Style::default().fg(Color::Green))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        frame.render_widget(status, area);
    }

    fn render_inputs(&self, frame: &mut Frame, area: Rect, view: &GameView) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let focus = self.effective_focus(view);
        let field_style = |enabled: bool, focused: bool| {
            if !enabled {
                Style::default().fg(Color::DarkGray)
            } else if focused {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            }
        };

        let ask_enabled = view.can_ask() && !*view.busy() && !view.is_game_over();
        let ask_title = if view.status().is_some() && !view.can_ask() && !view.is_game_over() {
            "Ask (max questions reached, guess only)"
        } else {
            "Ask a yes/no maths question"
        };
        let question = Paragraph::new(view.question_input().as_str())
            .style(field_style(ask_enabled, focus == InputFocus::Question))
            .block(Block::default().borders(Borders::ALL).title(ask_title));
        frame.render_widget(question, chunks[0]);

        let guess = Paragraph::new(view.guess_input().as_str())
            .style(field_style(view.can_guess(), focus == InputFocus::Guess))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Guess (0-500)"),
            );
        frame.render_widget(guess, chunks[1]);
    }

    fn render_outcome(&self, frame: &mut Frame, area: Rect, view: &GameView) {
        let mut lines = Vec::new();

        if let Some(error) = view.error() {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }

        if let Some(outcome) = view.last_guess() {
            let mut spans = vec![if outcome.correct {
                Span::styled("Correct!", Style::default().fg(Color::Green))
            } else {
                Span::styled("Incorrect.", Style::default().fg(Color::Yellow))
            }];
            if outcome.game_over
                && let Some(secret) = outcome.secret_number
            {
                spans.push(Span::raw(format!(" The secret number was {}.", secret)));
            }
            lines.push(Line::from(spans));
        }

        if let Some(status) = view.status().filter(|s| s.game_over) {
            let (text, color) = if status.won {
                ("You won!", Color::Green)
            } else {
                ("You lost.", Color::Red)
            };
            lines.push(Line::from(Span::styled(
                text,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
        }

        let outcome = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Result"));
        frame.render_widget(outcome, area);
    }

    fn render_history(&self, frame: &mut Frame, area: Rect, view: &GameView) {
        let items: Vec<ListItem> = view
            .history()
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                let answer_color = match record.answer {
                    crate::Answer::Yes => Color::Green,
                    crate::Answer::No => Color::Red,
                };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{}. {}  ", idx + 1, record.question)),
                    Span::styled(
                        format!("Answer: {}", record.answer),
                        Style::default().fg(answer_color),
                    ),
                ]))
            })
            .collect();

        let history = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Q&A History"),
        );
        frame.render_widget(history, area);
    }
}

impl Screen for GameScreen {
    #[instrument(skip(self, frame, view))]
    fn render(&self, frame: &mut Frame, view: &GameView) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(5),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0], view);
        self.render_status(frame, chunks[1], view);
        self.render_inputs(frame, chunks[2], view);
        self.render_outcome(frame, chunks[3], view);
        self.render_history(frame, chunks[4], view);

        let help = Paragraph::new(
            "Enter: submit | Tab: switch field | Ctrl-N: new game | Ctrl-S: stats | Ctrl-R: reload | Esc: quit",
        )
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, chunks[5]);
    }

    #[instrument(skip(self, key, view))]
    fn handle_key(&mut self, key: KeyEvent, view: &GameView) -> ScreenCommand {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('n') => ScreenCommand::Intent(UserIntent::Start),
                KeyCode::Char('s') => ScreenCommand::GoToStats,
                KeyCode::Char('r') => ScreenCommand::Intent(UserIntent::Resume),
                KeyCode::Char('c') | KeyCode::Char('q') => ScreenCommand::Quit,
                _ => ScreenCommand::Stay,
            };
        }

        let focus = self.effective_focus(view);
        match key.code {
            KeyCode::Esc if view.error().is_some() => {
                ScreenCommand::Intent(UserIntent::DismissError)
            }
            KeyCode::Esc => ScreenCommand::Quit,
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = self.focus.toggle();
                debug!(focus = ?self.focus, "Switched input focus");
                ScreenCommand::Stay
            }
            KeyCode::Enter if view.status().is_none() && !*view.busy() => {
                match view.phase() {
                    SessionPhase::Loading { .. } => ScreenCommand::Stay,
                    _ => ScreenCommand::Intent(UserIntent::Start),
                }
            }
            KeyCode::Enter => match focus {
                InputFocus::Question => ScreenCommand::Intent(UserIntent::Ask),
                InputFocus::Guess => ScreenCommand::Intent(UserIntent::Guess),
            },
            KeyCode::Backspace => {
                let mut text = match focus {
                    InputFocus::Question => view.question_input().clone(),
                    InputFocus::Guess => view.guess_input().clone(),
                };
                text.pop();
                edit(focus, text)
            }
            KeyCode::Char(c) => {
                let mut text = match focus {
                    InputFocus::Question => view.question_input().clone(),
                    InputFocus::Guess => view.guess_input().clone(),
                };
                text.push(c);
                edit(focus, text)
            }
            _ => ScreenCommand::Stay,
        }
    }
}

fn edit(focus: InputFocus, text: String) -> ScreenCommand {
    match focus {
        InputFocus::Question => ScreenCommand::Intent(UserIntent::EditQuestion(text)),
        InputFocus::Guess => ScreenCommand::Intent(UserIntent::EditGuess(text)),
    }
}

/// Status line shown while no game status is available.
fn idle_hint(phase: &SessionPhase) -> String {
    match phase {
        SessionPhase::Error {
            last_known_session: Some(session_id),
            ..
        } => format!(
            "Press Enter to start a new game or Ctrl-R to return to game {}…",
            short_id(session_id)
        ),
        SessionPhase::NoSession | SessionPhase::Error { .. } => {
            "Press Enter to start a new game.".to_string()
        }
        SessionPhase::Loading { .. } | SessionPhase::Ready { .. } => "Loading…".to_string(),
    }
}

fn short_id(session_id: &str) -> &str {
    match session_id.char_indices().nth(8) {
        Some((idx, _)) => &session_id[..idx],
        None => session_id,
    }
}
