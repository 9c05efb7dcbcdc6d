// Dashboard: greeting, counts and the most recently edited notes.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::tui::ViewState;

const RECENT_NOTES: usize = 5;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let paragraph = Paragraph::new(summary_lines(state))
        .block(Block::default().borders(Borders::ALL).title(" Dashboard "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

pub fn summary_lines(state: &ViewState) -> Vec<Line<'static>> {
    let name = state
        .user
        .as_ref()
        .map(|u| u.display_name().to_string())
        .unwrap_or_else(|| "there".to_string());

    let mut lines = vec![
        Line::from(Span::styled(
            format!("Welcome back, {name}!"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        stat_line("Notes", state.notes.len(), '2'),
        stat_line("Flashcard decks", state.decks.len(), '3'),
        stat_line("Tutor conversations", state.conversations.len(), '4'),
        Line::raw(""),
        Line::from(Span::styled(
            "Recent notes",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];

    if state.notes.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No notes yet. Press 2, then n to create one.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for note in state.notes.iter().take(RECENT_NOTES) {
        lines.push(Line::from(vec![
            Span::raw(format!("  {} ", note.title)),
            Span::styled(
                note.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }

    if !state.ai_enabled {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "AI features are off: no AI endpoint is configured.",
            Style::default().fg(Color::Yellow),
        )));
    }
    lines
}

fn stat_line(label: &str, count: usize, key: char) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {count:>4} "), Style::default().fg(Color::Cyan)),
        Span::raw(label.to_string()),
        Span::styled(format!("  ({key})"), Style::default().fg(Color::DarkGray)),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
