// AI tutor screen: conversation list on the left, transcript on the right.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use cramly_core::model::{Message, Role};

use super::selected_style;
use crate::tui::layout::split_list_detail;
use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (list_area, chat_area) = split_list_detail(area);
    render_conversations(frame, list_area, state);
    render_transcript(frame, chat_area, state);
}

fn render_conversations(frame: &mut Frame, area: Rect, state: &ViewState) {
    let items: Vec<ListItem> = state
        .conversations
        .iter()
        .map(|c| {
            let active = state.active_conversation.as_deref() == Some(c.id.as_str());
            let style = if active {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(c.title.clone(), style))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Conversations ({}) ", state.conversations.len())),
        )
        .highlight_style(selected_style());

    let mut list_state = ListState::default();
    if !state.conversations.is_empty() {
        list_state.select(Some(state.selected_conversation));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_transcript(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut lines: Vec<Line> = Vec::new();

    if state.active_conversation.is_none() {
        lines.push(Line::from(Span::styled(
            "Press i to ask a question, or n to start a new conversation.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for message in &state.messages {
        lines.extend(message_lines(message));
        lines.push(Line::raw(""));
    }
    if state.tutor_pending {
        lines.push(Line::from(Span::styled(
            "Tutor is thinking... (c to cancel)",
            Style::default().fg(Color::Yellow),
        )));
    }

    // Stick to the newest message
    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(inner_height) as u16;

    let title = state
        .active_conversation
        .as_deref()
        .and_then(|id| state.conversations.iter().find(|c| c.id == id))
        .map(|c| format!(" {} ", c.title))
        .unwrap_or_else(|| " AI Tutor ".to_string());

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

/// Speaker label followed by the message body, one line per source line.
pub fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let (label, color) = match message.role {
        Role::User => ("You", Color::Cyan),
        Role::Assistant => ("Tutor", Color::Green),
    };
    let mut lines = vec![Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))];
    let body_style = if message.is_local() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    lines.extend(
        message
            .content
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), body_style))),
    );
    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
