// Notes screen: note list on the left, editor on the right.
//
// The editor shows the title and the raw content while editing, and a
// Markdown preview of the content otherwise.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use cramly_core::editor::EditField;
use cramly_core::export;

use super::{focused_border_style, selected_style};
use crate::tui::layout::split_list_detail;
use crate::tui::{InputMode, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (list_area, editor_area) = split_list_detail(area);
    render_list(frame, list_area, state);
    render_editor(frame, editor_area, state);
}

fn render_list(frame: &mut Frame, area: Rect, state: &ViewState) {
    let items: Vec<ListItem> = state
        .notes
        .iter()
        .map(|note| {
            let open = state.editor.note_id.as_deref() == Some(note.id.as_str());
            let marker = if note.is_unsaved { "* " } else { "  " };
            let style = if open {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::styled(note.title.clone(), style),
            ]))
        })
        .collect();

    let title = format!(" Notes ({}) ", state.notes.len());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(selected_style());

    let mut list_state = ListState::default();
    if !state.notes.is_empty() {
        list_state.select(Some(state.selected_note));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_editor(frame: &mut Frame, area: Rect, state: &ViewState) {
    if state.editor.note_id.is_none() {
        let hint = if state.notes.is_empty() {
            "No notes yet. Press n to create one."
        } else {
            "Select a note and press Enter to open it, or n for a new note."
        };
        let paragraph = Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray)))
            .block(Block::default().borders(Borders::ALL).title(" Editor "))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
        return;
    }

    let editing = match state.mode {
        InputMode::Editing(field) => Some(field),
        _ => None,
    };

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let mut title_text = state.editor.title.clone();
    if editing == Some(EditField::Title) {
        title_text.push('_');
    }
    let title = Paragraph::new(title_text)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Title ")
                .border_style(focused_border_style(editing == Some(EditField::Title))),
        );
    frame.render_widget(title, parts[0]);

    let body = if editing == Some(EditField::Content) {
        let mut raw = state.editor.content.clone();
        raw.push('_');
        raw
    } else {
        content_preview(&state.editor.title, &state.editor.content)
    };

    // Keep the end of the content in view while typing
    let inner_height = parts[1].height.saturating_sub(2) as usize;
    let line_count = body.lines().count();
    let scroll = if editing == Some(EditField::Content) && line_count > inner_height {
        (line_count - inner_height) as u16
    } else {
        0
    };

    let content = Paragraph::new(body)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(content_title(state))
                .border_style(focused_border_style(editing == Some(EditField::Content))),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(content, parts[1]);
}

/// Markdown rendering of the note body, without the title heading.
pub fn content_preview(title: &str, html: &str) -> String {
    let markdown = export::to_markdown(title, html);
    let heading = format!("# {title}\n\n");
    markdown
        .strip_prefix(&heading)
        .unwrap_or(&markdown)
        .trim_end()
        .to_string()
}

fn content_title(state: &ViewState) -> Line<'static> {
    let mut spans = vec![Span::raw(" Content ")];
    if state.ai_assist_pending {
        spans.push(Span::styled(
            "-- AI writing... ",
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(path) = &state.last_export {
        spans.push(Span::styled(
            format!("-- exported to {} ", path.display()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::tests::snapshot;
    use cramly_core::route::Route;

    #[test]
    fn content_preview_strips_heading_and_tags() {
        let preview = content_preview(
            "Cells",
            "<h2>Parts</h2><p>The <strong>nucleus</strong> holds DNA.</p>",
        );
        assert_eq!(preview, "## Parts\n\nThe **nucleus** holds DNA.");
    }

    #[test]
    fn render_does_not_panic_without_open_note() {
        let backend = ratatui::backend::TestBackend::new(100, 30);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let mut state = ViewState::default();
        state.apply_snapshot(snapshot(Route::Notes));
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
    }

    #[test]
    fn render_does_not_panic_while_editing() {
        let backend = ratatui::backend::TestBackend::new(100, 12);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let mut state = ViewState::default();
        let mut snap = snapshot(Route::Notes);
        snap.editor.note_id = Some("n1".into());
        snap.editor.title = "Cells".into();
        snap.editor.content = "<p>line</p>\n".repeat(40);
        snap.editor.dirty = true;
        snap.ai_assist_pending = true;
        state.apply_snapshot(snap);
        state.mode = InputMode::Editing(EditField::Content);
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
    }
}
