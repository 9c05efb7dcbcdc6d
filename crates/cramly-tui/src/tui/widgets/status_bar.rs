// Status bar widget: screen title, signed-in user, backend and save state.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use cramly_app::protocol::BackendKind;
use cramly_core::route::Route;

use crate::tui::ViewState;

/// Render the status bar into the given area.
///
/// Layout: [app name] [screen] | [user] | [backend] [AI] [save state]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut spans = vec![
        Span::styled(
            " Cramly ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", state.route.title()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled("| ", Style::default().fg(Color::Gray)),
        Span::styled(user_label(state), Style::default().fg(Color::White)),
        Span::styled(" | ", Style::default().fg(Color::Gray)),
    ];

    let (dot, dot_color) = backend_indicator(state.backend);
    spans.push(Span::styled(format!("{dot} "), Style::default().fg(dot_color)));
    spans.push(Span::styled(
        state.backend.label(),
        Style::default().fg(Color::White),
    ));

    spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
    let (ai_text, ai_color) = if state.ai_enabled {
        ("AI on", Color::Green)
    } else {
        ("AI off", Color::DarkGray)
    };
    spans.push(Span::styled(ai_text, Style::default().fg(ai_color)));

    if let Some((text, color)) = save_indicator(state) {
        spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(text, Style::default().fg(color)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Return the backend dot character and its color.
pub fn backend_indicator(kind: BackendKind) -> (&'static str, Color) {
    match kind {
        BackendKind::Hosted => ("●", Color::Green),
        BackendKind::Local => ("●", Color::Blue),
        BackendKind::Unconfigured => ("●", Color::Red),
    }
}

pub fn user_label(state: &ViewState) -> String {
    match &state.user {
        Some(user) => user.display_name().to_string(),
        None => "Signed out".to_string(),
    }
}

/// Save state of the open note, shown only on the notes screen.
pub fn save_indicator(state: &ViewState) -> Option<(String, Color)> {
    if state.route != Route::Notes || state.editor.note_id.is_none() {
        return None;
    }
    Some(if state.editor.dirty {
        (
            format!("Unsaved changes (auto-saves every {}s)", state.autosave_secs),
            Color::Yellow,
        )
    } else {
        ("Saved".to_string(), Color::Green)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
