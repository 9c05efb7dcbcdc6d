// Sidebar widget: numbered navigation between the signed-in screens.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use cramly_core::route::Route;

use crate::tui::ViewState;

/// Render the navigation sidebar into the given area.
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut lines = nav_lines(state.route, state.user.is_some());

    if let Some(user) = &state.user {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            user.display_name().to_string(),
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::from(Span::styled(
            "S: Sign out",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                " Cramly ",
                Style::default().add_modifier(Modifier::BOLD),
            )),
    );
    frame.render_widget(paragraph, area);
}

/// One line per navigation entry, the active screen highlighted. Entries
/// are dimmed while signed out.
pub fn nav_lines(active: Route, signed_in: bool) -> Vec<Line<'static>> {
    Route::NAVIGATION
        .iter()
        .enumerate()
        .map(|(i, route)| {
            let style = if *route == active {
                super::selected_style()
            } else if signed_in {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::from(Span::styled(format!(" {}: {} ", i + 1, route.title()), style))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
