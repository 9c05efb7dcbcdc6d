// TUI widget modules for each screen and overlay.

pub mod confirm;
pub mod dashboard;
pub mod flashcards;
pub mod notes;
pub mod prompt_dialog;
pub mod sidebar;
pub mod sign_in;
pub mod status_bar;
pub mod toasts;
pub mod tutor;

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};

/// A `width` x `height` box centered in `area`, shrunk to fit when the
/// area is smaller.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .areas(row);
    cell
}

/// Style for the highlighted row of a list.
pub fn selected_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

/// Border style for the pane that currently takes keystrokes.
pub fn focused_border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_sits_in_the_middle() {
        let result = centered_rect(40, 6, Rect::new(0, 0, 80, 24));
        assert_eq!(result, Rect::new(20, 9, 40, 6));
    }

    #[test]
    fn centered_rect_respects_area_offset() {
        let result = centered_rect(10, 2, Rect::new(30, 5, 20, 10));
        assert_eq!(result, Rect::new(35, 9, 10, 2));
    }

    #[test]
    fn centered_rect_never_exceeds_area() {
        let area = Rect::new(0, 0, 10, 3);
        let result = centered_rect(40, 6, area);
        assert_eq!(result, area);
    }

    #[test]
    fn focused_border_is_highlighted() {
        assert_eq!(focused_border_style(true).fg, Some(Color::Cyan));
        assert_eq!(focused_border_style(false), Style::default());
    }
}
