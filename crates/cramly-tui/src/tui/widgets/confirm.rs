// Confirmation overlays: quitting and deleting.
//
// Both render a centered modal on top of the main layout and answer to
// y/n (see `input::handle_confirm_quit` and `input::handle_confirm_delete`).

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use super::centered_rect;
use crate::tui::DeleteTarget;

const QUIT_WIDTH: u16 = 40;
const DELETE_WIDTH: u16 = 52;
const DIALOG_HEIGHT: u16 = 6;

/// Render the quit confirmation. `dirty` adds a warning about the open note.
pub fn render_quit(frame: &mut Frame, area: Rect, dirty: bool) {
    let message = if dirty {
        "You have unsaved changes. Quit anyway?"
    } else {
        "Really quit?"
    };
    render_dialog(frame, area, QUIT_WIDTH, " Quit? ", Color::Yellow, message.to_string());
}

pub fn render_delete(frame: &mut Frame, area: Rect, target: &DeleteTarget) {
    render_dialog(
        frame,
        area,
        DELETE_WIDTH,
        " Delete? ",
        Color::Red,
        delete_message(target),
    );
}

/// Deletion cannot be undone; the message says so.
pub fn delete_message(target: &DeleteTarget) -> String {
    format!("Delete {}? This cannot be undone.", target.describe())
}

fn render_dialog(
    frame: &mut Frame,
    area: Rect,
    width: u16,
    title: &'static str,
    color: Color,
    message: String,
) {
    let dialog_area = centered_rect(width, DIALOG_HEIGHT, area);

    // Clear the area behind the dialog so it renders cleanly on top
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(Span::styled(
            title,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));

    let text = vec![
        Line::raw(format!(" {message}")),
        Line::raw(""),
        Line::from(vec![
            Span::raw(" ("),
            Span::styled(
                "y",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw("/"),
            Span::styled(
                "n",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw(")"),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(Color::Black));

    frame.render_widget(paragraph, dialog_area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_message_names_target() {
        let target = DeleteTarget::Note {
            id: "n1".into(),
            title: "Cells".into(),
        };
        assert_eq!(
            delete_message(&target),
            "Delete note \"Cells\"? This cannot be undone."
        );
    }

    #[test]
    fn render_quit_does_not_panic() {
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render_quit(frame, frame.area(), true))
            .unwrap();
    }

    #[test]
    fn render_delete_does_not_panic_in_small_area() {
        let backend = ratatui::backend::TestBackend::new(20, 4);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let target = DeleteTarget::Conversation {
            id: "c1".into(),
            title: "Chat".into(),
        };
        terminal
            .draw(|frame| render_delete(frame, frame.area(), &target))
            .unwrap();
    }
}
