// Toast notifications stacked in the bottom-right corner of the main panel.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use cramly_app::protocol::ToastKind;

use crate::tui::ToastEntry;

const TOAST_WIDTH: u16 = 44;
const TOAST_HEIGHT: u16 = 4;
/// Only the newest toasts are drawn.
const MAX_VISIBLE: usize = 3;

pub fn render(frame: &mut Frame, area: Rect, toasts: &[ToastEntry]) {
    let width = TOAST_WIDTH.min(area.width);
    let mut bottom = area.y + area.height;

    for entry in toasts.iter().rev().take(MAX_VISIBLE) {
        if bottom < area.y + TOAST_HEIGHT {
            break;
        }
        let toast_area = Rect::new(
            area.x + area.width - width,
            bottom - TOAST_HEIGHT,
            width,
            TOAST_HEIGHT,
        );
        bottom -= TOAST_HEIGHT;

        let color = kind_color(entry.toast.kind);
        frame.render_widget(Clear, toast_area);
        let paragraph = Paragraph::new(Line::raw(entry.toast.description.clone()))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color))
                    .title(Span::styled(
                        format!(" {} ", entry.toast.title),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    )),
            )
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        frame.render_widget(paragraph, toast_area);
    }
}

pub fn kind_color(kind: ToastKind) -> Color {
    match kind {
        ToastKind::Info => Color::Green,
        ToastKind::Error => Color::Red,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cramly_app::protocol::Toast;
    use std::time::Instant;

    fn entries(n: usize) -> Vec<ToastEntry> {
        (0..n)
            .map(|i| ToastEntry {
                toast: if i % 2 == 0 {
                    Toast::info("Note updated", "Your note has been saved.")
                } else {
                    Toast::error("Error", "Failed to save note")
                },
                shown_at: Instant::now(),
            })
            .collect()
    }

    #[test]
    fn kind_colors() {
        assert_eq!(kind_color(ToastKind::Info), Color::Green);
        assert_eq!(kind_color(ToastKind::Error), Color::Red);
    }

    #[test]
    fn render_does_not_panic_with_many_toasts() {
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let toasts = entries(5);
        terminal
            .draw(|frame| render(frame, frame.area(), &toasts))
            .unwrap();
    }

    #[test]
    fn render_does_not_panic_in_tiny_area() {
        let backend = ratatui::backend::TestBackend::new(10, 2);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let toasts = entries(2);
        terminal
            .draw(|frame| render(frame, frame.area(), &toasts))
            .unwrap();
    }
}
