// Screen layout: panel arrangement and sizing.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +------------+-------------------------------------+
// | Sidebar    | Main Panel (80%)                     |
// | (20%)      |                                      |
// +------------+-------------------------------------+
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+
//
// The main panel is split further by the screen that owns it.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Resolved screen areas for each zone.
#[derive(Debug, Clone)]
pub struct AppLayout {
    /// Top row: screen, user, backend and save state.
    pub status_bar: Rect,
    /// Left column: navigation.
    pub sidebar: Rect,
    /// Screen content.
    pub main_panel: Rect,
    /// Bottom row: keyboard shortcut hints.
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect) -> AppLayout {
    // Vertical: status(1) | middle(fill) | help(1)
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(6),    // middle section
            Constraint::Length(1), // help bar
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(20), Constraint::Percentage(80)])
        .split(vertical[1]);

    AppLayout {
        status_bar: vertical[0],
        sidebar: horizontal[0],
        main_panel: horizontal[1],
        help_bar: vertical[2],
    }
}

/// Split a screen's area into a list column (30%) and a detail pane.
pub fn split_list_detail(area: Rect) -> (Rect, Rect) {
    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);
    (parts[0], parts[1])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_area() -> Rect {
        Rect::new(0, 0, 120, 40)
    }

    #[test]
    fn layout_all_rects_nonzero() {
        let layout = build_layout(test_area());
        let rects = [
            ("status_bar", layout.status_bar),
            ("sidebar", layout.sidebar),
            ("main_panel", layout.main_panel),
            ("help_bar", layout.help_bar),
        ];
        for (name, rect) in &rects {
            assert!(
                rect.width > 0 && rect.height > 0,
                "{} has zero area: {:?}",
                name,
                rect
            );
        }
    }

    #[test]
    fn status_and_help_bars_are_one_row() {
        let layout = build_layout(test_area());
        assert_eq!(layout.status_bar.height, 1);
        assert_eq!(layout.help_bar.height, 1);
        assert_eq!(layout.help_bar.y, test_area().height - 1);
    }

    #[test]
    fn main_panel_wider_than_sidebar() {
        let layout = build_layout(test_area());
        assert!(layout.main_panel.width > layout.sidebar.width);
        assert_eq!(layout.sidebar.y, layout.main_panel.y);
    }

    #[test]
    fn list_detail_split_fills_area() {
        let area = Rect::new(10, 2, 100, 30);
        let (list, detail) = split_list_detail(area);
        assert_eq!(list.width + detail.width, area.width);
        assert_eq!(list.x, area.x);
        assert_eq!(detail.x, list.x + list.width);
    }

    #[test]
    fn small_terminal_still_valid() {
        let area = Rect::new(0, 0, 40, 10);
        let layout = build_layout(area);
        for rect in [layout.status_bar, layout.sidebar, layout.main_panel, layout.help_bar] {
            assert!(rect.width > 0 && rect.height > 0, "{:?}", rect);
            assert!(rect.y + rect.height <= area.height);
        }
    }
}
