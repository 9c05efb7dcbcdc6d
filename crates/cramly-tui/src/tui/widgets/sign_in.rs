// Sign-in screen: OAuth provider choices and the pending authorize URL.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use cramly_app::auth::OAuthProvider;
use cramly_app::protocol::BackendKind;
use cramly_core::route::Route;

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome to Cramly",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::raw("Your notes, flashcards and AI tutor in one place."),
        Line::raw(""),
    ];

    if state.backend == BackendKind::Unconfigured {
        lines.push(Line::from(Span::styled(
            "The hosted backend is not configured. Set its URL and anon key in config/, or switch to local mode.",
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::raw(""));
    }

    if state.route == Route::AuthCallback {
        lines.push(Line::from(Span::styled(
            "Signing you in...",
            Style::default().fg(Color::Yellow),
        )));
    } else {
        lines.push(Line::raw("Sign in with:"));
        for provider in OAuthProvider::ALL {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  [{}] ", provider_key(provider)),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::raw(provider.label()),
            ]));
        }
    }

    if let Some(url) = &state.authorize_url {
        lines.push(Line::raw(""));
        lines.push(Line::raw(
            "Open this URL in your browser, then paste the address you are redirected to:",
        ));
        lines.push(Line::from(Span::styled(
            url.clone(),
            Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", state.route.title())),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Key that starts sign-in with `provider`.
pub fn provider_key(provider: OAuthProvider) -> char {
    match provider {
        OAuthProvider::Slack => 's',
        OAuthProvider::Github => 'g',
        OAuthProvider::Discord => 'd',
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_keys_are_distinct() {
        let keys: Vec<char> = OAuthProvider::ALL.iter().map(|p| provider_key(*p)).collect();
        assert_eq!(keys, vec!['s', 'g', 'd']);
    }

    #[test]
    fn render_does_not_panic_with_authorize_url() {
        let backend = ratatui::backend::TestBackend::new(60, 20);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let mut state = ViewState::default();
        state.authorize_url =
            Some("https://x.supabase.co/auth/v1/authorize?provider=github".into());
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
    }
}
