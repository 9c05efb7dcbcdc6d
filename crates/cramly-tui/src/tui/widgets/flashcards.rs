// Flashcards screen.
//
// Left: saved decks. Right: either the generator (topic, card count and the
// unsaved generated cards) or, while reviewing, the current card.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use cramly_app::protocol::DeckReview;

use super::selected_style;
use crate::tui::layout::split_list_detail;
use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (list_area, detail_area) = split_list_detail(area);
    render_decks(frame, list_area, state);

    match (&state.review, state.reviewing) {
        (Some(review), true) => render_review(frame, detail_area, review),
        _ => render_generator(frame, detail_area, state),
    }
}

fn render_decks(frame: &mut Frame, area: Rect, state: &ViewState) {
    let items: Vec<ListItem> = state
        .decks
        .iter()
        .map(|deck| {
            ListItem::new(Line::from(vec![
                Span::raw(deck.title.clone()),
                Span::styled(
                    format!(" ({})", deck.card_count()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Decks ({}) ", state.decks.len())),
        )
        .highlight_style(selected_style());

    let mut list_state = ListState::default();
    if !state.decks.is_empty() {
        list_state.select(Some(state.selected_deck));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_generator(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut lines = vec![Line::from(vec![
        Span::raw("Cards per request: "),
        Span::styled(
            state.flashcard_count().to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  (+/- to change)", Style::default().fg(Color::DarkGray)),
    ])];

    if !state.ai_enabled {
        lines.push(Line::from(Span::styled(
            "AI endpoint not configured; generation is unavailable.",
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::raw(""));

    if state.generating {
        lines.push(Line::from(Span::styled(
            "Generating flashcards...",
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(generated) = &state.generated {
        lines.push(Line::from(Span::styled(
            format!(
                "{} cards about \"{}\" (s: save as deck, x: discard)",
                generated.cards.len(),
                generated.topic
            ),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for (i, card) in generated.cards.iter().enumerate() {
            lines.push(Line::raw(""));
            lines.push(Line::from(vec![
                Span::styled(format!("{}. Q: ", i + 1), Style::default().fg(Color::Cyan)),
                Span::raw(card.question.clone()),
            ]));
            lines.push(Line::from(vec![
                Span::styled("   A: ", Style::default().fg(Color::Green)),
                Span::raw(card.answer.clone()),
            ]));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "Press g to generate flashcards on a topic, or Enter to review a deck.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Generate "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_review(frame: &mut Frame, area: Rect, review: &DeckReview) {
    let session = &review.session;
    let mut lines = Vec::new();

    match session.current() {
        None => lines.push(Line::from(Span::styled(
            "This deck has no cards.",
            Style::default().fg(Color::DarkGray),
        ))),
        Some(card) => {
            lines.push(Line::from(Span::styled(
                progress_label(session.index(), session.len()),
                Style::default().fg(Color::DarkGray),
            )));
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled(
                "Question",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::raw(card.question.clone()));
            lines.push(Line::raw(""));
            if session.is_answer_shown() {
                lines.push(Line::from(Span::styled(
                    "Answer",
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::raw(card.answer.clone()));
            } else {
                lines.push(Line::from(Span::styled(
                    "Press Space to show the answer",
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", review.title)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// "Card 2 of 5" from a zero-based index.
pub fn progress_label(index: usize, len: usize) -> String {
    format!("Card {} of {}", index + 1, len)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::tests::snapshot;
    use chrono::Utc;
    use cramly_app::protocol::GeneratedCards;
    use cramly_core::model::{Flashcard, FlashcardDeck, NewFlashcard};
    use cramly_core::review::ReviewSession;
    use cramly_core::route::Route;

    fn deck() -> FlashcardDeck {
        let card = |id: &str, q: &str, a: &str| Flashcard {
            id: id.into(),
            deck_id: "d1".into(),
            question: q.into(),
            answer: a.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        FlashcardDeck {
            id: "d1".into(),
            title: "Salts".into(),
            user_id: Some("local".into()),
            ai_prompt: Some("Salts".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            flashcards: vec![card("f1", "NaCl?", "Table salt"), card("f2", "KCl?", "Potassium chloride")],
        }
    }

    fn draw(state: &ViewState) {
        let backend = ratatui::backend::TestBackend::new(100, 24);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), state))
            .unwrap();
    }

    #[test]
    fn progress_label_is_one_based() {
        assert_eq!(progress_label(0, 5), "Card 1 of 5");
        assert_eq!(progress_label(4, 5), "Card 5 of 5");
    }

    #[test]
    fn render_does_not_panic_with_generated_cards() {
        let mut state = ViewState::default();
        let mut snap = snapshot(Route::Flashcards);
        snap.decks = vec![deck()];
        snap.generated = Some(GeneratedCards {
            topic: "Cells".into(),
            cards: vec![NewFlashcard::new("What is a cell?", "The basic unit of life")],
        });
        state.apply_snapshot(snap);
        draw(&state);
    }

    #[test]
    fn render_does_not_panic_while_reviewing() {
        let mut state = ViewState::default();
        let mut snap = snapshot(Route::Flashcards);
        let d = deck();
        let mut session = ReviewSession::new(&d);
        session.flip();
        snap.review = Some(DeckReview {
            deck_id: d.id.clone(),
            title: d.title.clone(),
            session,
        });
        snap.decks = vec![d];
        state.apply_snapshot(snap);
        state.reviewing = true;
        draw(&state);
    }

    #[test]
    fn render_does_not_panic_for_empty_deck_review() {
        let mut state = ViewState::default();
        let mut snap = snapshot(Route::Flashcards);
        let mut d = deck();
        d.flashcards.clear();
        snap.review = Some(DeckReview {
            deck_id: d.id.clone(),
            title: d.title.clone(),
            session: ReviewSession::new(&d),
        });
        state.apply_snapshot(snap);
        state.reviewing = true;
        draw(&state);
    }
}
