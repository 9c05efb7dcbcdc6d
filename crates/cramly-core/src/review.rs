// Flashcard review: which card is showing and whether its answer is visible.

use crate::model::{Flashcard, FlashcardDeck};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewSession {
    cards: Vec<Flashcard>,
    index: usize,
    show_answer: bool,
}

impl ReviewSession {
    pub fn new(deck: &FlashcardDeck) -> Self {
        ReviewSession {
            cards: deck.flashcards.clone(),
            index: 0,
            show_answer: false,
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Zero-based position of the current card.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.index)
    }

    pub fn is_answer_shown(&self) -> bool {
        self.show_answer
    }

    pub fn flip(&mut self) {
        if !self.is_empty() {
            self.show_answer = !self.show_answer;
        }
    }

    /// Move to the next card, wrapping from the last to the first.
    pub fn next(&mut self) {
        if self.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.cards.len();
        self.show_answer = false;
    }

    /// Move to the previous card, wrapping from the first to the last.
    pub fn previous(&mut self) {
        if self.is_empty() {
            return;
        }
        self.index = (self.index + self.cards.len() - 1) % self.cards.len();
        self.show_answer = false;
    }

    pub fn restart(&mut self) {
        self.index = 0;
        self.show_answer = false;
    }
}
