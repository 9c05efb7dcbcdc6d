// The backend query interface.
//
// Each method is one row-level operation against one table: fetch rows
// filtered or ordered by a column, insert, update by id, delete by id.
// Multi-step behavior (deck + cards, deck deletion, the active-conversation
// fallback) lives in the data-access wrappers of the app crate, not here.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    Conversation, Flashcard, FlashcardDeck, Message, NewFlashcard, Note, NoteUpdate, Role, User,
};

/// Row-level access to the five Cramly tables.
///
/// Implemented by the hosted REST client, the local SQLite store and the
/// unconfigured stub. Deck rows are returned without their cards; cards are
/// fetched separately.
#[async_trait]
pub trait Store: Send + Sync {
    /// The signed-in user, or `None` when there is no session.
    async fn current_user(&self) -> StoreResult<Option<User>>;

    // --- notes ---

    /// All notes, most recently updated first.
    async fn list_notes(&self) -> StoreResult<Vec<Note>>;
    async fn get_note(&self, id: &str) -> StoreResult<Note>;
    async fn insert_note(&self, title: &str, content: &str) -> StoreResult<Note>;
    /// Apply `update` and bump `updated_at`. Returns the stored row.
    async fn update_note(&self, id: &str, update: &NoteUpdate) -> StoreResult<Note>;
    async fn delete_note(&self, id: &str) -> StoreResult<()>;

    // --- flashcard decks ---

    /// All decks, most recently updated first, without cards.
    async fn list_decks(&self) -> StoreResult<Vec<FlashcardDeck>>;
    async fn get_deck(&self, id: &str) -> StoreResult<FlashcardDeck>;
    async fn insert_deck(
        &self,
        title: &str,
        user_id: &str,
        ai_prompt: Option<&str>,
    ) -> StoreResult<FlashcardDeck>;
    async fn delete_deck(&self, id: &str) -> StoreResult<()>;

    // --- flashcards ---

    /// Cards belonging to any of `deck_ids`, oldest first.
    async fn list_cards(&self, deck_ids: &[String]) -> StoreResult<Vec<Flashcard>>;
    async fn insert_cards(&self, deck_id: &str, cards: &[NewFlashcard])
        -> StoreResult<Vec<Flashcard>>;
    async fn delete_cards(&self, deck_id: &str) -> StoreResult<()>;

    // --- conversations ---

    /// All conversations, newest first.
    async fn list_conversations(&self) -> StoreResult<Vec<Conversation>>;
    async fn get_conversation(&self, id: &str) -> StoreResult<Conversation>;
    async fn insert_conversation(&self, title: &str, user_id: &str) -> StoreResult<Conversation>;
    async fn update_conversation_title(&self, id: &str, title: &str) -> StoreResult<Conversation>;
    async fn delete_conversation(&self, id: &str) -> StoreResult<()>;

    // --- messages ---

    /// Messages of one conversation in creation order.
    async fn list_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>>;
    async fn insert_message(
        &self,
        conversation_id: &str,
        content: &str,
        role: Role,
    ) -> StoreResult<Message>;
}

// ---------------------------------------------------------------------------
// UnconfiguredStore
// ---------------------------------------------------------------------------

/// Stand-in used when no backend is configured. Every call fails with
/// `StoreError::MissingConfiguration` instead of the app refusing to start.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredStore;

#[async_trait]
impl Store for UnconfiguredStore {
    async fn current_user(&self) -> StoreResult<Option<User>> {
        Err(StoreError::MissingConfiguration)
    }

    async fn list_notes(&self) -> StoreResult<Vec<Note>> {
        Err(StoreError::MissingConfiguration)
    }

    async fn get_note(&self, _id: &str) -> StoreResult<Note> {
        Err(StoreError::MissingConfiguration)
    }

    async fn insert_note(&self, _title: &str, _content: &str) -> StoreResult<Note> {
        Err(StoreError::MissingConfiguration)
    }

    async fn update_note(&self, _id: &str, _update: &NoteUpdate) -> StoreResult<Note> {
        Err(StoreError::MissingConfiguration)
    }

    async fn delete_note(&self, _id: &str) -> StoreResult<()> {
        Err(StoreError::MissingConfiguration)
    }

    async fn list_decks(&self) -> StoreResult<Vec<FlashcardDeck>> {
        Err(StoreError::MissingConfiguration)
    }

    async fn get_deck(&self, _id: &str) -> StoreResult<FlashcardDeck> {
        Err(StoreError::MissingConfiguration)
    }

    async fn insert_deck(
        &self,
        _title: &str,
        _user_id: &str,
        _ai_prompt: Option<&str>,
    ) -> StoreResult<FlashcardDeck> {
        Err(StoreError::MissingConfiguration)
    }

    async fn delete_deck(&self, _id: &str) -> StoreResult<()> {
        Err(StoreError::MissingConfiguration)
    }

    async fn list_cards(&self, _deck_ids: &[String]) -> StoreResult<Vec<Flashcard>> {
        Err(StoreError::MissingConfiguration)
    }

    async fn insert_cards(
        &self,
        _deck_id: &str,
        _cards: &[NewFlashcard],
    ) -> StoreResult<Vec<Flashcard>> {
        Err(StoreError::MissingConfiguration)
    }

    async fn delete_cards(&self, _deck_id: &str) -> StoreResult<()> {
        Err(StoreError::MissingConfiguration)
    }

    async fn list_conversations(&self) -> StoreResult<Vec<Conversation>> {
        Err(StoreError::MissingConfiguration)
    }

    async fn get_conversation(&self, _id: &str) -> StoreResult<Conversation> {
        Err(StoreError::MissingConfiguration)
    }

    async fn insert_conversation(&self, _title: &str, _user_id: &str) -> StoreResult<Conversation> {
        Err(StoreError::MissingConfiguration)
    }

    async fn update_conversation_title(
        &self,
        _id: &str,
        _title: &str,
    ) -> StoreResult<Conversation> {
        Err(StoreError::MissingConfiguration)
    }

    async fn delete_conversation(&self, _id: &str) -> StoreResult<()> {
        Err(StoreError::MissingConfiguration)
    }

    async fn list_messages(&self, _conversation_id: &str) -> StoreResult<Vec<Message>> {
        Err(StoreError::MissingConfiguration)
    }

    async fn insert_message(
        &self,
        _conversation_id: &str,
        _content: &str,
        _role: Role,
    ) -> StoreResult<Message> {
        Err(StoreError::MissingConfiguration)
    }
}
