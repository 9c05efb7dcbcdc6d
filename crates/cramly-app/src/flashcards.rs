// Flashcard deck data access.
//
// Decks and cards are separate rows; these functions assemble decks with
// their cards and run the two-step create and delete sequences.

use tracing::{error, info};

use cramly_core::error::{StoreError, StoreResult};
use cramly_core::model::{FlashcardDeck, NewFlashcard};
use cramly_core::store::Store;

/// All decks, most recently updated first, each with its cards.
pub async fn list_decks(store: &dyn Store) -> StoreResult<Vec<FlashcardDeck>> {
    let mut decks = store
        .list_decks()
        .await
        .inspect_err(|e| error!("Error fetching flashcard decks: {e}"))?;
    if decks.is_empty() {
        return Ok(decks);
    }

    let ids: Vec<String> = decks.iter().map(|d| d.id.clone()).collect();
    let cards = store
        .list_cards(&ids)
        .await
        .inspect_err(|e| error!("Error fetching flashcards: {e}"))?;

    for deck in &mut decks {
        deck.flashcards = cards
            .iter()
            .filter(|c| c.deck_id == deck.id)
            .cloned()
            .collect();
    }
    Ok(decks)
}

/// One deck with its cards in creation order.
pub async fn get_deck(store: &dyn Store, id: &str) -> StoreResult<FlashcardDeck> {
    let mut deck = store
        .get_deck(id)
        .await
        .inspect_err(|e| error!("Error fetching flashcard deck {id}: {e}"))?;
    deck.flashcards = store
        .list_cards(&[id.to_string()])
        .await
        .inspect_err(|e| error!("Error fetching flashcards for deck {id}: {e}"))?;
    Ok(deck)
}

/// Insert a deck owned by the signed-in user, then its cards.
///
/// The two inserts are not atomic: when the card insert fails the deck row
/// stays behind, empty.
pub async fn create_deck(
    store: &dyn Store,
    title: &str,
    cards: &[NewFlashcard],
    ai_prompt: Option<&str>,
) -> StoreResult<FlashcardDeck> {
    let user = store.current_user().await?.ok_or_else(|| {
        StoreError::not_authenticated("User must be logged in to create flashcard decks")
    })?;

    let mut deck = store
        .insert_deck(title, &user.id, ai_prompt)
        .await
        .inspect_err(|e| error!("Error creating flashcard deck: {e}"))?;

    if !cards.is_empty() {
        deck.flashcards = store
            .insert_cards(&deck.id, cards)
            .await
            .inspect_err(|e| error!("Error creating flashcards for deck {}: {e}", deck.id))?;
    }

    info!("Created deck {} with {} cards", deck.id, deck.card_count());
    Ok(deck)
}

/// Delete a deck's cards, then the deck.
pub async fn delete_deck(store: &dyn Store, id: &str) -> StoreResult<()> {
    store
        .delete_cards(id)
        .await
        .inspect_err(|e| error!("Error deleting flashcards for deck {id}: {e}"))?;
    store
        .delete_deck(id)
        .await
        .inspect_err(|e| error!("Error deleting flashcard deck {id}: {e}"))
}
