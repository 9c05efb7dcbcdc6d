// Note data access. Failures are logged and handed back unchanged.

use tracing::error;

use cramly_core::error::StoreResult;
use cramly_core::model::{Note, NoteUpdate, DEFAULT_NOTE_CONTENT, DEFAULT_NOTE_TITLE};
use cramly_core::store::Store;

/// All notes, most recently updated first.
pub async fn list_notes(store: &dyn Store) -> StoreResult<Vec<Note>> {
    store
        .list_notes()
        .await
        .inspect_err(|e| error!("Error fetching notes: {e}"))
}

pub async fn get_note(store: &dyn Store, id: &str) -> StoreResult<Note> {
    store
        .get_note(id)
        .await
        .inspect_err(|e| error!("Error fetching note with id {id}: {e}"))
}

/// Create a note, using the placeholder title and content for missing parts.
pub async fn create_note(
    store: &dyn Store,
    title: Option<&str>,
    content: Option<&str>,
) -> StoreResult<Note> {
    store
        .insert_note(
            title.unwrap_or(DEFAULT_NOTE_TITLE),
            content.unwrap_or(DEFAULT_NOTE_CONTENT),
        )
        .await
        .inspect_err(|e| error!("Error creating note: {e}"))
}

pub async fn update_note(store: &dyn Store, id: &str, update: &NoteUpdate) -> StoreResult<Note> {
    store
        .update_note(id, update)
        .await
        .inspect_err(|e| error!("Error updating note with id {id}: {e}"))
}

pub async fn delete_note(store: &dyn Store, id: &str) -> StoreResult<()> {
    store
        .delete_note(id)
        .await
        .inspect_err(|e| error!("Error deleting note with id {id}: {e}"))
}
