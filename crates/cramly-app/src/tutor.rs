// Tutor conversation and message data access.

use chrono::{DateTime, Local};
use tracing::{error, info};

use cramly_core::error::{StoreError, StoreResult};
use cramly_core::model::{Conversation, Message, Role, User, DEFAULT_CONVERSATION_TITLE};
use cramly_core::store::Store;

/// All conversations, newest first.
pub async fn list_conversations(store: &dyn Store) -> StoreResult<Vec<Conversation>> {
    store
        .list_conversations()
        .await
        .inspect_err(|e| error!("Error fetching conversations: {e}"))
}

pub async fn get_conversation(store: &dyn Store, id: &str) -> StoreResult<Conversation> {
    store
        .get_conversation(id)
        .await
        .inspect_err(|e| error!("Error fetching conversation {id}: {e}"))
}

/// Messages of a conversation in the order they were written.
pub async fn list_messages(store: &dyn Store, conversation_id: &str) -> StoreResult<Vec<Message>> {
    store
        .list_messages(conversation_id)
        .await
        .inspect_err(|e| error!("Error fetching messages: {e}"))
}

async fn require_user(store: &dyn Store) -> StoreResult<User> {
    store
        .current_user()
        .await
        .inspect_err(|e| error!("Error getting user: {e}"))?
        .ok_or_else(|| StoreError::not_authenticated("User not authenticated"))
}

/// New conversation owned by the signed-in user.
pub async fn create_conversation(
    store: &dyn Store,
    title: Option<&str>,
) -> StoreResult<Conversation> {
    let user = require_user(store).await?;
    store
        .insert_conversation(title.unwrap_or(DEFAULT_CONVERSATION_TITLE), &user.id)
        .await
        .inspect_err(|e| error!("Error creating conversation: {e}"))
}

pub async fn rename_conversation(
    store: &dyn Store,
    id: &str,
    title: &str,
) -> StoreResult<Conversation> {
    store
        .update_conversation_title(id, title)
        .await
        .inspect_err(|e| error!("Error updating conversation title: {e}"))
}

/// Delete a conversation; its messages go with it.
pub async fn delete_conversation(store: &dyn Store, id: &str) -> StoreResult<()> {
    store
        .delete_conversation(id)
        .await
        .inspect_err(|e| error!("Error deleting conversation: {e}"))
}

pub async fn add_message(
    store: &dyn Store,
    conversation_id: &str,
    content: &str,
    role: Role,
) -> StoreResult<Message> {
    store
        .insert_message(conversation_id, content, role)
        .await
        .inspect_err(|e| error!("Error adding message: {e}"))
}

/// Title for a conversation started automatically, e.g. `Chat Mar 4, 3:07 PM`.
pub fn chat_title(now: DateTime<Local>) -> String {
    format!("Chat {}", now.format("%b %-d, %-I:%M %p"))
}

/// The newest conversation, or a fresh dated one when there are none.
pub async fn active_conversation(store: &dyn Store) -> StoreResult<Conversation> {
    require_user(store).await?;

    let conversations = list_conversations(store).await?;
    if let Some(newest) = conversations.into_iter().next() {
        return Ok(newest);
    }

    let title = chat_title(Local::now());
    info!("No conversations yet, starting \"{title}\"");
    create_conversation(store, Some(&title)).await
}
