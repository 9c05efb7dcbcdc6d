// Record shapes shared by every store backend.
//
// Field names match the backend columns so the same structs deserialize from
// PostgREST JSON rows and are filled from SQLite rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Title given to a freshly created note.
pub const DEFAULT_NOTE_TITLE: &str = "Untitled Note";

/// Content given to a freshly created note.
pub const DEFAULT_NOTE_CONTENT: &str =
    "<h1>Hello, world!</h1><p>Start typing to create your notes.</p>";

/// Title used when a conversation is created without one.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    /// HTML produced by the editor.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Client-only marker for the notes list; never persisted.
    #[serde(skip)]
    pub is_unsaved: bool,
}

/// Partial update applied to a note row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NoteUpdate {
    /// Update both title and content, the shape every editor save uses.
    pub fn full(title: impl Into<String>, content: impl Into<String>) -> Self {
        NoteUpdate {
            title: Some(title.into()),
            content: Some(content.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Flashcards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardDeck {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Topic the cards were generated from, when they came from the AI.
    #[serde(default)]
    pub ai_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Cards ordered by creation time. Not a backend column; filled by the
    /// data-access layer.
    #[serde(default, skip_serializing)]
    pub flashcards: Vec<Flashcard>,
}

impl FlashcardDeck {
    pub fn card_count(&self) -> usize {
        self.flashcards.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub deck_id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A question/answer pair that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFlashcard {
    pub question: String,
    pub answer: String,
}

impl NewFlashcard {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        NewFlashcard {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tutor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a message that only lives in the client (placeholder errors,
    /// cancellation notices). Its id is prefixed with `local-`.
    pub fn local(conversation_id: &str, role: Role, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Message {
            id: format!("local-{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.to_string(),
            content: content.into(),
            role,
            created_at: now,
        }
    }

    pub fn is_local(&self) -> bool {
        self.id.starts_with("local-")
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl User {
    /// Name shown in the dashboard greeting.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

/// An authenticated session with the hosted backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
