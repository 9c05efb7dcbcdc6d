// SQLite persistence: the local store backend and the key-value state table
// that keeps the auth session across restarts.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    Conversation, Flashcard, FlashcardDeck, Message, NewFlashcard, Note, NoteUpdate, Role,
    Session, User,
};
use crate::store::Store;

/// SQLite-backed storage for notes, decks, cards, tutor conversations and
/// key-value app state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Missing parent directories are created. Pass `":memory:"` for
    /// an ephemeral in-memory database (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            let parent = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS notes (
                id         TEXT PRIMARY KEY,
                title      TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS flashcard_decks (
                id         TEXT PRIMARY KEY,
                title      TEXT NOT NULL,
                user_id    TEXT,
                ai_prompt  TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS flashcards (
                id         TEXT PRIMARY KEY,
                deck_id    TEXT NOT NULL REFERENCES flashcard_decks(id) ON DELETE CASCADE,
                question   TEXT NOT NULL,
                answer     TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ai_conversations (
                id         TEXT PRIMARY KEY,
                title      TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ai_messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES ai_conversations(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                role            TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                created_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS app_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_flashcards_deck_id ON flashcards(deck_id);
            CREATE INDEX IF NOT EXISTS idx_ai_messages_conversation_id ON ai_messages(conversation_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE so
    /// repeated saves overwrite the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO app_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query app state")?;

        match json_str {
            Some(s) => {
                let value = serde_json::from_str(&s).context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn delete_state(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM app_state WHERE key = ?1", params![key])
            .context("failed to delete state")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    const SESSION_KEY: &'static str = "auth_session";

    /// The session saved by the last sign-in, if any. A stored value that no
    /// longer deserializes is treated as absent.
    pub fn load_session(&self) -> Result<Option<Session>> {
        let value = self.load_state(Self::SESSION_KEY)?;
        Ok(value.and_then(|v| serde_json::from_value(v).ok()))
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        let value = serde_json::to_value(session).context("failed to serialize session")?;
        self.save_state(Self::SESSION_KEY, &value)
    }

    pub fn clear_session(&self) -> Result<()> {
        self.delete_state(Self::SESSION_KEY)
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub fn list_notes(&self) -> Result<Vec<Note>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, content, created_at, updated_at
                 FROM notes ORDER BY updated_at DESC, rowid DESC",
            )
            .context("failed to prepare list_notes query")?;

        let notes = stmt
            .query_map([], note_from_row)
            .context("failed to query notes")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map note rows")?;
        Ok(notes)
    }

    pub fn get_note(&self, id: &str) -> Result<Option<Note>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, title, content, created_at, updated_at FROM notes WHERE id = ?1",
            params![id],
            note_from_row,
        )
        .optional()
        .context("failed to query note")
    }

    pub fn insert_note(&self, title: &str, content: &str) -> Result<Note> {
        let now = Utc::now();
        let note = Note {
            id: new_id(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
            is_unsaved: false,
        };
        let conn = self.conn();
        conn.execute(
            "INSERT INTO notes (id, title, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![note.id, note.title, note.content, format_ts(now)],
        )
        .context("failed to insert note")?;
        Ok(note)
    }

    /// Apply a partial update. Returns `None` when no row has `id`.
    pub fn update_note(&self, id: &str, update: &NoteUpdate) -> Result<Option<Note>> {
        {
            let conn = self.conn();
            conn.execute(
                "UPDATE notes SET
                    title      = COALESCE(?1, title),
                    content    = COALESCE(?2, content),
                    updated_at = ?3
                 WHERE id = ?4",
                params![update.title, update.content, format_ts(Utc::now()), id],
            )
            .context("failed to update note")?;
        }
        self.get_note(id)
    }

    /// Returns `true` if a row was deleted.
    pub fn delete_note(&self, id: &str) -> Result<bool> {
        let conn = self.conn();
        let n = conn
            .execute("DELETE FROM notes WHERE id = ?1", params![id])
            .context("failed to delete note")?;
        Ok(n > 0)
    }

    // ------------------------------------------------------------------
    // Flashcard decks
    // ------------------------------------------------------------------

    pub fn list_decks(&self) -> Result<Vec<FlashcardDeck>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, user_id, ai_prompt, created_at, updated_at
                 FROM flashcard_decks ORDER BY updated_at DESC, rowid DESC",
            )
            .context("failed to prepare list_decks query")?;

        let decks = stmt
            .query_map([], deck_from_row)
            .context("failed to query flashcard decks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map flashcard deck rows")?;
        Ok(decks)
    }

    pub fn get_deck(&self, id: &str) -> Result<Option<FlashcardDeck>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, title, user_id, ai_prompt, created_at, updated_at
             FROM flashcard_decks WHERE id = ?1",
            params![id],
            deck_from_row,
        )
        .optional()
        .context("failed to query flashcard deck")
    }

    pub fn insert_deck(
        &self,
        title: &str,
        user_id: &str,
        ai_prompt: Option<&str>,
    ) -> Result<FlashcardDeck> {
        let now = Utc::now();
        let deck = FlashcardDeck {
            id: new_id(),
            title: title.to_string(),
            user_id: Some(user_id.to_string()),
            ai_prompt: ai_prompt.map(str::to_string),
            created_at: now,
            updated_at: now,
            flashcards: Vec::new(),
        };
        let conn = self.conn();
        conn.execute(
            "INSERT INTO flashcard_decks (id, title, user_id, ai_prompt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![deck.id, deck.title, deck.user_id, deck.ai_prompt, format_ts(now)],
        )
        .context("failed to insert flashcard deck")?;
        Ok(deck)
    }

    pub fn delete_deck(&self, id: &str) -> Result<bool> {
        let conn = self.conn();
        let n = conn
            .execute("DELETE FROM flashcard_decks WHERE id = ?1", params![id])
            .context("failed to delete flashcard deck")?;
        Ok(n > 0)
    }

    // ------------------------------------------------------------------
    // Flashcards
    // ------------------------------------------------------------------

    /// Cards of every deck in `deck_ids`, oldest first.
    pub fn list_cards(&self, deck_ids: &[String]) -> Result<Vec<Flashcard>> {
        if deck_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; deck_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, deck_id, question, answer, created_at, updated_at
             FROM flashcards WHERE deck_id IN ({placeholders})
             ORDER BY created_at ASC, rowid ASC"
        );

        let conn = self.conn();
        let mut stmt = conn
            .prepare(&sql)
            .context("failed to prepare list_cards query")?;
        let cards = stmt
            .query_map(params_from_iter(deck_ids.iter()), card_from_row)
            .context("failed to query flashcards")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map flashcard rows")?;
        Ok(cards)
    }

    /// Insert all `cards` into `deck_id` in a single transaction, preserving
    /// their order.
    pub fn insert_cards(&self, deck_id: &str, cards: &[NewFlashcard]) -> Result<Vec<Flashcard>> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin flashcard transaction")?;

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(cards.len());
        for card in cards {
            let row = Flashcard {
                id: new_id(),
                deck_id: deck_id.to_string(),
                question: card.question.clone(),
                answer: card.answer.clone(),
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                "INSERT INTO flashcards (id, deck_id, question, answer, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![row.id, row.deck_id, row.question, row.answer, format_ts(now)],
            )
            .context("failed to insert flashcard")?;
            inserted.push(row);
        }

        tx.commit().context("failed to commit flashcards")?;
        Ok(inserted)
    }

    pub fn delete_cards(&self, deck_id: &str) -> Result<usize> {
        let conn = self.conn();
        let n = conn
            .execute("DELETE FROM flashcards WHERE deck_id = ?1", params![deck_id])
            .context("failed to delete flashcards")?;
        Ok(n)
    }

    // ------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------

    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, user_id, created_at, updated_at
                 FROM ai_conversations ORDER BY created_at DESC, rowid DESC",
            )
            .context("failed to prepare list_conversations query")?;

        let conversations = stmt
            .query_map([], conversation_from_row)
            .context("failed to query conversations")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map conversation rows")?;
        Ok(conversations)
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, title, user_id, created_at, updated_at
             FROM ai_conversations WHERE id = ?1",
            params![id],
            conversation_from_row,
        )
        .optional()
        .context("failed to query conversation")
    }

    pub fn insert_conversation(&self, title: &str, user_id: &str) -> Result<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: new_id(),
            title: title.to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        let conn = self.conn();
        conn.execute(
            "INSERT INTO ai_conversations (id, title, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                conversation.id,
                conversation.title,
                conversation.user_id,
                format_ts(now)
            ],
        )
        .context("failed to insert conversation")?;
        Ok(conversation)
    }

    pub fn update_conversation_title(&self, id: &str, title: &str) -> Result<Option<Conversation>> {
        {
            let conn = self.conn();
            conn.execute(
                "UPDATE ai_conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, format_ts(Utc::now()), id],
            )
            .context("failed to rename conversation")?;
        }
        self.get_conversation(id)
    }

    /// Delete a conversation; its messages are removed by the cascade.
    pub fn delete_conversation(&self, id: &str) -> Result<bool> {
        let conn = self.conn();
        let n = conn
            .execute("DELETE FROM ai_conversations WHERE id = ?1", params![id])
            .context("failed to delete conversation")?;
        Ok(n > 0)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, content, role, created_at
                 FROM ai_messages WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )
            .context("failed to prepare list_messages query")?;

        let messages = stmt
            .query_map(params![conversation_id], message_from_row)
            .context("failed to query messages")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map message rows")?;
        Ok(messages)
    }

    pub fn insert_message(&self, conversation_id: &str, content: &str, role: Role) -> Result<Message> {
        let now = Utc::now();
        let message = Message {
            id: new_id(),
            conversation_id: conversation_id.to_string(),
            content: content.to_string(),
            role,
            created_at: now,
        };
        let conn = self.conn();
        conn.execute(
            "INSERT INTO ai_messages (id, conversation_id, content, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id,
                message.conversation_id,
                message.content,
                role.as_str(),
                format_ts(now)
            ],
        )
        .context("failed to insert message")?;
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Timestamps are stored as fixed-width RFC 3339 text so that string order
/// matches time order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: ts_column(row, 3)?,
        updated_at: ts_column(row, 4)?,
        is_unsaved: false,
    })
}

fn deck_from_row(row: &Row<'_>) -> rusqlite::Result<FlashcardDeck> {
    Ok(FlashcardDeck {
        id: row.get(0)?,
        title: row.get(1)?,
        user_id: row.get(2)?,
        ai_prompt: row.get(3)?,
        created_at: ts_column(row, 4)?,
        updated_at: ts_column(row, 5)?,
        flashcards: Vec::new(),
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        deck_id: row.get(1)?,
        question: row.get(2)?,
        answer: row.get(3)?,
        created_at: ts_column(row, 4)?,
        updated_at: ts_column(row, 5)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        user_id: row.get(2)?,
        created_at: ts_column(row, 3)?,
        updated_at: ts_column(row, 4)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let raw_role: String = row.get(3)?;
    let role = Role::parse(&raw_role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown message role {raw_role:?}").into(),
        )
    })?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        content: row.get(2)?,
        role,
        created_at: ts_column(row, 4)?,
    })
}

// ---------------------------------------------------------------------------
// LocalStore
// ---------------------------------------------------------------------------

/// `Store` over the local SQLite database. There is exactly one user, the
/// owner of the machine, so every operation is authenticated.
pub struct LocalStore {
    db: Arc<Database>,
    user: User,
}

impl LocalStore {
    pub fn new(db: Arc<Database>, user: User) -> Self {
        LocalStore { db, user }
    }

    /// The fixed identity used in local mode.
    pub fn local_user(name: &str) -> User {
        User {
            id: "local".to_string(),
            email: None,
            full_name: Some(name.to_string()),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn current_user(&self) -> StoreResult<Option<User>> {
        Ok(Some(self.user.clone()))
    }

    async fn list_notes(&self) -> StoreResult<Vec<Note>> {
        Ok(self.db.list_notes()?)
    }

    async fn get_note(&self, id: &str) -> StoreResult<Note> {
        self.db
            .get_note(id)?
            .ok_or_else(|| StoreError::not_found("note", id))
    }

    async fn insert_note(&self, title: &str, content: &str) -> StoreResult<Note> {
        Ok(self.db.insert_note(title, content)?)
    }

    async fn update_note(&self, id: &str, update: &NoteUpdate) -> StoreResult<Note> {
        self.db
            .update_note(id, update)?
            .ok_or_else(|| StoreError::not_found("note", id))
    }

    async fn delete_note(&self, id: &str) -> StoreResult<()> {
        self.db.delete_note(id)?;
        Ok(())
    }

    async fn list_decks(&self) -> StoreResult<Vec<FlashcardDeck>> {
        Ok(self.db.list_decks()?)
    }

    async fn get_deck(&self, id: &str) -> StoreResult<FlashcardDeck> {
        self.db
            .get_deck(id)?
            .ok_or_else(|| StoreError::not_found("flashcard deck", id))
    }

    async fn insert_deck(
        &self,
        title: &str,
        user_id: &str,
        ai_prompt: Option<&str>,
    ) -> StoreResult<FlashcardDeck> {
        Ok(self.db.insert_deck(title, user_id, ai_prompt)?)
    }

    async fn delete_deck(&self, id: &str) -> StoreResult<()> {
        self.db.delete_deck(id)?;
        Ok(())
    }

    async fn list_cards(&self, deck_ids: &[String]) -> StoreResult<Vec<Flashcard>> {
        Ok(self.db.list_cards(deck_ids)?)
    }

    async fn insert_cards(
        &self,
        deck_id: &str,
        cards: &[NewFlashcard],
    ) -> StoreResult<Vec<Flashcard>> {
        Ok(self.db.insert_cards(deck_id, cards)?)
    }

    async fn delete_cards(&self, deck_id: &str) -> StoreResult<()> {
        self.db.delete_cards(deck_id)?;
        Ok(())
    }

    async fn list_conversations(&self) -> StoreResult<Vec<Conversation>> {
        Ok(self.db.list_conversations()?)
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Conversation> {
        self.db
            .get_conversation(id)?
            .ok_or_else(|| StoreError::not_found("conversation", id))
    }

    async fn insert_conversation(&self, title: &str, user_id: &str) -> StoreResult<Conversation> {
        Ok(self.db.insert_conversation(title, user_id)?)
    }

    async fn update_conversation_title(&self, id: &str, title: &str) -> StoreResult<Conversation> {
        self.db
            .update_conversation_title(id, title)?
            .ok_or_else(|| StoreError::not_found("conversation", id))
    }

    async fn delete_conversation(&self, id: &str) -> StoreResult<()> {
        self.db.delete_conversation(id)?;
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        Ok(self.db.list_messages(conversation_id)?)
    }

    async fn insert_message(
        &self,
        conversation_id: &str,
        content: &str,
        role: Role,
    ) -> StoreResult<Message> {
        Ok(self.db.insert_message(conversation_id, content, role)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn cards(n: usize) -> Vec<NewFlashcard> {
        (1..=n)
            .map(|i| NewFlashcard::new(format!("Q{i}"), format!("A{i}")))
            .collect()
    }

    // ------------------------------------------------------------------
    // Schema / open
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("share").join("cramly").join("cramly.db");

        let db = Database::open(&path.to_string_lossy()).expect("nested path should open");
        db.insert_note("Cells", "<p>x</p>").unwrap();
        drop(db);

        assert!(path.exists());
        let reopened = Database::open(&path.to_string_lossy()).unwrap();
        assert_eq!(reopened.list_notes().unwrap().len(), 1);
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "notes",
            "flashcard_decks",
            "flashcards",
            "ai_conversations",
            "ai_messages",
            "app_state",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn timestamps_sort_as_text() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(format_ts(earlier) < format_ts(later));
        assert_eq!(format_ts(earlier).len(), format_ts(later).len());
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    #[test]
    fn save_and_load_state_round_trip() {
        let db = test_db();
        let value = json!({"theme": "dark", "count": 3});
        db.save_state("prefs", &value).unwrap();
        assert_eq!(db.load_state("prefs").unwrap(), Some(value));
    }

    #[test]
    fn load_state_returns_none_for_missing_key() {
        let db = test_db();
        assert!(db.load_state("nope").unwrap().is_none());
    }

    #[test]
    fn session_persists_and_clears() {
        let db = test_db();
        let session = Session {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            token_type: "bearer".into(),
            expires_at: None,
            user: LocalStore::local_user("Ada"),
        };
        db.save_session(&session).unwrap();
        assert_eq!(db.load_session().unwrap(), Some(session));

        db.clear_session().unwrap();
        assert!(db.load_session().unwrap().is_none());
    }

    #[test]
    fn corrupt_session_is_treated_as_absent() {
        let db = test_db();
        db.save_state("auth_session", &json!({"nonsense": true}))
            .unwrap();
        assert!(db.load_session().unwrap().is_none());
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    #[test]
    fn notes_are_listed_most_recently_updated_first() {
        let db = test_db();
        let a = db.insert_note("A", "<p>a</p>").unwrap();
        let b = db.insert_note("B", "<p>b</p>").unwrap();

        let ids: Vec<_> = db.list_notes().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id.clone(), a.id.clone()]);

        db.update_note(&a.id, &NoteUpdate::full("A2", "<p>a2</p>"))
            .unwrap();
        let ids: Vec<_> = db.list_notes().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = test_db();
        let note = db.insert_note("Title", "<p>body</p>").unwrap();

        let updated = db
            .update_note(
                &note.id,
                &NoteUpdate {
                    title: Some("New".into()),
                    content: None,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.content, "<p>body</p>");
        assert!(updated.updated_at >= note.updated_at);
    }

    #[test]
    fn update_missing_note_returns_none() {
        let db = test_db();
        assert!(db
            .update_note("missing", &NoteUpdate::full("t", "c"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_note_reports_whether_a_row_went() {
        let db = test_db();
        let note = db.insert_note("t", "c").unwrap();
        assert!(db.delete_note(&note.id).unwrap());
        assert!(!db.delete_note(&note.id).unwrap());
        assert!(db.get_note(&note.id).unwrap().is_none());
    }

    // ------------------------------------------------------------------
    // Decks and cards
    // ------------------------------------------------------------------

    #[test]
    fn cards_keep_insertion_order() {
        let db = test_db();
        let deck = db.insert_deck("Bio", "local", Some("cells")).unwrap();
        db.insert_cards(&deck.id, &cards(3)).unwrap();

        let stored = db.list_cards(&[deck.id.clone()]).unwrap();
        let questions: Vec<_> = stored.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(questions, vec!["Q1", "Q2", "Q3"]);
    }

    #[test]
    fn list_cards_filters_by_deck_ids() {
        let db = test_db();
        let a = db.insert_deck("A", "local", None).unwrap();
        let b = db.insert_deck("B", "local", None).unwrap();
        let c = db.insert_deck("C", "local", None).unwrap();
        db.insert_cards(&a.id, &cards(2)).unwrap();
        db.insert_cards(&b.id, &cards(1)).unwrap();
        db.insert_cards(&c.id, &cards(4)).unwrap();

        let selected = db.list_cards(&[a.id.clone(), b.id.clone()]).unwrap();
        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(|card| card.deck_id != c.id));
        assert!(db.list_cards(&[]).unwrap().is_empty());
    }

    #[test]
    fn cards_require_an_existing_deck() {
        let db = test_db();
        assert!(db.insert_cards("no-such-deck", &cards(1)).is_err());
        // The failed transaction rolled back.
        assert!(db.list_cards(&["no-such-deck".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn deleting_a_deck_cascades_to_cards() {
        let db = test_db();
        let deck = db.insert_deck("Bio", "local", None).unwrap();
        db.insert_cards(&deck.id, &cards(2)).unwrap();

        assert!(db.delete_deck(&deck.id).unwrap());
        assert!(db.get_deck(&deck.id).unwrap().is_none());
        assert!(db.list_cards(&[deck.id]).unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // Conversations and messages
    // ------------------------------------------------------------------

    #[test]
    fn conversations_newest_first_and_rename() {
        let db = test_db();
        let first = db.insert_conversation("first", "local").unwrap();
        let second = db.insert_conversation("second", "local").unwrap();

        let listed = db.list_conversations().unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        let renamed = db
            .update_conversation_title(&first.id, "renamed")
            .unwrap()
            .unwrap();
        assert_eq!(renamed.title, "renamed");
        // Renaming does not change creation order.
        assert_eq!(db.list_conversations().unwrap()[1].id, first.id);
    }

    #[test]
    fn messages_are_totally_ordered() {
        let db = test_db();
        let conv = db.insert_conversation("c", "local").unwrap();
        for i in 0..5 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            db.insert_message(&conv.id, &format!("m{i}"), role).unwrap();
        }

        let contents: Vec<_> = db
            .list_messages(&conv.id)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn deleting_a_conversation_removes_its_messages() {
        let db = test_db();
        let conv = db.insert_conversation("c", "local").unwrap();
        db.insert_message(&conv.id, "hi", Role::User).unwrap();

        assert!(db.delete_conversation(&conv.id).unwrap());
        assert!(db.list_messages(&conv.id).unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // LocalStore
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn local_store_maps_missing_rows_to_not_found() {
        let store = LocalStore::new(Arc::new(test_db()), LocalStore::local_user("me"));
        let err = store.get_note("missing").await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.get_deck("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn local_store_is_always_signed_in() {
        let store = LocalStore::new(Arc::new(test_db()), LocalStore::local_user("me"));
        let user = store.current_user().await.unwrap().unwrap();
        assert_eq!(user.id, "local");
        assert_eq!(user.display_name(), "me");
    }
}
