// Messages exchanged between the TUI and the app orchestrator.

use std::path::PathBuf;

use cramly_core::editor::{EditField, EditOp};
use cramly_core::export::ExportFormat;
use cramly_core::model::{Conversation, FlashcardDeck, Message, NewFlashcard, Note, User};
use cramly_core::review::ReviewSession;
use cramly_core::route::Route;

use crate::auth::OAuthProvider;

// ---------------------------------------------------------------------------
// TUI -> app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Navigate(Route),

    // --- auth ---
    SignIn(OAuthProvider),
    /// The redirect URL the browser landed on after sign-in.
    CompleteSignIn(String),
    SignOut,

    // --- notes ---
    NewNote,
    OpenNote(String),
    DeleteNote(String),
    EditNote { field: EditField, op: EditOp },
    SaveNote,
    AskAi(String),
    ExportNote(ExportFormat),

    // --- flashcards ---
    GenerateFlashcards { topic: String, count: u32 },
    /// Store the generated cards as a deck named `title`.
    SaveGeneratedDeck { title: String },
    DiscardGenerated,
    OpenDeck(String),
    DeleteDeck(String),
    ReviewNext,
    ReviewPrevious,
    ReviewFlip,
    ReviewRestart,

    // --- tutor ---
    NewConversation,
    OpenConversation(String),
    RenameConversation { id: String, title: String },
    DeleteConversation(String),
    SendMessage(String),
    CancelResponse,

    Quit,
}

// ---------------------------------------------------------------------------
// app -> TUI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    StateSnapshot(Box<AppSnapshot>),
    Toast(Toast),
    /// Sign-in URL to open in a browser.
    AuthorizeUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub kind: ToastKind,
}

impl Toast {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Toast {
            title: title.into(),
            description: description.into(),
            kind: ToastKind::Info,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Toast {
            title: title.into(),
            description: description.into(),
            kind: ToastKind::Error,
        }
    }
}

/// Which backend the session is talking to, for the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Hosted,
    Local,
    Unconfigured,
}

impl BackendKind {
    pub fn label(self) -> &'static str {
        match self {
            BackendKind::Hosted => "hosted",
            BackendKind::Local => "local",
            BackendKind::Unconfigured => "not configured",
        }
    }
}

/// Read-only view of the note editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorView {
    pub note_id: Option<String>,
    pub title: String,
    pub content: String,
    pub dirty: bool,
}

/// Cards produced by the generator, waiting for a deck title.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCards {
    pub topic: String,
    pub cards: Vec<NewFlashcard>,
}

/// The deck under review.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckReview {
    pub deck_id: String,
    pub title: String,
    pub session: ReviewSession,
}

/// Everything the TUI renders, rebuilt by the app after each change.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSnapshot {
    pub route: Route,
    pub user: Option<User>,
    pub backend: BackendKind,
    pub ai_enabled: bool,
    pub autosave_secs: u64,
    pub default_flashcard_count: u32,

    /// Notes list; the open note carries `is_unsaved` while dirty.
    pub notes: Vec<Note>,
    pub editor: EditorView,
    pub ai_assist_pending: bool,
    pub last_export: Option<PathBuf>,

    pub decks: Vec<FlashcardDeck>,
    pub generated: Option<GeneratedCards>,
    pub generating: bool,
    pub review: Option<DeckReview>,

    pub conversations: Vec<Conversation>,
    pub active_conversation: Option<String>,
    pub messages: Vec<Message>,
    pub tutor_pending: bool,
}
