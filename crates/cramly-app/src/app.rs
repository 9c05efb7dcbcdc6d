// Application state and orchestration logic.
//
// The central event loop that coordinates user commands from the TUI, AI
// responses from spawned request tasks, the note autosave interval and the
// editor's content debounce. Maintains the complete application state and
// pushes UI updates to the TUI render loop.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use cramly_core::config::{Config, MAX_FLASHCARD_COUNT};
use cramly_core::editor::EditorSession;
use cramly_core::export::{self, ExportFormat};
use cramly_core::model::{Conversation, FlashcardDeck, Message, Note, Role, User};
use cramly_core::review::ReviewSession;
use cramly_core::route::{guard, Route};
use cramly_llm::client::{ChatMessage, LlmClient, LlmEvent};
use cramly_llm::flashcards::{parse_flashcards, wrap_html};
use cramly_llm::prompt;

use crate::auth::{is_auth_callback, parse_callback, AuthError, OAuthProvider};
use crate::backend::Backend;
use crate::protocol::{
    AppSnapshot, BackendKind, DeckReview, EditorView, GeneratedCards, Toast, UiUpdate,
    UserCommand,
};
use crate::{flashcards, notes, tutor};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// What the in-flight AI request is for.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmMode {
    /// Tutor reply to be stored in `conversation_id`.
    TutorReply { conversation_id: String },
    /// Flashcards about `topic`, waiting for a deck title once parsed.
    FlashcardGeneration { topic: String },
    /// HTML for the note loaded at editor generation `editor_generation`.
    EditorAssist { editor_generation: u64 },
}

impl LlmMode {
    fn is_tutor(&self) -> bool {
        matches!(self, LlmMode::TutorReply { .. })
    }
}

/// One in-flight AI request: the task, what it is for, and the generation
/// its events carry.
///
/// The tutor and the flashcard/editor requests each get their own slot, so
/// starting one never aborts the other.
#[derive(Debug, Default)]
pub struct LlmSlot {
    pub task: Option<tokio::task::JoinHandle<()>>,
    pub mode: Option<LlmMode>,
    pub generation: u64,
}

impl LlmSlot {
    /// Abort the task and forget the mode, so late events for it are stale.
    fn clear(&mut self) -> Option<LlmMode> {
        if let Some(handle) = self.task.take() {
            handle.abort();
            info!("Cancelled previous LLM task");
        }
        self.mode.take()
    }

    fn accepts(&self, generation: u64) -> bool {
        self.mode.is_some() && self.generation == generation
    }
}

// ---------------------------------------------------------------------------
// User-facing texts
// ---------------------------------------------------------------------------

pub const TUTOR_CANCELLED: &str = "Response generation was cancelled.";
pub const TUTOR_REPLY_FAILED: &str =
    "Sorry, there was an error processing your message. Please try again.";
pub const TUTOR_MESSAGES_FAILED: &str = "Failed to load messages. Please try refreshing the page.";
pub const TUTOR_CONVERSATION_FAILED: &str =
    "Failed to load conversation. Please try refreshing the page.";

pub const NOT_A_CALLBACK: &str =
    "That is not a sign-in redirect. Paste the full URL from the browser address bar.";

/// Title given to the replacement conversation after the last one is deleted.
const REPLACEMENT_CONVERSATION_TITLE: &str = "New chat";

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The complete application state.
pub struct AppState {
    pub config: Config,
    pub backend: Backend,
    pub route: Route,
    pub user: Option<User>,

    pub notes: Vec<Note>,
    pub editor: EditorSession,
    /// Set when a note is opened; the loop resets the autosave interval.
    pub autosave_reset: bool,
    pub last_export: Option<PathBuf>,

    pub decks: Vec<FlashcardDeck>,
    pub generated: Option<GeneratedCards>,
    pub review: Option<DeckReview>,

    pub conversations: Vec<Conversation>,
    pub active_conversation: Option<String>,
    pub messages: Vec<Message>,

    /// Tutor reply in flight. Only `CancelResponse` aborts it.
    pub tutor_llm: LlmSlot,
    /// Flashcard generation or editor assist in flight.
    pub assist_llm: LlmSlot,
    /// Monotonically increasing counter handing out request generations.
    /// Events matching neither slot are discarded in `handle_llm_event`.
    pub llm_generation: u64,
    /// Shared with spawned request tasks.
    pub llm_client: Arc<LlmClient>,
    /// Spawned tasks report back through a clone of this sender.
    pub llm_tx: mpsc::Sender<LlmEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        backend: Backend,
        llm_client: LlmClient,
        llm_tx: mpsc::Sender<LlmEvent>,
    ) -> Self {
        let editor = EditorSession::new(config.editor.change_debounce());
        AppState {
            config,
            backend,
            route: Route::SignIn,
            user: None,
            notes: Vec::new(),
            editor,
            autosave_reset: false,
            last_export: None,
            decks: Vec::new(),
            generated: None,
            review: None,
            conversations: Vec::new(),
            active_conversation: None,
            messages: Vec::new(),
            tutor_llm: LlmSlot::default(),
            assist_llm: LlmSlot::default(),
            llm_generation: 0,
            llm_client: Arc::new(llm_client),
            llm_tx,
        }
    }

    /// Build a snapshot of everything the TUI renders.
    pub fn build_snapshot(&self) -> AppSnapshot {
        let open_id = self.editor.note_id();
        let dirty = self.editor.is_dirty();
        let notes = self
            .notes
            .iter()
            .map(|n| {
                let mut n = n.clone();
                n.is_unsaved = dirty && open_id == Some(n.id.as_str());
                n
            })
            .collect();

        AppSnapshot {
            route: self.route,
            user: self.user.clone(),
            backend: self.backend.kind,
            ai_enabled: self.llm_client.is_enabled(),
            autosave_secs: self.config.editor.autosave_interval_secs,
            default_flashcard_count: self.config.ai.default_flashcard_count,
            notes,
            editor: EditorView {
                note_id: open_id.map(str::to_string),
                title: self.editor.title().to_string(),
                content: self.editor.content().to_string(),
                dirty,
            },
            ai_assist_pending: matches!(self.assist_llm.mode, Some(LlmMode::EditorAssist { .. })),
            last_export: self.last_export.clone(),
            decks: self.decks.clone(),
            generated: self.generated.clone(),
            generating: matches!(
                self.assist_llm.mode,
                Some(LlmMode::FlashcardGeneration { .. })
            ),
            review: self.review.clone(),
            conversations: self.conversations.clone(),
            active_conversation: self.active_conversation.clone(),
            messages: self.messages.clone(),
            tutor_pending: self.tutor_llm.mode.is_some(),
        }
    }

    /// Cancel every AI task that is running.
    pub fn cancel_llm_tasks(&mut self) {
        self.tutor_llm.clear();
        self.assist_llm.clear();
    }

    /// Spawn an AI request for `mode`, replacing an in-flight request of the
    /// same kind. A tutor reply and a flashcard/editor request run side by side.
    pub fn spawn_llm_request(&mut self, mode: LlmMode, messages: Vec<ChatMessage>) {
        self.llm_generation += 1;
        let generation = self.llm_generation;
        debug!("Spawning LLM request {:?} (gen {})", mode, generation);

        let client = Arc::clone(&self.llm_client);
        let tx = self.llm_tx.clone();
        let slot = if mode.is_tutor() {
            &mut self.tutor_llm
        } else {
            &mut self.assist_llm
        };
        slot.clear();
        slot.mode = Some(mode);
        slot.generation = generation;
        slot.task = Some(tokio::spawn(async move {
            if let Err(e) = client.send(&messages, tx, generation).await {
                warn!("LLM task failed: {e:#}");
            }
        }));
    }

    /// Stop the in-flight tutor reply, leaving one cancellation notice in the
    /// conversation.
    pub fn cancel_response(&mut self) {
        let Some(LlmMode::TutorReply { conversation_id }) = self.tutor_llm.clear() else {
            return;
        };
        info!("Tutor response cancelled");
        if self.active_conversation.as_deref() == Some(conversation_id.as_str()) {
            self.messages
                .push(Message::local(&conversation_id, Role::Assistant, TUTOR_CANCELLED));
        }
    }

    fn store(&self) -> &dyn cramly_core::store::Store {
        self.backend.store.as_ref()
    }

    fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    fn push_tutor_notice(&mut self, content: &str) {
        let conversation_id = self.active_conversation.clone().unwrap_or_default();
        self.messages
            .push(Message::local(&conversation_id, Role::Assistant, content));
    }

    /// Forget everything that belongs to the signed-out user.
    fn clear_user_data(&mut self) {
        self.cancel_llm_tasks();
        self.notes.clear();
        self.editor.load(None);
        self.decks.clear();
        self.generated = None;
        self.review = None;
        self.conversations.clear();
        self.active_conversation = None;
        self.messages.clear();
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Listens using `tokio::select!` on:
/// 1. AI request results
/// 2. User commands from the TUI
/// 3. The autosave interval
/// 4. The editor's content debounce deadline, when one is armed
///
/// Pushes UI updates through `ui_tx` for the TUI render loop.
pub async fn run(
    mut llm_rx: mpsc::Receiver<LlmEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    // Track whether the LLM channel is still open. When it closes we stop
    // polling it so tokio::select! never spins on it.
    let mut llm_open = true;

    let mut autosave = tokio::time::interval(state.config.editor.autosave_interval());
    // The first tick completes immediately; consume it so the first
    // real check happens after one full interval.
    autosave.tick().await;

    state.user = match state.store().current_user().await {
        Ok(user) => user,
        Err(e) => {
            warn!("Could not determine current user: {e}");
            None
        }
    };
    navigate(&mut state, Route::Dashboard, &ui_tx).await;

    loop {
        let debounce_deadline = state.editor.debounce_deadline();

        tokio::select! {
            // --- LLM events (only poll when channel is open) ---
            llm_event = llm_rx.recv(), if llm_open => {
                match llm_event {
                    Some(event) => {
                        handle_llm_event(&mut state, event, &ui_tx).await;
                    }
                    None => {
                        info!("LLM channel closed");
                        llm_open = false;
                    }
                }
            }

            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_user_command(&mut state, cmd, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Periodic autosave ---
            _ = autosave.tick() => {
                autosave_tick(&mut state, &ui_tx).await;
            }

            // --- Content debounce ---
            _ = tokio::time::sleep_until(debounce_deadline.unwrap_or_else(Instant::now)),
                if debounce_deadline.is_some() => {
                if state.editor.poll_debounce(Instant::now()) {
                    send_snapshot(&state, &ui_tx).await;
                }
            }
        }

        if state.autosave_reset {
            state.autosave_reset = false;
            autosave.reset();
        }
    }

    // Cleanup
    state.cancel_llm_tasks();
    info!("Application event loop exiting");
    Ok(())
}

async fn send_snapshot(state: &AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let snapshot = state.build_snapshot();
    let _ = ui_tx
        .send(UiUpdate::StateSnapshot(Box::new(snapshot)))
        .await;
}

async fn send_toast(ui_tx: &mpsc::Sender<UiUpdate>, toast: Toast) {
    let _ = ui_tx.send(UiUpdate::Toast(toast)).await;
}

// ---------------------------------------------------------------------------
// Autosave and manual save
// ---------------------------------------------------------------------------

/// Persist the open note if it has unsaved changes. Failures are logged and
/// the note stays dirty for the next tick.
async fn autosave_tick(state: &mut AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let Some(request) = state.editor.autosave_request() else {
        return;
    };

    match notes::update_note(state.store(), &request.note_id, &request.to_update()).await {
        Ok(_) => {
            state.editor.mark_saved(&request);
            info!("Autosaved note {}", request.note_id);
            refresh_notes(state).await;
            send_snapshot(state, ui_tx).await;
        }
        Err(e) => {
            warn!("Autosave of note {} failed: {e}", request.note_id);
        }
    }
}

async fn save_note(state: &mut AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let Some(request) = state.editor.save_request() else {
        send_toast(ui_tx, Toast::error("Error saving note", "No note is open")).await;
        return;
    };

    match notes::update_note(state.store(), &request.note_id, &request.to_update()).await {
        Ok(note) => {
            state.editor.mark_saved(&request);
            send_toast(
                ui_tx,
                Toast::info(
                    "Note updated",
                    format!("\"{}\" has been updated successfully.", note.title),
                ),
            )
            .await;
            refresh_notes(state).await;
        }
        Err(_) => {
            send_toast(
                ui_tx,
                Toast::error("Error saving note", "Please try again later"),
            )
            .await;
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

async fn refresh_notes(state: &mut AppState) {
    if let Ok(list) = notes::list_notes(state.store()).await {
        state.notes = list;
    }
}

async fn refresh_decks(state: &mut AppState) {
    if let Ok(list) = flashcards::list_decks(state.store()).await {
        state.decks = list;
    }
}

async fn refresh_conversations(state: &mut AppState) {
    if let Ok(list) = tutor::list_conversations(state.store()).await {
        state.conversations = list;
    }
}

/// Make `conversation` the open one and load its messages.
async fn open_conversation(state: &mut AppState, conversation: &Conversation) {
    state.active_conversation = Some(conversation.id.clone());
    match tutor::list_messages(state.store(), &conversation.id).await {
        Ok(messages) => state.messages = messages,
        Err(_) => {
            state.messages.clear();
            state.push_tutor_notice(TUTOR_MESSAGES_FAILED);
        }
    }
}

/// Open the newest conversation (creating one if needed) and its messages.
async fn load_tutor(state: &mut AppState) {
    if state.active_conversation.is_none() {
        match tutor::active_conversation(state.store()).await {
            Ok(conversation) => open_conversation(state, &conversation).await,
            Err(_) => {
                state.messages.clear();
                state.push_tutor_notice(TUTOR_CONVERSATION_FAILED);
            }
        }
    }
    refresh_conversations(state).await;
}

/// Move to `requested`, subject to the sign-in guard, and load what the
/// destination shows.
async fn navigate(state: &mut AppState, requested: Route, ui_tx: &mpsc::Sender<UiUpdate>) {
    let route = guard(requested, state.is_authenticated());
    if route != requested {
        debug!("Route {:?} redirected to {:?}", requested, route);
    }
    state.route = route;

    match route {
        Route::Dashboard => {
            refresh_notes(state).await;
            refresh_decks(state).await;
        }
        Route::Notes => refresh_notes(state).await,
        Route::Flashcards => refresh_decks(state).await,
        Route::Tutor => load_tutor(state).await,
        Route::SignIn | Route::AuthCallback => {}
    }
    send_snapshot(state, ui_tx).await;
}

// ---------------------------------------------------------------------------
// LLM events
// ---------------------------------------------------------------------------

/// Handle a result from a spawned AI request.
///
/// Results whose generation matches neither in-flight request belong to
/// cancelled or replaced requests and are dropped.
async fn handle_llm_event(state: &mut AppState, event: LlmEvent, ui_tx: &mpsc::Sender<UiUpdate>) {
    let event_generation = event.generation();
    let slot = if state.tutor_llm.accepts(event_generation) {
        &mut state.tutor_llm
    } else if state.assist_llm.accepts(event_generation) {
        &mut state.assist_llm
    } else {
        debug!(
            "Discarding stale LLM event (event gen: {}, latest gen: {})",
            event_generation, state.llm_generation
        );
        return;
    };

    let Some(mode) = slot.mode.take() else {
        return;
    };
    slot.task = None;

    match (mode, event) {
        (LlmMode::TutorReply { conversation_id }, LlmEvent::Complete { text, .. }) => {
            let stored =
                tutor::add_message(state.store(), &conversation_id, &text, Role::Assistant).await;
            if state.active_conversation.as_deref() == Some(conversation_id.as_str()) {
                match stored {
                    Ok(message) => state.messages.push(message),
                    Err(_) => state.push_tutor_notice(TUTOR_REPLY_FAILED),
                }
            }
        }
        (LlmMode::TutorReply { conversation_id }, LlmEvent::Error { message, .. }) => {
            warn!("Tutor request failed: {}", message);
            if state.active_conversation.as_deref() == Some(conversation_id.as_str()) {
                state.push_tutor_notice(TUTOR_REPLY_FAILED);
            }
        }
        (LlmMode::FlashcardGeneration { topic }, LlmEvent::Complete { text, .. }) => {
            match parse_flashcards(&text) {
                Ok(cards) => {
                    info!("Generated {} flashcards about {:?}", cards.len(), topic);
                    state.generated = Some(GeneratedCards { topic, cards });
                }
                Err(e) => {
                    warn!("Flashcard generation returned unusable output: {e}");
                    send_toast(ui_tx, Toast::error("Error generating flashcards", e.to_string()))
                        .await;
                }
            }
        }
        (LlmMode::FlashcardGeneration { .. }, LlmEvent::Error { message, .. }) => {
            warn!("Flashcard generation failed: {}", message);
            send_toast(ui_tx, Toast::error("Error generating flashcards", message)).await;
        }
        (LlmMode::EditorAssist { editor_generation }, LlmEvent::Complete { text, .. }) => {
            if editor_generation == state.editor.generation() {
                state.editor.insert_html(&wrap_html(&text), Instant::now());
            } else {
                debug!("Editor switched notes before AI content arrived, discarding");
            }
        }
        (LlmMode::EditorAssist { .. }, LlmEvent::Error { message, .. }) => {
            warn!("Editor AI request failed: {}", message);
            send_toast(ui_tx, Toast::error("AI request failed", message)).await;
        }
    }

    send_snapshot(state, ui_tx).await;
}

// ---------------------------------------------------------------------------
// User commands
// ---------------------------------------------------------------------------

/// Handle a user command from the TUI.
async fn handle_user_command(
    state: &mut AppState,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    match cmd {
        UserCommand::Navigate(route) => {
            navigate(state, route, ui_tx).await;
            return;
        }

        // --- auth ---
        UserCommand::SignIn(provider) => sign_in(state, provider, ui_tx).await,
        UserCommand::CompleteSignIn(url) => {
            complete_sign_in(state, &url, ui_tx).await;
            return;
        }
        UserCommand::SignOut => {
            sign_out(state, ui_tx).await;
            return;
        }

        // --- notes ---
        UserCommand::NewNote => match notes::create_note(state.store(), None, None).await {
            Ok(note) => {
                info!("Created note {}", note.id);
                state.editor.load(Some(&note));
                state.autosave_reset = true;
                refresh_notes(state).await;
            }
            Err(_) => {
                send_toast(
                    ui_tx,
                    Toast::error(
                        "Error creating note",
                        "There was a problem creating your note. Please try again.",
                    ),
                )
                .await;
            }
        },
        UserCommand::OpenNote(id) => match notes::get_note(state.store(), &id).await {
            Ok(note) => {
                state.editor.load(Some(&note));
                state.autosave_reset = true;
            }
            Err(e) => {
                send_toast(ui_tx, Toast::error("Error loading note", e.to_string())).await;
            }
        },
        UserCommand::DeleteNote(id) => match notes::delete_note(state.store(), &id).await {
            Ok(()) => {
                if state.editor.note_id() == Some(id.as_str()) {
                    state.editor.load(None);
                }
                refresh_notes(state).await;
                send_toast(ui_tx, Toast::info("Note deleted", "The note has been removed.")).await;
            }
            Err(e) => {
                send_toast(ui_tx, Toast::error("Error deleting note", e.to_string())).await;
            }
        },
        UserCommand::EditNote { field, op } => {
            state.editor.apply_edit(field, &op, Instant::now());
        }
        UserCommand::SaveNote => save_note(state, ui_tx).await,
        UserCommand::AskAi(request) => {
            let request = request.trim();
            if request.is_empty() {
                return;
            }
            if !state.editor.is_loaded() {
                send_toast(ui_tx, Toast::error("AI request failed", "Open a note first")).await;
                return;
            }
            let editor_generation = state.editor.generation();
            state.spawn_llm_request(
                LlmMode::EditorAssist { editor_generation },
                prompt::editor_prompt(request),
            );
        }
        UserCommand::ExportNote(format) => export_note(state, format, ui_tx).await,

        // --- flashcards ---
        UserCommand::GenerateFlashcards { topic, count } => {
            let topic = topic.trim().to_string();
            if topic.is_empty() {
                return;
            }
            if !(1..=MAX_FLASHCARD_COUNT).contains(&count) {
                send_toast(
                    ui_tx,
                    Toast::error(
                        "Error generating flashcards",
                        format!("Choose between 1 and {MAX_FLASHCARD_COUNT} flashcards"),
                    ),
                )
                .await;
                return;
            }
            state.generated = None;
            let messages = prompt::flashcards_prompt(&topic, count);
            state.spawn_llm_request(LlmMode::FlashcardGeneration { topic }, messages);
        }
        UserCommand::SaveGeneratedDeck { title } => save_generated_deck(state, &title, ui_tx).await,
        UserCommand::DiscardGenerated => state.generated = None,
        UserCommand::OpenDeck(id) => match flashcards::get_deck(state.store(), &id).await {
            Ok(deck) => {
                state.review = Some(DeckReview {
                    deck_id: deck.id.clone(),
                    title: deck.title.clone(),
                    session: ReviewSession::new(&deck),
                });
            }
            Err(e) => {
                send_toast(ui_tx, Toast::error("Error loading deck", e.to_string())).await;
            }
        },
        UserCommand::DeleteDeck(id) => match flashcards::delete_deck(state.store(), &id).await {
            Ok(()) => {
                if state.review.as_ref().is_some_and(|r| r.deck_id == id) {
                    state.review = None;
                }
                refresh_decks(state).await;
                send_toast(
                    ui_tx,
                    Toast::info("Deck deleted", "The deck and its cards have been removed."),
                )
                .await;
            }
            Err(e) => {
                send_toast(ui_tx, Toast::error("Error deleting deck", e.to_string())).await;
            }
        },
        UserCommand::ReviewNext => {
            if let Some(review) = &mut state.review {
                review.session.next();
            }
        }
        UserCommand::ReviewPrevious => {
            if let Some(review) = &mut state.review {
                review.session.previous();
            }
        }
        UserCommand::ReviewFlip => {
            if let Some(review) = &mut state.review {
                review.session.flip();
            }
        }
        UserCommand::ReviewRestart => {
            if let Some(review) = &mut state.review {
                review.session.restart();
            }
        }

        // --- tutor ---
        UserCommand::NewConversation => {
            match tutor::create_conversation(state.store(), None).await {
                Ok(conversation) => {
                    state.active_conversation = Some(conversation.id.clone());
                    state.messages.clear();
                    refresh_conversations(state).await;
                }
                Err(e) => {
                    send_toast(ui_tx, Toast::error("Error creating conversation", e.to_string()))
                        .await;
                }
            }
        }
        UserCommand::OpenConversation(id) => {
            match tutor::get_conversation(state.store(), &id).await {
                Ok(conversation) => open_conversation(state, &conversation).await,
                Err(_) => {
                    state.messages.clear();
                    state.push_tutor_notice(TUTOR_CONVERSATION_FAILED);
                }
            }
        }
        UserCommand::RenameConversation { id, title } => {
            let title = title.trim();
            if title.is_empty() {
                return;
            }
            match tutor::rename_conversation(state.store(), &id, title).await {
                Ok(_) => refresh_conversations(state).await,
                Err(e) => {
                    send_toast(ui_tx, Toast::error("Error renaming conversation", e.to_string()))
                        .await;
                }
            }
        }
        UserCommand::DeleteConversation(id) => delete_conversation(state, &id, ui_tx).await,
        UserCommand::SendMessage(text) => send_message(state, &text).await,
        UserCommand::CancelResponse => state.cancel_response(),

        UserCommand::Quit => {
            // Handled in the main loop
        }
    }

    send_snapshot(state, ui_tx).await;
}

async fn sign_in(state: &mut AppState, provider: OAuthProvider, ui_tx: &mpsc::Sender<UiUpdate>) {
    match state.backend.auth.authorize_url(provider) {
        Ok(url) => {
            info!("Starting {} sign-in", provider.label());
            state.route = Route::AuthCallback;
            let _ = ui_tx.send(UiUpdate::AuthorizeUrl(url)).await;
        }
        Err(e) => {
            send_toast(ui_tx, Toast::error("Sign-in failed", e.to_string())).await;
        }
    }
}

async fn complete_sign_in(state: &mut AppState, url: &str, ui_tx: &mpsc::Sender<UiUpdate>) {
    let tokens = match parse_callback(url) {
        Ok(tokens) => tokens,
        // Stray text: stay put so the user can paste again.
        Err(AuthError::InvalidCallback(_)) if !is_auth_callback(url) => {
            debug!("Pasted text is not an auth callback");
            send_toast(ui_tx, Toast::error("Sign-in failed", NOT_A_CALLBACK)).await;
            send_snapshot(state, ui_tx).await;
            return;
        }
        Err(e) => {
            send_toast(ui_tx, Toast::error("Sign-in failed", e.to_string())).await;
            navigate(state, Route::SignIn, ui_tx).await;
            return;
        }
    };

    match state.backend.auth.establish_session(tokens).await {
        Ok(session) => {
            if let Err(e) = state.backend.db.save_session(&session) {
                warn!("Failed to persist session: {e:#}");
            }
            state.user = Some(session.user.clone());
            state.backend.session.set(session);
            navigate(state, Route::Dashboard, ui_tx).await;
        }
        Err(e) => {
            send_toast(ui_tx, Toast::error("Sign-in failed", e.to_string())).await;
            navigate(state, Route::SignIn, ui_tx).await;
        }
    }
}

async fn sign_out(state: &mut AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    if state.backend.kind == BackendKind::Local {
        send_toast(
            ui_tx,
            Toast::info("Local mode", "There is no account to sign out of."),
        )
        .await;
        return;
    }

    if let Some(session) = state.backend.session.get() {
        if let Err(e) = state.backend.auth.sign_out(&session).await {
            warn!("Sign-out request failed, clearing local session anyway: {e}");
        }
    }
    state.backend.session.clear();
    if let Err(e) = state.backend.db.clear_session() {
        warn!("Failed to clear stored session: {e:#}");
    }
    state.user = None;
    state.clear_user_data();
    info!("Signed out");
    navigate(state, Route::SignIn, ui_tx).await;
}

async fn export_note(state: &mut AppState, format: ExportFormat, ui_tx: &mpsc::Sender<UiUpdate>) {
    let Some(id) = state.editor.note_id() else {
        send_toast(ui_tx, Toast::error("Export failed", "No note is open")).await;
        return;
    };
    let now = Utc::now();
    let note = Note {
        id: id.to_string(),
        title: state.editor.title().to_string(),
        content: state.editor.content().to_string(),
        created_at: now,
        updated_at: now,
        is_unsaved: state.editor.is_dirty(),
    };

    match export::write_export(&state.config.export_dir, &note, format) {
        Ok(path) => {
            send_toast(
                ui_tx,
                Toast::info("Note exported", format!("Saved to {}", path.display())),
            )
            .await;
            state.last_export = Some(path);
        }
        Err(e) => {
            warn!("Export failed: {e:#}");
            send_toast(ui_tx, Toast::error("Export failed", format!("{e:#}"))).await;
        }
    }
}

async fn save_generated_deck(state: &mut AppState, title: &str, ui_tx: &mpsc::Sender<UiUpdate>) {
    let title = title.trim();
    if title.is_empty() {
        send_toast(ui_tx, Toast::error("Error creating deck", "Give the deck a title")).await;
        return;
    }
    let Some(generated) = state.generated.clone() else {
        send_toast(ui_tx, Toast::error("Error creating deck", "Generate flashcards first")).await;
        return;
    };

    match flashcards::create_deck(state.store(), title, &generated.cards, Some(&generated.topic))
        .await
    {
        Ok(deck) => {
            state.generated = None;
            send_toast(
                ui_tx,
                Toast::info(
                    "Deck created",
                    format!("\"{}\" has {} flashcards.", deck.title, deck.card_count()),
                ),
            )
            .await;
            refresh_decks(state).await;
        }
        Err(e) => {
            send_toast(ui_tx, Toast::error("Error creating deck", e.to_string())).await;
        }
    }
}

async fn delete_conversation(state: &mut AppState, id: &str, ui_tx: &mpsc::Sender<UiUpdate>) {
    if let Err(e) = tutor::delete_conversation(state.store(), id).await {
        send_toast(ui_tx, Toast::error("Error deleting conversation", e.to_string())).await;
        return;
    }
    refresh_conversations(state).await;

    if state.active_conversation.as_deref() != Some(id) {
        return;
    }
    let replying_here = matches!(
        &state.tutor_llm.mode,
        Some(LlmMode::TutorReply { conversation_id }) if conversation_id == id
    );
    if replying_here {
        state.tutor_llm.clear();
    }

    if let Some(next) = state.conversations.first().cloned() {
        open_conversation(state, &next).await;
        return;
    }
    match tutor::create_conversation(state.store(), Some(REPLACEMENT_CONVERSATION_TITLE)).await {
        Ok(conversation) => {
            state.active_conversation = Some(conversation.id.clone());
            state.messages.clear();
            refresh_conversations(state).await;
        }
        Err(_) => {
            state.active_conversation = None;
            state.messages.clear();
            state.push_tutor_notice(TUTOR_CONVERSATION_FAILED);
        }
    }
}

/// Store the user's message and ask the tutor, sending the conversation so
/// far as context.
async fn send_message(state: &mut AppState, text: &str) {
    let text = text.trim();
    if text.is_empty() || state.tutor_llm.mode.is_some() {
        return;
    }
    let Some(conversation_id) = state.active_conversation.clone() else {
        state.push_tutor_notice(TUTOR_CONVERSATION_FAILED);
        return;
    };

    let history = state.messages.clone();
    match tutor::add_message(state.store(), &conversation_id, text, Role::User).await {
        Ok(message) => state.messages.push(message),
        Err(_) => {
            state.push_tutor_notice(TUTOR_REPLY_FAILED);
            return;
        }
    }

    state.spawn_llm_request(
        LlmMode::TutorReply { conversation_id },
        prompt::tutor_messages(&history, text),
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
