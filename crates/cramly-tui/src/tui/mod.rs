// Terminal UI: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` that mirrors the parts of the application state
// it draws, plus purely local state (selection, input mode, dialogs, toasts).
// The app orchestrator pushes `UiUpdate` messages over an mpsc channel; the
// TUI applies them to `ViewState` and re-renders at ~30 fps.

pub mod input;
pub mod layout;
pub mod widgets;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste, Event, EventStream};
use futures_util::StreamExt;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use tokio::sync::mpsc;

use cramly_app::protocol::{
    AppSnapshot, BackendKind, DeckReview, EditorView, GeneratedCards, Toast, UiUpdate,
    UserCommand,
};
use cramly_core::editor::EditField;
use cramly_core::model::{Conversation, FlashcardDeck, Message, Note, User};
use cramly_core::route::Route;

use layout::{build_layout, AppLayout};

/// How long a toast stays on screen.
pub const TOAST_TTL: Duration = Duration::from_secs(5);

/// Flashcard count used before the first snapshot arrives.
const FALLBACK_FLASHCARD_COUNT: u32 = 5;

// ---------------------------------------------------------------------------
// Input modes and dialogs
// ---------------------------------------------------------------------------

/// What a single-line prompt is collecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    /// Request for AI-generated note content.
    AskAi,
    FlashcardTopic,
    DeckTitle,
    ChatMessage,
    RenameConversation(String),
    /// The URL the browser landed on after sign-in.
    SignInCallback,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::AskAi => "Ask AI",
            PromptKind::FlashcardTopic => "Generate flashcards",
            PromptKind::DeckTitle => "Save deck",
            PromptKind::ChatMessage => "Message",
            PromptKind::RenameConversation(_) => "Rename conversation",
            PromptKind::SignInCallback => "Paste redirect URL",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            PromptKind::AskAi => "What should the AI write into this note?",
            PromptKind::FlashcardTopic => "Topic to generate flashcards about",
            PromptKind::DeckTitle => "Title for the new deck",
            PromptKind::ChatMessage => "Ask your tutor anything",
            PromptKind::RenameConversation(_) => "New conversation title",
            PromptKind::SignInCallback => "The full URL from the browser address bar",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
}

impl Prompt {
    pub fn new(kind: PromptKind) -> Self {
        Prompt {
            kind,
            text: String::new(),
        }
    }

    pub fn with_text(kind: PromptKind, text: impl Into<String>) -> Self {
        Prompt {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Keystrokes edit the open note.
    Editing(EditField),
    Prompt(Prompt),
}

/// Something the user asked to delete, waiting for confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Note { id: String, title: String },
    Deck { id: String, title: String },
    Conversation { id: String, title: String },
}

impl DeleteTarget {
    pub fn describe(&self) -> String {
        match self {
            DeleteTarget::Note { title, .. } => format!("note \"{title}\""),
            DeleteTarget::Deck { title, .. } => format!("deck \"{title}\" and its cards"),
            DeleteTarget::Conversation { title, .. } => format!("conversation \"{title}\""),
        }
    }

    pub fn command(&self) -> UserCommand {
        match self {
            DeleteTarget::Note { id, .. } => UserCommand::DeleteNote(id.clone()),
            DeleteTarget::Deck { id, .. } => UserCommand::DeleteDeck(id.clone()),
            DeleteTarget::Conversation { id, .. } => UserCommand::DeleteConversation(id.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToastEntry {
    pub toast: Toast,
    pub shown_at: Instant,
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local state that mirrors the application state for rendering.
///
/// Updated via `UiUpdate` messages from the app orchestrator. The
/// `render_frame` function reads this struct to draw the screen.
pub struct ViewState {
    pub route: Route,
    pub user: Option<User>,
    pub backend: BackendKind,
    pub ai_enabled: bool,
    pub autosave_secs: u64,

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

    /// Selected row in the notes list.
    pub selected_note: usize,
    /// Selected row in the deck list.
    pub selected_deck: usize,
    /// Selected row in the conversation list.
    pub selected_conversation: usize,
    /// Cards to request from the generator; 0 until the first snapshot.
    pub flashcard_count: u32,
    /// Whether the flashcards screen shows the open deck instead of the
    /// generator.
    pub reviewing: bool,
    /// Sign-in URL to open in a browser, once requested.
    pub authorize_url: Option<String>,

    pub mode: InputMode,
    pub confirm_quit: bool,
    pub confirm_delete: Option<DeleteTarget>,
    pub toasts: Vec<ToastEntry>,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            route: Route::SignIn,
            user: None,
            backend: BackendKind::Unconfigured,
            ai_enabled: false,
            autosave_secs: 0,
            notes: Vec::new(),
            editor: EditorView::default(),
            ai_assist_pending: false,
            last_export: None,
            decks: Vec::new(),
            generated: None,
            generating: false,
            review: None,
            conversations: Vec::new(),
            active_conversation: None,
            messages: Vec::new(),
            tutor_pending: false,
            selected_note: 0,
            selected_deck: 0,
            selected_conversation: 0,
            flashcard_count: 0,
            reviewing: false,
            authorize_url: None,
            mode: InputMode::Normal,
            confirm_quit: false,
            confirm_delete: None,
            toasts: Vec::new(),
        }
    }
}

impl ViewState {
    /// Apply a full state snapshot from the app orchestrator.
    ///
    /// Local state (selection, mode, dialogs, toasts) is kept; selections
    /// are clamped to the new list lengths.
    pub fn apply_snapshot(&mut self, snapshot: AppSnapshot) {
        if snapshot.route != self.route && matches!(self.mode, InputMode::Editing(_)) {
            self.mode = InputMode::Normal;
        }
        if snapshot.editor.note_id.is_none() && matches!(self.mode, InputMode::Editing(_)) {
            self.mode = InputMode::Normal;
        }

        self.route = snapshot.route;
        self.user = snapshot.user;
        self.backend = snapshot.backend;
        self.ai_enabled = snapshot.ai_enabled;
        self.autosave_secs = snapshot.autosave_secs;
        self.notes = snapshot.notes;
        self.editor = snapshot.editor;
        self.ai_assist_pending = snapshot.ai_assist_pending;
        self.last_export = snapshot.last_export;
        self.decks = snapshot.decks;
        self.generated = snapshot.generated;
        self.generating = snapshot.generating;
        self.review = snapshot.review;
        self.conversations = snapshot.conversations;
        self.active_conversation = snapshot.active_conversation;
        self.messages = snapshot.messages;
        self.tutor_pending = snapshot.tutor_pending;

        if self.flashcard_count == 0 {
            self.flashcard_count = snapshot.default_flashcard_count;
        }
        if self.review.is_none() {
            self.reviewing = false;
        }
        if self.user.is_some() {
            self.authorize_url = None;
        }

        self.selected_note = clamp_selection(self.selected_note, self.notes.len());
        self.selected_deck = clamp_selection(self.selected_deck, self.decks.len());
        self.selected_conversation =
            clamp_selection(self.selected_conversation, self.conversations.len());
    }

    pub fn push_toast(&mut self, toast: Toast, now: Instant) {
        self.toasts.push(ToastEntry {
            toast,
            shown_at: now,
        });
    }

    /// Drop toasts that have been visible for `TOAST_TTL`.
    pub fn expire_toasts(&mut self, now: Instant) {
        self.toasts
            .retain(|t| now.saturating_duration_since(t.shown_at) < TOAST_TTL);
    }

    pub fn flashcard_count(&self) -> u32 {
        if self.flashcard_count == 0 {
            FALLBACK_FLASHCARD_COUNT
        } else {
            self.flashcard_count
        }
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.notes.get(self.selected_note)
    }

    pub fn selected_deck(&self) -> Option<&FlashcardDeck> {
        self.decks.get(self.selected_deck)
    }

    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.conversations.get(self.selected_conversation)
    }
}

fn clamp_selection(selected: usize, len: usize) -> usize {
    selected.min(len.saturating_sub(1))
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::StateSnapshot(snapshot) => {
            state.apply_snapshot(*snapshot);
        }
        UiUpdate::Toast(toast) => {
            state.push_toast(toast, Instant::now());
        }
        UiUpdate::AuthorizeUrl(url) => {
            state.authorize_url = Some(url);
            state.mode = InputMode::Prompt(Prompt::new(PromptKind::SignInCallback));
        }
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete frame: chrome, the current screen, then overlays.
fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    widgets::sidebar::render(frame, layout.sidebar, state);
    render_main_panel(frame, &layout, state);
    render_help_bar(frame, &layout, state);

    if let InputMode::Prompt(prompt) = &state.mode {
        widgets::prompt_dialog::render(frame, frame.area(), prompt);
    }
    if let Some(target) = &state.confirm_delete {
        widgets::confirm::render_delete(frame, frame.area(), target);
    }
    if state.confirm_quit {
        widgets::confirm::render_quit(frame, frame.area(), state.editor.dirty);
    }
    widgets::toasts::render(frame, layout.main_panel, &state.toasts);
}

fn render_main_panel(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let area = layout.main_panel;
    match state.route {
        Route::SignIn | Route::AuthCallback => widgets::sign_in::render(frame, area, state),
        Route::Dashboard => widgets::dashboard::render(frame, area, state),
        Route::Notes => widgets::notes::render(frame, area, state),
        Route::Flashcards => widgets::flashcards::render(frame, area, state),
        Route::Tutor => widgets::tutor::render(frame, area, state),
    }
}

fn render_help_bar(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        help_text(state),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::DIM),
    )]))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.help_bar);
}

/// Shortcut hints for the current screen and mode.
pub fn help_text(state: &ViewState) -> &'static str {
    if state.confirm_quit || state.confirm_delete.is_some() {
        return " y:Confirm | n/Esc:Cancel";
    }
    match &state.mode {
        InputMode::Prompt(_) => return " Enter:Submit | Esc:Cancel",
        InputMode::Editing(EditField::Title) => {
            return " Type to edit title | Tab:Content | Enter/Esc:Done | Ctrl+S:Save"
        }
        InputMode::Editing(EditField::Content) => {
            return " Type to edit content | Tab:Title | Esc:Done | Ctrl+S:Save"
        }
        InputMode::Normal => {}
    }
    match state.route {
        Route::SignIn | Route::AuthCallback => {
            " s:Slack | g:GitHub | d:Discord | p:Paste redirect URL | q:Quit"
        }
        Route::Dashboard => " 1-4:Screens | S:Sign out | q:Quit",
        Route::Notes => {
            " j/k:Select | Enter:Open | n:New | t:Title | e:Edit | s:Save | a:Ask AI | m/h:Export | D:Delete | q:Quit"
        }
        Route::Flashcards if state.reviewing => {
            " Space:Flip | l/Right:Next | h/Left:Previous | r:Restart | Esc:Back"
        }
        Route::Flashcards => {
            " j/k:Select | Enter:Review | g:Generate | +/-:Count | s:Save deck | x:Discard | D:Delete | q:Quit"
        }
        Route::Tutor => {
            " j/k:Select | Enter:Open | i:Message | n:New | r:Rename | c:Cancel | D:Delete | q:Quit"
        }
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// 1. Initializes the terminal (raw mode, alternate screen, bracketed paste).
/// 2. Installs a panic hook to restore the terminal on crash.
/// 3. Runs an async select loop: UI updates, terminal input, render ticks.
/// 4. Restores the terminal on exit.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    // 1. Initialize terminal
    let mut terminal = ratatui::init();
    crossterm::execute!(std::io::stdout(), EnableBracketedPaste)?;

    // 2. Restore the terminal before the default hook prints the panic.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = crossterm::execute!(std::io::stdout(), DisableBracketedPaste);
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    // ~30fps
    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // 3. Main loop
    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    // Channel closed: app is shutting down
                    None => break,
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            let _ = cmd_tx.send(cmd).await;
                            if quit {
                                break;
                            }
                        }
                    }
                    Some(Ok(Event::Paste(text))) => {
                        input::handle_paste(&text, &mut view_state);
                    }
                    Some(Ok(_)) => {
                        // Mouse, focus and resize events
                    }
                    Some(Err(_)) | None => break,
                }
            }

            _ = render_tick.tick() => {
                view_state.expire_toasts(Instant::now());
                terminal.draw(|frame| render_frame(frame, &view_state))?;
            }
        }
    }

    // 4. Restore terminal
    let _ = crossterm::execute!(std::io::stdout(), DisableBracketedPaste);
    ratatui::restore();

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
