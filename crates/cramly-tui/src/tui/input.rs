// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages sent to the
// app orchestrator, or into local ViewState mutations (selection, input
// mode, dialogs).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use cramly_app::auth::OAuthProvider;
use cramly_app::protocol::UserCommand;
use cramly_core::config::MAX_FLASHCARD_COUNT;
use cramly_core::editor::{EditField, EditOp};
use cramly_core::export::ExportFormat;
use cramly_core::route::Route;

use super::{DeleteTarget, InputMode, Prompt, PromptKind, ViewState};

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// app orchestrator. Returns `None` when the key press was handled locally
/// by mutating `ViewState`.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Only process key press events. On Windows, crossterm emits both
    // Press and Release events for each physical keypress.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    // Ctrl+C always quits immediately regardless of mode
    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }
    if view_state.confirm_delete.is_some() {
        return handle_confirm_delete(key_event, view_state);
    }

    match view_state.mode {
        InputMode::Prompt(_) => return handle_prompt(key_event, view_state),
        InputMode::Editing(field) => return handle_editing(field, key_event, view_state),
        InputMode::Normal => {}
    }

    // Global keys
    match key_event.code {
        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            return None;
        }
        KeyCode::Char(c @ '1'..='4') => {
            let index = (c as usize) - ('1' as usize);
            return Some(UserCommand::Navigate(Route::NAVIGATION[index]));
        }
        KeyCode::Char('S') if view_state.user.is_some() => return Some(UserCommand::SignOut),
        _ => {}
    }

    match view_state.route {
        Route::SignIn | Route::AuthCallback => handle_sign_in(key_event, view_state),
        Route::Dashboard => None,
        Route::Notes => handle_notes(key_event, view_state),
        Route::Flashcards if view_state.reviewing => handle_review(key_event, view_state),
        Route::Flashcards => handle_flashcards(key_event, view_state),
        Route::Tutor => handle_tutor(key_event, view_state),
    }
}

/// Append pasted text to an open prompt. Pastes elsewhere are ignored.
pub fn handle_paste(text: &str, view_state: &mut ViewState) {
    if let InputMode::Prompt(prompt) = &mut view_state.mode {
        prompt.text.push_str(text.trim_end_matches(['\r', '\n']));
    }
}

// ---------------------------------------------------------------------------
// Dialogs and modes
// ---------------------------------------------------------------------------

/// `y` or `q` confirms quit, `n` or `Esc` cancels, everything else is blocked.
fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

fn handle_confirm_delete(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            view_state.confirm_delete.take().map(|t| t.command())
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_delete = None;
            None
        }
        _ => None,
    }
}

/// Single-line text entry: Enter submits, Esc cancels.
fn handle_prompt(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let InputMode::Prompt(prompt) = &mut view_state.mode else {
        return None;
    };
    match key_event.code {
        KeyCode::Esc => {
            view_state.mode = InputMode::Normal;
            None
        }
        KeyCode::Enter => {
            let InputMode::Prompt(prompt) = std::mem::take(&mut view_state.mode) else {
                return None;
            };
            submit_prompt(prompt, view_state)
        }
        KeyCode::Backspace => {
            prompt.text.pop();
            None
        }
        KeyCode::Char(c) => {
            prompt.text.push(c);
            None
        }
        _ => None,
    }
}

fn submit_prompt(prompt: Prompt, view_state: &mut ViewState) -> Option<UserCommand> {
    let text = prompt.text.trim().to_string();
    if text.is_empty() {
        return None;
    }
    let cmd = match prompt.kind {
        PromptKind::AskAi => UserCommand::AskAi(text),
        PromptKind::FlashcardTopic => UserCommand::GenerateFlashcards {
            topic: text,
            count: view_state.flashcard_count(),
        },
        PromptKind::DeckTitle => UserCommand::SaveGeneratedDeck { title: text },
        PromptKind::ChatMessage => UserCommand::SendMessage(text),
        PromptKind::RenameConversation(id) => UserCommand::RenameConversation { id, title: text },
        PromptKind::SignInCallback => UserCommand::CompleteSignIn(text),
    };
    Some(cmd)
}

/// Keystrokes go to the open note. Title edits end on Enter; content takes
/// newlines.
fn handle_editing(
    field: EditField,
    key_event: KeyEvent,
    view_state: &mut ViewState,
) -> Option<UserCommand> {
    if key_event.modifiers.contains(KeyModifiers::CONTROL) {
        return match key_event.code {
            KeyCode::Char('s') => Some(UserCommand::SaveNote),
            _ => None,
        };
    }

    let op = match key_event.code {
        KeyCode::Esc => {
            view_state.mode = InputMode::Normal;
            return None;
        }
        KeyCode::Tab => {
            let other = match field {
                EditField::Title => EditField::Content,
                EditField::Content => EditField::Title,
            };
            view_state.mode = InputMode::Editing(other);
            return None;
        }
        KeyCode::Enter if field == EditField::Title => {
            view_state.mode = InputMode::Normal;
            return None;
        }
        KeyCode::Enter => EditOp::Newline,
        KeyCode::Backspace => EditOp::Backspace,
        KeyCode::Char(c) => EditOp::Insert(c),
        _ => return None,
    };
    Some(UserCommand::EditNote { field, op })
}

// ---------------------------------------------------------------------------
// Screens
// ---------------------------------------------------------------------------

fn handle_sign_in(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('s') => Some(UserCommand::SignIn(OAuthProvider::Slack)),
        KeyCode::Char('g') => Some(UserCommand::SignIn(OAuthProvider::Github)),
        KeyCode::Char('d') => Some(UserCommand::SignIn(OAuthProvider::Discord)),
        KeyCode::Char('p') => {
            view_state.mode = InputMode::Prompt(Prompt::new(PromptKind::SignInCallback));
            None
        }
        _ => None,
    }
}

fn handle_notes(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let note_open = view_state.editor.note_id.is_some();
    if key_event.modifiers.contains(KeyModifiers::CONTROL) {
        return match key_event.code {
            KeyCode::Char('s') if note_open => Some(UserCommand::SaveNote),
            _ => None,
        };
    }

    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            view_state.selected_note = view_state.selected_note.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            view_state.selected_note = step_down(view_state.selected_note, view_state.notes.len());
            None
        }
        KeyCode::Enter => view_state
            .selected_note()
            .map(|n| UserCommand::OpenNote(n.id.clone())),
        KeyCode::Char('n') => Some(UserCommand::NewNote),
        KeyCode::Char('D') => {
            view_state.confirm_delete = view_state.selected_note().map(|n| DeleteTarget::Note {
                id: n.id.clone(),
                title: n.title.clone(),
            });
            None
        }
        KeyCode::Char('t') if note_open => {
            view_state.mode = InputMode::Editing(EditField::Title);
            None
        }
        KeyCode::Char('e') if note_open => {
            view_state.mode = InputMode::Editing(EditField::Content);
            None
        }
        KeyCode::Char('s') if note_open => Some(UserCommand::SaveNote),
        KeyCode::Char('a') if note_open && !view_state.ai_assist_pending => {
            view_state.mode = InputMode::Prompt(Prompt::new(PromptKind::AskAi));
            None
        }
        KeyCode::Char('m') if note_open => Some(UserCommand::ExportNote(ExportFormat::Markdown)),
        KeyCode::Char('h') if note_open => Some(UserCommand::ExportNote(ExportFormat::Html)),
        _ => None,
    }
}

fn handle_flashcards(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            view_state.selected_deck = view_state.selected_deck.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            view_state.selected_deck = step_down(view_state.selected_deck, view_state.decks.len());
            None
        }
        KeyCode::Enter => {
            let id = view_state.selected_deck()?.id.clone();
            view_state.reviewing = true;
            Some(UserCommand::OpenDeck(id))
        }
        KeyCode::Char('g') if !view_state.generating => {
            view_state.mode = InputMode::Prompt(Prompt::new(PromptKind::FlashcardTopic));
            None
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            view_state.flashcard_count = (view_state.flashcard_count() + 1).min(MAX_FLASHCARD_COUNT);
            None
        }
        KeyCode::Char('-') => {
            view_state.flashcard_count = view_state.flashcard_count().saturating_sub(1).max(1);
            None
        }
        KeyCode::Char('s') => {
            let topic = view_state.generated.as_ref()?.topic.clone();
            view_state.mode = InputMode::Prompt(Prompt::with_text(PromptKind::DeckTitle, topic));
            None
        }
        KeyCode::Char('x') if view_state.generated.is_some() => Some(UserCommand::DiscardGenerated),
        KeyCode::Char('D') => {
            view_state.confirm_delete = view_state.selected_deck().map(|d| DeleteTarget::Deck {
                id: d.id.clone(),
                title: d.title.clone(),
            });
            None
        }
        _ => None,
    }
}

fn handle_review(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char(' ') | KeyCode::Enter => Some(UserCommand::ReviewFlip),
        KeyCode::Right | KeyCode::Char('l') => Some(UserCommand::ReviewNext),
        KeyCode::Left | KeyCode::Char('h') => Some(UserCommand::ReviewPrevious),
        KeyCode::Char('r') => Some(UserCommand::ReviewRestart),
        KeyCode::Esc => {
            view_state.reviewing = false;
            None
        }
        KeyCode::Char('D') => {
            let review = view_state.review.as_ref()?;
            view_state.confirm_delete = Some(DeleteTarget::Deck {
                id: review.deck_id.clone(),
                title: review.title.clone(),
            });
            None
        }
        _ => None,
    }
}

fn handle_tutor(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            view_state.selected_conversation = view_state.selected_conversation.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            view_state.selected_conversation = step_down(
                view_state.selected_conversation,
                view_state.conversations.len(),
            );
            None
        }
        KeyCode::Enter => view_state
            .selected_conversation()
            .map(|c| UserCommand::OpenConversation(c.id.clone())),
        KeyCode::Char('n') => Some(UserCommand::NewConversation),
        KeyCode::Char('i') if !view_state.tutor_pending => {
            view_state.mode = InputMode::Prompt(Prompt::new(PromptKind::ChatMessage));
            None
        }
        KeyCode::Char('r') => {
            let conversation = view_state.selected_conversation()?;
            view_state.mode = InputMode::Prompt(Prompt::with_text(
                PromptKind::RenameConversation(conversation.id.clone()),
                conversation.title.clone(),
            ));
            None
        }
        KeyCode::Char('c') | KeyCode::Esc if view_state.tutor_pending => {
            Some(UserCommand::CancelResponse)
        }
        KeyCode::Char('D') => {
            view_state.confirm_delete =
                view_state
                    .selected_conversation()
                    .map(|c| DeleteTarget::Conversation {
                        id: c.id.clone(),
                        title: c.title.clone(),
                    });
            None
        }
        _ => None,
    }
}

fn step_down(selected: usize, len: usize) -> usize {
    if selected + 1 < len {
        selected + 1
    } else {
        selected
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
