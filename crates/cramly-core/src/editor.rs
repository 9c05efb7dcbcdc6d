// Note editor working copy and dirty tracking.
//
// The session holds the title/content being edited, the last persisted
// snapshot and the pending content debounce. It owns no timers: the app loop
// drives `poll_debounce` and the autosave interval, and hands the returned
// `SaveRequest`s to the store.

use std::time::Duration;

use tokio::time::Instant;

use crate::model::{Note, NoteUpdate, DEFAULT_NOTE_CONTENT, DEFAULT_NOTE_TITLE};

/// Default delay between the last content keystroke and the dirty check.
pub const DEFAULT_CHANGE_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Title,
    Content,
}

/// One keystroke-sized change to a field. Edits apply at the end of the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Insert(char),
    Backspace,
    Newline,
}

/// A persist request built from the working copy.
///
/// `generation` identifies the note load the request was built from, so a
/// save that completes after a note switch cannot touch the new note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub note_id: String,
    pub title: String,
    pub content: String,
    pub generation: u64,
}

impl SaveRequest {
    pub fn to_update(&self) -> NoteUpdate {
        NoteUpdate::full(self.title.clone(), self.content.clone())
    }
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    note_id: Option<String>,
    title: String,
    content: String,
    original_title: String,
    original_content: String,
    dirty: bool,
    debounce: Duration,
    debounce_deadline: Option<Instant>,
    generation: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        EditorSession::new(DEFAULT_CHANGE_DEBOUNCE)
    }
}

impl EditorSession {
    pub fn new(debounce: Duration) -> Self {
        EditorSession {
            note_id: None,
            title: DEFAULT_NOTE_TITLE.to_string(),
            content: DEFAULT_NOTE_CONTENT.to_string(),
            original_title: DEFAULT_NOTE_TITLE.to_string(),
            original_content: DEFAULT_NOTE_CONTENT.to_string(),
            dirty: false,
            debounce,
            debounce_deadline: None,
            generation: 0,
        }
    }

    /// Switch the editor to `note` (or to the blank placeholder).
    ///
    /// Working copy and snapshot both become the loaded note, dirty state is
    /// cleared and any pending debounce is dropped, whatever the prior state.
    pub fn load(&mut self, note: Option<&Note>) {
        match note {
            Some(note) => {
                self.note_id = Some(note.id.clone());
                self.title = note.title.clone();
                self.content = note.content.clone();
            }
            None => {
                self.note_id = None;
                self.title = DEFAULT_NOTE_TITLE.to_string();
                self.content = DEFAULT_NOTE_CONTENT.to_string();
            }
        }
        self.original_title = self.title.clone();
        self.original_content = self.content.clone();
        self.dirty = false;
        self.debounce_deadline = None;
        self.generation += 1;
    }

    pub fn note_id(&self) -> Option<&str> {
        self.note_id.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.note_id.is_some()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the pending content debounce fires, if one is armed.
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    /// Compare the working copy against the last persisted snapshot.
    pub fn check_for_changes(&self) -> bool {
        if self.note_id.is_none() {
            return false;
        }
        self.title != self.original_title || self.content != self.original_content
    }

    /// Replace the title. Dirty state is recomputed immediately.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.dirty = self.check_for_changes();
    }

    /// Replace the content and (re)arm the debounce.
    pub fn set_content(&mut self, content: impl Into<String>, now: Instant) {
        self.content = content.into();
        self.debounce_deadline = Some(now + self.debounce);
    }

    pub fn apply_edit(&mut self, field: EditField, op: &EditOp, now: Instant) {
        let target = match field {
            EditField::Title => &mut self.title,
            EditField::Content => &mut self.content,
        };
        match op {
            EditOp::Insert(c) => target.push(*c),
            EditOp::Backspace => {
                target.pop();
            }
            EditOp::Newline => target.push('\n'),
        }
        match field {
            EditField::Title => self.dirty = self.check_for_changes(),
            EditField::Content => self.debounce_deadline = Some(now + self.debounce),
        }
    }

    /// Append an HTML fragment to the content, as a content edit.
    pub fn insert_html(&mut self, fragment: &str, now: Instant) {
        let mut content = std::mem::take(&mut self.content);
        content.push_str(fragment);
        self.set_content(content, now);
    }

    /// Run the dirty check if the debounce deadline has passed. Returns true
    /// when the check ran.
    pub fn poll_debounce(&mut self, now: Instant) -> bool {
        match self.debounce_deadline {
            Some(deadline) if now >= deadline => {
                self.debounce_deadline = None;
                self.dirty = self.check_for_changes();
                true
            }
            _ => false,
        }
    }

    /// Persist request for the periodic autosave: only for a dirty, loaded
    /// note.
    pub fn autosave_request(&self) -> Option<SaveRequest> {
        if !self.dirty {
            return None;
        }
        self.save_request()
    }

    /// Persist request for a manual save, issued whenever a note is loaded.
    pub fn save_request(&self) -> Option<SaveRequest> {
        let note_id = self.note_id.clone()?;
        Some(SaveRequest {
            note_id,
            title: self.title.clone(),
            content: self.content.clone(),
            generation: self.generation,
        })
    }

    /// Record a successful persist. Returns false (and changes nothing) when
    /// the editor has moved to another note since `request` was built.
    pub fn mark_saved(&mut self, request: &SaveRequest) -> bool {
        if request.generation != self.generation
            || self.note_id.as_deref() != Some(request.note_id.as_str())
        {
            return false;
        }
        self.original_title = request.title.clone();
        self.original_content = request.content.clone();
        self.dirty = false;
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
