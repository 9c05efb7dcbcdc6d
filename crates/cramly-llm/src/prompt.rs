// Prompt templates for flashcard generation, editor assistance and the tutor.

use cramly_core::model::Message;

use crate::client::ChatMessage;

/// Formatting instructions appended to every editor "ask AI" request.
const HTML_FORMAT_INSTRUCTIONS: &str = "Please format your response in clean HTML with proper \
heading tags (h1, h2, h3), paragraph tags, list elements, and other appropriate HTML markup \
for a rich text editor. Use strong and em tags for emphasis.";

/// Single-message request asking for `count` question/answer pairs about
/// `topic` as a bare JSON array.
pub fn flashcards_prompt(topic: &str, count: u32) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Generate {count} flashcards about \"{topic}\". Each flashcard should have a clear \
         question and a concise answer. Format your response as a JSON array of objects with \
         \"question\" and \"answer\" fields. Only return the raw JSON array without any \
         additional text, code blocks, or formatting."
    ))]
}

/// Single-message request for HTML content to drop into the note editor.
pub fn editor_prompt(request: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "{request}\n\n{HTML_FORMAT_INSTRUCTIONS}"
    ))]
}

/// The displayed conversation followed by the new user turn.
///
/// Client-only messages (error placeholders, cancellation notices) are part
/// of what the user sees and are sent along like any other message.
pub fn tutor_messages(history: &[Message], input: &str) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: m.content.clone(),
        })
        .chain(std::iter::once(ChatMessage::user(input)))
        .collect()
}
