// Parsing AI responses into flashcards and editor HTML.

use serde_json::Value;
use thiserror::Error;

use cramly_core::model::NewFlashcard;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlashcardParseError {
    /// Valid JSON, but not a non-empty array of question/answer objects.
    #[error("Invalid flashcards format received")]
    InvalidFormat,

    #[error("Failed to parse flashcards from AI response")]
    Unparsable,
}

/// Parse a generation response into question/answer pairs.
///
/// Surrounding whitespace and markdown code-fence markers are removed before
/// the text is read as a JSON array.
pub fn parse_flashcards(response: &str) -> Result<Vec<NewFlashcard>, FlashcardParseError> {
    let cleaned = response.trim().replace("```json", "").replace("```", "");

    let value: Value =
        serde_json::from_str(cleaned.trim()).map_err(|_| FlashcardParseError::Unparsable)?;

    let items = match value {
        Value::Array(items) if !items.is_empty() => items,
        _ => return Err(FlashcardParseError::InvalidFormat),
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<NewFlashcard>(item)
                .map_err(|_| FlashcardParseError::InvalidFormat)
        })
        .collect()
}

/// Wrap an editor-assist response so it can be appended to note content.
pub fn wrap_html(response: &str) -> String {
    format!("<div>{}</div>", response.trim())
}
