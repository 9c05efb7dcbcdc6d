// Chat-completion client, prompt templates and AI response parsing.

pub mod client;
pub mod flashcards;
pub mod prompt;

pub use client::{ChatClient, ChatMessage, LlmClient, LlmEvent};
