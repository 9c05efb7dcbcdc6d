// Cramly core: data model, configuration, persistence seam, and the pure
// client-side logic (editor dirty tracking, export, flashcard review,
// route guarding) shared by the app orchestrator and the TUI.

pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod export;
pub mod model;
pub mod review;
pub mod route;
pub mod store;
