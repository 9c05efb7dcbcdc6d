pub mod app;
pub mod auth;
pub mod backend;
pub mod flashcards;
pub mod notes;
pub mod protocol;
pub mod remote;
pub mod tutor;
