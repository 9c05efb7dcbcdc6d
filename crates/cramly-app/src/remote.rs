// `Store` over the hosted backend's REST interface.
//
// Every table lives at `{url}/rest/v1/{table}`. Filters are query parameters
// of the form `col=eq.value` / `col=in.(a,b)`, ordering is `order=col.desc`,
// and writes ask for the stored rows back with `Prefer: return=representation`.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use cramly_core::db::Database;
use cramly_core::error::{StoreError, StoreResult};
use cramly_core::model::{
    Conversation, Flashcard, FlashcardDeck, Message, NewFlashcard, Note, NoteUpdate, Role, User,
};
use cramly_core::store::Store;

use crate::auth::{refresh_expired_session, AuthClient, SessionHandle};

const NOTES: &str = "notes";
const DECKS: &str = "flashcard_decks";
const CARDS: &str = "flashcards";
const CONVERSATIONS: &str = "ai_conversations";
const MESSAGES: &str = "ai_messages";

pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: SessionHandle,
    refresh: Option<SessionRefresh>,
}

/// What the store needs to renew an expired session on its own.
struct SessionRefresh {
    auth: AuthClient,
    db: Arc<Database>,
}

impl RestStore {
    pub fn new(url: &str, anon_key: &str, session: SessionHandle) -> Self {
        RestStore {
            http: reqwest::Client::new(),
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            session,
            refresh: None,
        }
    }

    /// Refresh an expired session through `auth` before each request, saving
    /// the renewed session to `db`.
    pub fn with_session_refresh(mut self, auth: AuthClient, db: Arc<Database>) -> Self {
        self.refresh = Some(SessionRefresh { auth, db });
        self
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http.request(method, format!("{}/{table}", self.base_url))
    }

    fn select(&self, table: &str) -> RequestBuilder {
        self.request(Method::GET, table).query(&[("select", "*")])
    }

    fn write(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, table)
            .header("Prefer", "return=representation")
    }

    /// Send `request` with the API key and the caller's bearer token (the
    /// anon key when signed out).
    async fn send(&self, request: RequestBuilder) -> StoreResult<reqwest::Response> {
        if let Some(refresh) = &self.refresh {
            refresh_expired_session(&refresh.auth, &self.session, &refresh.db).await;
        }
        let token = self
            .session
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        dispatch(request.header("apikey", &self.anon_key).bearer_auth(token)).await
    }

    /// Send `request` and decode the returned rows.
    async fn rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<Vec<T>> {
        let response = self.send(request).await?;
        let rows = response
            .json::<Vec<T>>()
            .await
            .context("backend returned rows in an unexpected shape")?;
        Ok(rows)
    }

    /// Like `rows`, but exactly one row is expected.
    async fn single<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        entity: &'static str,
        id: &str,
    ) -> StoreResult<T> {
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(entity, id))
    }
}

async fn dispatch(request: RequestBuilder) -> StoreResult<reqwest::Response> {
    let response = request
        .send()
        .await
        .context("failed to reach backend")?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);
    debug!("Backend error {}: {}", status, message);
    Err(StoreError::Backend {
        status: status.as_u16(),
        message,
    })
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl Store for RestStore {
    async fn current_user(&self) -> StoreResult<Option<User>> {
        Ok(self.session.user())
    }

    // --- notes ---

    async fn list_notes(&self) -> StoreResult<Vec<Note>> {
        self.rows(self.select(NOTES).query(&[("order", "updated_at.desc")]))
            .await
    }

    async fn get_note(&self, id: &str) -> StoreResult<Note> {
        self.single(self.select(NOTES).query(&[("id", eq(id))]), "note", id)
            .await
    }

    async fn insert_note(&self, title: &str, content: &str) -> StoreResult<Note> {
        let body = json!([{ "title": title, "content": content }]);
        self.single(self.write(Method::POST, NOTES).json(&body), "note", "new")
            .await
    }

    async fn update_note(&self, id: &str, update: &NoteUpdate) -> StoreResult<Note> {
        let mut body = serde_json::to_value(update).context("failed to encode note update")?;
        body["updated_at"] = json!(now_ts());
        self.single(
            self.write(Method::PATCH, NOTES)
                .query(&[("id", eq(id))])
                .json(&body),
            "note",
            id,
        )
        .await
    }

    async fn delete_note(&self, id: &str) -> StoreResult<()> {
        self.send(self.request(Method::DELETE, NOTES).query(&[("id", eq(id))])).await?;
        Ok(())
    }

    // --- flashcard decks ---

    async fn list_decks(&self) -> StoreResult<Vec<FlashcardDeck>> {
        self.rows(self.select(DECKS).query(&[("order", "updated_at.desc")]))
            .await
    }

    async fn get_deck(&self, id: &str) -> StoreResult<FlashcardDeck> {
        self.single(
            self.select(DECKS).query(&[("id", eq(id))]),
            "flashcard deck",
            id,
        )
        .await
    }

    async fn insert_deck(
        &self,
        title: &str,
        user_id: &str,
        ai_prompt: Option<&str>,
    ) -> StoreResult<FlashcardDeck> {
        let body = json!([{ "title": title, "user_id": user_id, "ai_prompt": ai_prompt }]);
        self.single(
            self.write(Method::POST, DECKS).json(&body),
            "flashcard deck",
            "new",
        )
        .await
    }

    async fn delete_deck(&self, id: &str) -> StoreResult<()> {
        self.send(self.request(Method::DELETE, DECKS).query(&[("id", eq(id))])).await?;
        Ok(())
    }

    // --- flashcards ---

    async fn list_cards(&self, deck_ids: &[String]) -> StoreResult<Vec<Flashcard>> {
        if deck_ids.is_empty() {
            return Ok(Vec::new());
        }
        let quoted: Vec<String> = deck_ids.iter().map(|id| format!("\"{id}\"")).collect();
        let filter = format!("in.({})", quoted.join(","));
        self.rows(
            self.select(CARDS)
                .query(&[("deck_id", filter.as_str()), ("order", "created_at.asc")]),
        )
        .await
    }

    async fn insert_cards(
        &self,
        deck_id: &str,
        cards: &[NewFlashcard],
    ) -> StoreResult<Vec<Flashcard>> {
        if cards.is_empty() {
            return Ok(Vec::new());
        }
        let body: Vec<serde_json::Value> = cards
            .iter()
            .map(|c| json!({ "deck_id": deck_id, "question": c.question, "answer": c.answer }))
            .collect();
        self.rows(self.write(Method::POST, CARDS).json(&body)).await
    }

    async fn delete_cards(&self, deck_id: &str) -> StoreResult<()> {
        self.send(
            self.request(Method::DELETE, CARDS)
                .query(&[("deck_id", eq(deck_id))]),
        )
        .await?;
        Ok(())
    }

    // --- conversations ---

    async fn list_conversations(&self) -> StoreResult<Vec<Conversation>> {
        self.rows(self.select(CONVERSATIONS).query(&[("order", "created_at.desc")]))
            .await
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Conversation> {
        self.single(
            self.select(CONVERSATIONS).query(&[("id", eq(id))]),
            "conversation",
            id,
        )
        .await
    }

    async fn insert_conversation(&self, title: &str, user_id: &str) -> StoreResult<Conversation> {
        let body = json!([{ "title": title, "user_id": user_id }]);
        self.single(
            self.write(Method::POST, CONVERSATIONS).json(&body),
            "conversation",
            "new",
        )
        .await
    }

    async fn update_conversation_title(&self, id: &str, title: &str) -> StoreResult<Conversation> {
        let body = json!({ "title": title, "updated_at": now_ts() });
        self.single(
            self.write(Method::PATCH, CONVERSATIONS)
                .query(&[("id", eq(id))])
                .json(&body),
            "conversation",
            id,
        )
        .await
    }

    async fn delete_conversation(&self, id: &str) -> StoreResult<()> {
        self.send(
            self.request(Method::DELETE, CONVERSATIONS)
                .query(&[("id", eq(id))]),
        )
        .await?;
        Ok(())
    }

    // --- messages ---

    async fn list_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        self.rows(self.select(MESSAGES).query(&[
            ("conversation_id", eq(conversation_id).as_str()),
            ("order", "created_at.asc"),
        ]))
        .await
    }

    async fn insert_message(
        &self,
        conversation_id: &str,
        content: &str,
        role: Role,
    ) -> StoreResult<Message> {
        let body = json!([{
            "conversation_id": conversation_id,
            "content": content,
            "role": role.as_str(),
        }]);
        self.single(
            self.write(Method::POST, MESSAGES).json(&body),
            "message",
            "new",
        )
        .await
    }
}
