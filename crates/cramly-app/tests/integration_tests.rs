// Integration tests for the hosted backend.
//
// These tests run the REST store, the auth client and the application event
// loop against a mock backend, using the library crate's public API. They
// verify request shapes (paths, filters, headers), error mapping, session
// restore, and the sign-in / sign-out flow end to end.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cramly_app::app::{self, AppState};
use cramly_app::auth::{self, AuthClient, AuthService, SessionHandle};
use cramly_app::backend::Backend;
use cramly_app::protocol::{AppSnapshot, BackendKind, UiUpdate, UserCommand};
use cramly_app::remote::RestStore;
use cramly_app::{flashcards, notes, tutor};
use cramly_core::config::{
    AiConfig, BackendConfig, BackendMode, Config, CredentialsConfig, EditorConfig,
};
use cramly_core::db::Database;
use cramly_core::error::StoreError;
use cramly_core::model::{
    NewFlashcard, NoteUpdate, Role, Session, User, DEFAULT_NOTE_CONTENT, DEFAULT_NOTE_TITLE,
};
use cramly_core::route::Route;
use cramly_core::store::Store;
use cramly_llm::client::LlmClient;

// ===========================================================================
// Test helpers
// ===========================================================================

const ANON_KEY: &str = "anon-key";
const REDIRECT: &str = "http://localhost:3000/auth/callback";
const TS: &str = "2024-03-04T15:07:00.000000Z";

fn test_user() -> User {
    User {
        id: "user-1".into(),
        email: Some("ada@example.com".into()),
        full_name: Some("Ada Lovelace".into()),
    }
}

fn session(access_token: &str, expires_in_secs: i64) -> Session {
    Session {
        access_token: access_token.into(),
        refresh_token: Some("refresh-1".into()),
        token_type: "bearer".into(),
        expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
        user: test_user(),
    }
}

fn signed_in_store(server: &MockServer) -> RestStore {
    RestStore::new(
        &server.uri(),
        ANON_KEY,
        SessionHandle::new(Some(session("user-token", 3600))),
    )
}

fn note_row(id: &str, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "content": "<p>body</p>",
        "created_at": TS,
        "updated_at": TS,
    })
}

fn deck_row(id: &str, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "user_id": "user-1",
        "ai_prompt": "Chemistry",
        "created_at": TS,
        "updated_at": TS,
    })
}

fn card_row(id: &str, deck_id: &str, question: &str, answer: &str) -> serde_json::Value {
    json!({
        "id": id,
        "deck_id": deck_id,
        "question": question,
        "answer": answer,
        "created_at": TS,
        "updated_at": TS,
    })
}

fn auth_user_body() -> serde_json::Value {
    json!({
        "id": "user-1",
        "email": "ada@example.com",
        "user_metadata": { "full_name": "Ada Lovelace" },
    })
}

fn hosted_config(url: &str) -> Config {
    Config {
        backend: BackendConfig {
            mode: BackendMode::Hosted,
            url: Some(url.to_string()),
            redirect_url: REDIRECT.into(),
            local_user_name: "Student".into(),
        },
        ai: AiConfig {
            endpoint: String::new(),
            model: None,
            default_flashcard_count: 5,
        },
        editor: EditorConfig::default(),
        credentials: CredentialsConfig {
            supabase_anon_key: Some(ANON_KEY.into()),
            ai_api_key: None,
        },
        db_path: ":memory:".into(),
        export_dir: std::env::temp_dir().join("cramly-it-exports"),
    }
}

/// Receive UI updates until a snapshot satisfies `pred`.
async fn wait_for_snapshot(
    ui_rx: &mut mpsc::Receiver<UiUpdate>,
    pred: impl Fn(&AppSnapshot) -> bool,
) -> AppSnapshot {
    let wait = async {
        loop {
            match ui_rx.recv().await {
                Some(UiUpdate::StateSnapshot(snapshot)) if pred(&snapshot) => return *snapshot,
                Some(_) => continue,
                None => panic!("UI channel closed before the expected snapshot"),
            }
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(10), wait)
        .await
        .expect("timed out waiting for snapshot")
}

// ===========================================================================
// REST store
// ===========================================================================

#[tokio::test]
async fn list_notes_sends_session_token_and_ordering() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/notes"))
        .and(query_param("select", "*"))
        .and(query_param("order", "updated_at.desc"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([note_row("n2", "Newer"), note_row("n1", "Older")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store(&server);
    let list = notes::list_notes(&store).await.unwrap();

    let titles: Vec<&str> = list.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Newer", "Older"]);
    assert!(list.iter().all(|n| !n.is_unsaved));
}

#[tokio::test]
async fn signed_out_requests_use_anon_key_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/ai_conversations"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), ANON_KEY, SessionHandle::default());
    assert!(store.current_user().await.unwrap().is_none());
    assert!(tutor::list_conversations(&store).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_note_patches_by_id_and_returns_row() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notes"))
        .and(query_param("id", "eq.n1"))
        .and(header("prefer", "return=representation"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([note_row("n1", "Renamed")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store(&server);
    let note = notes::update_note(&store, "n1", &NoteUpdate::full("Renamed", "<p>body</p>"))
        .await
        .unwrap();

    assert_eq!(note.id, "n1");
    assert_eq!(note.title, "Renamed");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["title"], "Renamed");
    assert!(body["updated_at"].is_string());
}

#[tokio::test]
async fn missing_row_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/notes"))
        .and(query_param("id", "eq.gone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = signed_in_store(&server);
    let err = notes::get_note(&store, "gone").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn backend_error_message_is_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notes"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })),
        )
        .mount(&server)
        .await;

    let store = signed_in_store(&server);
    let err = notes::create_note(&store, None, None).await.unwrap_err();
    match err {
        StoreError::Backend { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "JWT expired");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_note_posts_placeholders() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notes"))
        .and(body_json(json!([{
            "title": DEFAULT_NOTE_TITLE,
            "content": DEFAULT_NOTE_CONTENT,
        }])))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([note_row("n9", "Untitled Note")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store(&server);
    let note = notes::create_note(&store, None, None).await.unwrap();
    assert_eq!(note.id, "n9");
}

#[tokio::test]
async fn decks_are_listed_with_their_cards() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/flashcard_decks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([deck_row("d1", "Salts"), deck_row("d2", "Acids")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/flashcards"))
        .and(query_param("deck_id", "in.(\"d1\",\"d2\")"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            card_row("c1", "d1", "NaCl?", "Salt"),
            card_row("c2", "d2", "HCl?", "Acid"),
            card_row("c3", "d1", "KCl?", "Salt"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store(&server);
    let decks = flashcards::list_decks(&store).await.unwrap();

    assert_eq!(decks.len(), 2);
    assert_eq!(decks[0].card_count(), 2);
    assert_eq!(decks[1].card_count(), 1);
    assert_eq!(decks[1].flashcards[0].question, "HCl?");
}

#[tokio::test]
async fn create_deck_inserts_deck_then_cards() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/flashcard_decks"))
        .and(body_json(json!([{
            "title": "Salts",
            "user_id": "user-1",
            "ai_prompt": "Chemistry",
        }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([deck_row("d1", "Salts")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/flashcards"))
        .and(body_json(json!([
            { "deck_id": "d1", "question": "NaCl?", "answer": "Salt" },
            { "deck_id": "d1", "question": "KCl?", "answer": "Salt" },
        ])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            card_row("c1", "d1", "NaCl?", "Salt"),
            card_row("c2", "d1", "KCl?", "Salt"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store(&server);
    let cards = vec![
        NewFlashcard::new("NaCl?", "Salt"),
        NewFlashcard::new("KCl?", "Salt"),
    ];
    let deck = flashcards::create_deck(&store, "Salts", &cards, Some("Chemistry"))
        .await
        .unwrap();

    assert_eq!(deck.id, "d1");
    assert_eq!(deck.card_count(), 2);
}

#[tokio::test]
async fn create_deck_requires_sign_in() {
    let server = MockServer::start().await;
    let store = RestStore::new(&server.uri(), ANON_KEY, SessionHandle::default());

    let err = flashcards::create_deck(&store, "Salts", &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotAuthenticated(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn messages_are_filtered_by_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/ai_messages"))
        .and(query_param("conversation_id", "eq.conv-1"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "m1", "conversation_id": "conv-1", "content": "Hi", "role": "user", "created_at": TS },
            { "id": "m2", "conversation_id": "conv-1", "content": "Hello!", "role": "assistant", "created_at": TS },
        ])))
        .mount(&server)
        .await;

    let store = signed_in_store(&server);
    let messages = tutor::list_messages(&store, "conv-1").await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
}

// ===========================================================================
// Auth
// ===========================================================================

#[tokio::test]
async fn establish_session_validates_token_with_auth_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_user_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthClient::Configured(AuthService::new(&server.uri(), ANON_KEY, REDIRECT));
    let tokens = auth::parse_callback(&format!(
        "{REDIRECT}#access_token=tok-1&refresh_token=r-1&expires_in=3600&token_type=bearer"
    ))
    .unwrap();
    let session = client.establish_session(tokens).await.unwrap();

    assert_eq!(session.access_token, "tok-1");
    assert_eq!(session.user.display_name(), "Ada Lovelace");
    assert!(!session.is_expired(Utc::now()));
}

#[tokio::test]
async fn rejected_token_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "msg": "invalid JWT" })),
        )
        .mount(&server)
        .await;

    let client = AuthClient::Configured(AuthService::new(&server.uri(), ANON_KEY, REDIRECT));
    let err = client
        .get_user(&session("bad", 3600))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "auth service returned status 401: invalid JWT");
}

#[tokio::test]
async fn expired_session_is_refreshed_on_restore() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "refresh-2",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": auth_user_body(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = Database::open(":memory:").unwrap();
    db.save_session(&session("stale", -60)).unwrap();
    let client = AuthClient::Configured(AuthService::new(&server.uri(), ANON_KEY, REDIRECT));

    let restored = auth::restore_session(&client, &db).await.unwrap();
    assert_eq!(restored.access_token, "fresh");

    let persisted = db.load_session().unwrap().unwrap();
    assert_eq!(persisted.refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn unrefreshable_session_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error_description": "Invalid Refresh Token" })),
        )
        .mount(&server)
        .await;

    let db = Database::open(":memory:").unwrap();
    db.save_session(&session("stale", -60)).unwrap();
    let client = AuthClient::Configured(AuthService::new(&server.uri(), ANON_KEY, REDIRECT));

    assert!(auth::restore_session(&client, &db).await.is_none());
    assert!(db.load_session().unwrap().is_none());
}

#[tokio::test]
async fn expired_session_is_refreshed_before_row_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "refresh-2",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": auth_user_body(),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/notes"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let db = Arc::new(Database::open(":memory:").unwrap());
    let handle = SessionHandle::new(Some(session("stale", -60)));
    let client = AuthClient::Configured(AuthService::new(&server.uri(), ANON_KEY, REDIRECT));
    let store = RestStore::new(&server.uri(), ANON_KEY, handle.clone())
        .with_session_refresh(client, Arc::clone(&db));

    assert!(notes::list_notes(&store).await.unwrap().is_empty());
    assert_eq!(handle.access_token().as_deref(), Some("fresh"));
    let persisted = db.load_session().unwrap().unwrap();
    assert_eq!(persisted.refresh_token.as_deref(), Some("refresh-2"));

    // The renewed session is still valid, so no second refresh happens.
    assert!(notes::list_notes(&store).await.unwrap().is_empty());
}

// ===========================================================================
// Event loop against the hosted backend
// ===========================================================================

#[tokio::test]
async fn sign_in_and_sign_out_through_event_loop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_user_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/notes"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([note_row("n1", "Cells")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/flashcard_decks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = hosted_config(&server.uri());
    let db = Arc::new(Database::open(":memory:").unwrap());
    let backend = Backend::from_config(&config, Arc::clone(&db)).await;
    assert_eq!(backend.kind, BackendKind::Hosted);

    let (llm_tx, llm_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (ui_tx, mut ui_rx) = mpsc::channel(64);
    let state = AppState::new(config, backend, LlmClient::Disabled, llm_tx);
    let handle = tokio::spawn(app::run(llm_rx, cmd_rx, ui_tx, state));

    let first = wait_for_snapshot(&mut ui_rx, |_| true).await;
    assert_eq!(first.route, Route::SignIn);
    assert!(first.user.is_none());

    cmd_tx
        .send(UserCommand::CompleteSignIn(format!(
            "{REDIRECT}#access_token=tok-1&refresh_token=r-1&expires_in=3600"
        )))
        .await
        .unwrap();
    let signed_in = wait_for_snapshot(&mut ui_rx, |s| s.route == Route::Dashboard).await;
    assert_eq!(signed_in.user.unwrap().id, "user-1");
    assert_eq!(signed_in.notes.len(), 1);
    assert!(db.load_session().unwrap().is_some());

    cmd_tx.send(UserCommand::SignOut).await.unwrap();
    let signed_out = wait_for_snapshot(&mut ui_rx, |s| s.route == Route::SignIn).await;
    assert!(signed_out.user.is_none());
    assert!(signed_out.notes.is_empty());
    assert!(db.load_session().unwrap().is_none());

    cmd_tx.send(UserCommand::Quit).await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn hosted_mode_without_key_is_unconfigured() {
    let mut config = hosted_config("http://127.0.0.1:9");
    config.credentials.supabase_anon_key = None;
    let db = Arc::new(Database::open(":memory:").unwrap());

    let backend = Backend::from_config(&config, db).await;
    assert_eq!(backend.kind, BackendKind::Unconfigured);
    assert!(!backend.auth.is_configured());
    assert!(matches!(
        backend.store.list_notes().await,
        Err(StoreError::MissingConfiguration)
    ));
}
