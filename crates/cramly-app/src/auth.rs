// OAuth sign-in against the hosted backend's auth service.
//
// The browser does the provider dance; Cramly builds the authorize URL, reads
// the tokens back out of the redirect URL the user pastes in, and validates
// them with the auth service before treating the user as signed in.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use cramly_core::db::Database;
use cramly_core::model::{Session, User};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing configuration")]
    MissingConfiguration,

    /// The provider redirected back with an error fragment.
    #[error("{description}")]
    Provider { error: String, description: String },

    #[error("invalid sign-in callback: {0}")]
    InvalidCallback(String),

    #[error("auth service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Slack,
    Github,
    Discord,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 3] = [
        OAuthProvider::Slack,
        OAuthProvider::Github,
        OAuthProvider::Discord,
    ];

    /// Provider id understood by the auth service.
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Slack => "slack_oidc",
            OAuthProvider::Github => "github",
            OAuthProvider::Discord => "discord",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OAuthProvider::Slack => "Slack",
            OAuthProvider::Github => "GitHub",
            OAuthProvider::Discord => "Discord",
        }
    }
}

// ---------------------------------------------------------------------------
// Callback parsing
// ---------------------------------------------------------------------------

/// Tokens carried in the fragment of the OAuth redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
}

impl CallbackTokens {
    /// Absolute expiry: `expires_at` when given, else `now + expires_in`.
    pub fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(at) = self.expires_at {
            return Utc.timestamp_opt(at, 0).single();
        }
        self.expires_in.map(|secs| now + ChronoDuration::seconds(secs))
    }
}

/// Whether `url` looks like the landing URL of an OAuth redirect.
pub fn is_auth_callback(url: &str) -> bool {
    let Ok(url) = Url::parse(url.trim()) else {
        return false;
    };
    let fragment_has_token = url
        .fragment()
        .map(|f| url::form_urlencoded::parse(f.as_bytes()).any(|(k, _)| k == "access_token"))
        .unwrap_or(false);
    fragment_has_token || url.query_pairs().any(|(k, _)| k == "code")
}

/// Extract the session tokens from a redirect URL.
pub fn parse_callback(url: &str) -> Result<CallbackTokens, AuthError> {
    let url = Url::parse(url.trim())
        .map_err(|e| AuthError::InvalidCallback(format!("not a URL: {e}")))?;

    let fragment = url.fragment().unwrap_or_default();
    let mut access_token = None;
    let mut refresh_token = None;
    let mut token_type = None;
    let mut expires_in = None;
    let mut expires_at = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        let value = value.into_owned();
        match key.as_ref() {
            "access_token" => access_token = Some(value),
            "refresh_token" => refresh_token = Some(value),
            "token_type" => token_type = Some(value),
            "expires_in" => expires_in = value.parse().ok(),
            "expires_at" => expires_at = value.parse().ok(),
            "error" => error = Some(value),
            "error_description" => error_description = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        let description = error_description.unwrap_or_else(|| error.clone());
        return Err(AuthError::Provider { error, description });
    }

    let access_token = access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
        if url.query_pairs().any(|(k, _)| k == "code") {
            AuthError::InvalidCallback(
                "authorization-code redirects are not supported; enable the implicit flow".into(),
            )
        } else {
            AuthError::InvalidCallback("no access token in redirect URL".into())
        }
    })?;

    Ok(CallbackTokens {
        access_token,
        refresh_token: refresh_token.filter(|t| !t.is_empty()),
        token_type: token_type.unwrap_or_else(|| "bearer".to_string()),
        expires_in,
        expires_at,
    })
}

// ---------------------------------------------------------------------------
// Shared session
// ---------------------------------------------------------------------------

/// The current session, shared between the app loop and the REST store.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<RwLock<Option<Session>>>);

impl SessionHandle {
    pub fn new(session: Option<Session>) -> Self {
        SessionHandle(Arc::new(RwLock::new(session)))
    }

    /// Read access to the slot. Panics if a writer panicked while holding it.
    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.0.read().expect("session lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.0.write().expect("session lock poisoned")
    }

    pub fn get(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn set(&self, session: Session) {
        *self.write() = Some(session);
    }

    pub fn clear(&self) {
        *self.write() = None;
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.access_token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().map(|s| s.user.clone())
    }
}

// ---------------------------------------------------------------------------
// Auth service client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<AuthUser> for User {
    fn from(u: AuthUser) -> Self {
        User {
            id: u.id,
            email: u.email.filter(|e| !e.is_empty()),
            full_name: u.user_metadata.full_name.or(u.user_metadata.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

/// Client for the hosted auth endpoints under `{url}/auth/v1`.
#[derive(Clone)]
pub struct AuthService {
    http: reqwest::Client,
    url: String,
    anon_key: String,
    redirect_url: String,
}

impl AuthService {
    pub fn new(url: &str, anon_key: &str, redirect_url: &str) -> Self {
        AuthService {
            http: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            redirect_url: redirect_url.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.url)
    }

    fn authorize_url(&self, provider: OAuthProvider) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.endpoint("authorize"))
            .with_context(|| format!("invalid backend URL: {}", self.url))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", &self.redirect_url);
        Ok(url.into())
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let response = self
            .http
            .get(self.endpoint("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("failed to reach auth service")?;
        let user: AuthUser = check_status(response)
            .await?
            .json()
            .await
            .context("auth service returned an unreadable user")?;
        Ok(user.into())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("failed to reach auth service")?;
        check_status(response).await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .context("failed to reach auth service")?;
        let tokens: TokenResponse = check_status(response)
            .await?
            .json()
            .await
            .context("auth service returned an unreadable token response")?;

        let callback = CallbackTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_in: tokens.expires_in,
            expires_at: tokens.expires_at,
        };
        Ok(session_from(callback, tokens.user.into(), now))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or(body);
    Err(AuthError::Status {
        status: status.as_u16(),
        message,
    })
}

fn session_from(tokens: CallbackTokens, user: User, now: DateTime<Utc>) -> Session {
    Session {
        expires_at: tokens.expiry(now),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens.token_type,
        user,
    }
}

/// Either a configured auth service or a stand-in for a missing backend.
#[derive(Clone)]
pub enum AuthClient {
    Configured(AuthService),
    Unconfigured,
}

impl AuthClient {
    pub fn is_configured(&self) -> bool {
        matches!(self, AuthClient::Configured(_))
    }

    /// Browser URL that starts sign-in with `provider`.
    pub fn authorize_url(&self, provider: OAuthProvider) -> Result<String, AuthError> {
        match self {
            AuthClient::Configured(service) => service.authorize_url(provider),
            AuthClient::Unconfigured => Err(AuthError::MissingConfiguration),
        }
    }

    /// Validate callback tokens with the auth service and build the session.
    pub async fn establish_session(&self, tokens: CallbackTokens) -> Result<Session, AuthError> {
        let AuthClient::Configured(service) = self else {
            return Err(AuthError::MissingConfiguration);
        };
        let user = service.get_user(&tokens.access_token).await?;
        info!("Signed in as user {}", user.id);
        Ok(session_from(tokens, user, Utc::now()))
    }

    pub async fn get_user(&self, session: &Session) -> Result<User, AuthError> {
        match self {
            AuthClient::Configured(service) => service.get_user(&session.access_token).await,
            AuthClient::Unconfigured => Err(AuthError::MissingConfiguration),
        }
    }

    /// Revoke `session` with the auth service. Succeeds without a backend.
    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        match self {
            AuthClient::Configured(service) => service.sign_out(&session.access_token).await,
            AuthClient::Unconfigured => Ok(()),
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        match self {
            AuthClient::Configured(service) => service.refresh(refresh_token, Utc::now()).await,
            AuthClient::Unconfigured => Err(AuthError::MissingConfiguration),
        }
    }
}

/// Load the persisted session, refreshing it when it has expired.
///
/// A session that cannot be refreshed is removed from the database.
pub async fn restore_session(auth: &AuthClient, db: &Database) -> Option<Session> {
    let stored = match db.load_session() {
        Ok(Some(session)) => session,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to load stored session: {e:#}");
            return None;
        }
    };

    if !stored.is_expired(Utc::now()) {
        info!("Restored session for user {}", stored.user.id);
        return Some(stored);
    }

    let refreshed = match stored.refresh_token.as_deref() {
        Some(token) => auth.refresh(token).await,
        None => Err(AuthError::InvalidCallback("stored session has no refresh token".into())),
    };

    match refreshed {
        Ok(session) => {
            info!("Refreshed expired session for user {}", session.user.id);
            if let Err(e) = db.save_session(&session) {
                warn!("Failed to persist refreshed session: {e:#}");
            }
            Some(session)
        }
        Err(e) => {
            warn!("Stored session expired and could not be refreshed: {e}");
            if let Err(e) = db.clear_session() {
                warn!("Failed to clear stored session: {e:#}");
            }
            None
        }
    }
}

/// Swap an expired session in `handle` for a refreshed one and persist it.
///
/// A valid session is left alone. When the refresh fails the old session
/// stays, and the request that follows fails with the backend's error.
pub async fn refresh_expired_session(auth: &AuthClient, handle: &SessionHandle, db: &Database) {
    let Some(session) = handle.get() else {
        return;
    };
    if !session.is_expired(Utc::now()) {
        return;
    }
    let Some(refresh_token) = session.refresh_token.as_deref() else {
        warn!("Session for user {} expired without a refresh token", session.user.id);
        return;
    };

    match auth.refresh(refresh_token).await {
        Ok(fresh) => {
            info!("Refreshed expired session for user {}", fresh.user.id);
            if let Err(e) = db.save_session(&fresh) {
                warn!("Failed to persist refreshed session: {e:#}");
            }
            handle.set(fresh);
        }
        Err(e) => warn!("Session expired and could not be refreshed: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
