// Picks the store and auth client for the configured backend mode.

use std::sync::Arc;

use tracing::{info, warn};

use cramly_core::config::{BackendMode, Config};
use cramly_core::db::{Database, LocalStore};
use cramly_core::store::{Store, UnconfiguredStore};

use crate::auth::{restore_session, AuthClient, AuthService, SessionHandle};
use crate::protocol::BackendKind;
use crate::remote::RestStore;

/// The data and identity services the app talks to.
pub struct Backend {
    pub kind: BackendKind,
    pub store: Arc<dyn Store>,
    pub auth: AuthClient,
    pub session: SessionHandle,
    /// Local database: the store in local mode, the session cache in all modes.
    pub db: Arc<Database>,
}

impl Backend {
    /// Single-user backend over the local database.
    pub fn local(db: Arc<Database>, user_name: &str) -> Self {
        let store = LocalStore::new(Arc::clone(&db), LocalStore::local_user(user_name));
        Backend {
            kind: BackendKind::Local,
            store: Arc::new(store),
            auth: AuthClient::Unconfigured,
            session: SessionHandle::default(),
            db,
        }
    }

    /// Stand-in for a hosted backend without a URL or key.
    pub fn unconfigured(db: Arc<Database>) -> Self {
        Backend {
            kind: BackendKind::Unconfigured,
            store: Arc::new(UnconfiguredStore),
            auth: AuthClient::Unconfigured,
            session: SessionHandle::default(),
            db,
        }
    }

    /// Hosted backend; a persisted session is restored (and refreshed if
    /// expired) before the store is built. The store refreshes it again
    /// whenever it expires during the run.
    pub async fn hosted(db: Arc<Database>, url: &str, anon_key: &str, redirect_url: &str) -> Self {
        let auth = AuthClient::Configured(AuthService::new(url, anon_key, redirect_url));
        let session = SessionHandle::new(restore_session(&auth, &db).await);
        let store = RestStore::new(url, anon_key, session.clone())
            .with_session_refresh(auth.clone(), Arc::clone(&db));
        Backend {
            kind: BackendKind::Hosted,
            store: Arc::new(store),
            auth,
            session,
            db,
        }
    }

    pub async fn from_config(config: &Config, db: Arc<Database>) -> Self {
        match config.backend.mode {
            BackendMode::Local => {
                info!("Using local backend at {}", config.db_path.display());
                Backend::local(db, &config.backend.local_user_name)
            }
            BackendMode::Hosted => match config.hosted_backend() {
                Some((url, key)) => {
                    info!("Using hosted backend at {url}");
                    Backend::hosted(db, url, key, &config.backend.redirect_url).await
                }
                None => {
                    warn!("Hosted backend selected but URL or anon key is missing");
                    Backend::unconfigured(db)
                }
            },
        }
    }
}
