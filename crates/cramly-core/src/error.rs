// Errors surfaced by the persistence seam.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation needs a signed-in user and there is none.
    #[error("{0}")]
    NotAuthenticated(String),

    /// No backend is configured; every operation fails with this.
    #[error("missing configuration")]
    MissingConfiguration,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The hosted backend answered with a non-success status.
    #[error("backend returned status {status}: {message}")]
    Backend { status: u16, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_authenticated(message: impl Into<String>) -> Self {
        StoreError::NotAuthenticated(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
