//! Authentication errors.

use thiserror::Error;

use shopfront_core::EmailError;

use super::store::StoreError;
use crate::api::ApiError;

/// Errors from establishing or managing a session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The email is malformed; nothing was sent.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// The backend could not be reached.
    #[error("network error: {0}")]
    Network(#[source] ApiError),

    /// The backend refused the request for another reason.
    #[error("{0}")]
    Rejected(String),

    /// The session could not be persisted or read back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Classify a failed login.
    pub(crate) fn from_login(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized
            | ApiError::Status {
                status: 400 | 401, ..
            } => Self::InvalidCredentials,
            other => Self::from(other),
        }
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(_) => Self::Network(err),
            ApiError::MissingToken | ApiError::Unauthorized => Self::NotSignedIn,
            other => Self::Rejected(
                other
                    .message()
                    .map_or_else(|| other.to_string(), ToString::to_string),
            ),
        }
    }
}
