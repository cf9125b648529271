//! Cart errors.

use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by the cart synchronizer.
///
/// Every variant leaves the cart in a consistent state: validation errors
/// never touch it, and failed optimistic changes are rolled back before the
/// error is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// No session; nothing was sent.
    #[error("Sign in to use the cart")]
    Unauthenticated,

    /// Quantity below one, or above the known stock; nothing was sent.
    #[error("Invalid quantity {requested}{}", format_available(.available))]
    InvalidQuantity {
        requested: u32,
        available: Option<u32>,
    },

    /// The backend could not be reached (including timeouts).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend refused the change.
    #[error("{0}")]
    ServerRejected(String),

    /// The backend no longer accepts the session; it has been cleared.
    #[error("Session expired, please sign in again")]
    StaleSession,

    /// Adding failed without a reason from the backend.
    #[error("Failed to add item to cart")]
    AddFailed,

    /// The session changed while the operation was in flight; its outcome
    /// was discarded.
    #[error("Session changed before the cart operation completed")]
    SessionChanged,
}

impl CartError {
    pub(crate) const fn invalid_quantity(requested: u32, available: Option<u32>) -> Self {
        Self::InvalidQuantity {
            requested,
            available,
        }
    }

    /// Whether the error ended the session.
    #[must_use]
    pub const fn is_session_loss(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::StaleSession | Self::SessionChanged
        )
    }

    /// Map a failed add. A rejection without a reason becomes `AddFailed`.
    pub(crate) fn from_add(err: ApiError) -> Self {
        match err {
            ApiError::Status { message: None, .. } | ApiError::Parse(_) => Self::AddFailed,
            other => Self::from(other),
        }
    }
}

impl From<ApiError> for CartError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(e) => Self::Network(e.to_string()),
            ApiError::MissingToken => Self::Unauthenticated,
            ApiError::Unauthorized => Self::StaleSession,
            other => Self::ServerRejected(
                other
                    .message()
                    .map_or_else(|| other.to_string(), ToString::to_string),
            ),
        }
    }
}

fn format_available(available: &Option<u32>) -> String {
    available.map_or_else(String::new, |n| format!(" (only {n} available)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            CartError::invalid_quantity(4, Some(3)).to_string(),
            "Invalid quantity 4 (only 3 available)"
        );
        assert_eq!(
            CartError::invalid_quantity(0, None).to_string(),
            "Invalid quantity 0"
        );
    }

    #[test]
    fn test_add_without_reason_is_add_failed() {
        let err = CartError::from_add(ApiError::Status {
            status: 500,
            message: None,
        });
        assert_eq!(err, CartError::AddFailed);

        let err = CartError::from_add(ApiError::Status {
            status: 400,
            message: Some("Insufficient stock".to_string()),
        });
        assert_eq!(err, CartError::ServerRejected("Insufficient stock".to_string()));
    }
}
