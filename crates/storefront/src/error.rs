//! Errors surfaced to the UI layer.
//!
//! Every synchronizer operation returns `Result<T, SyncError>`. No variant is
//! fatal: the synchronizer narrows to an empty or anonymous state instead of
//! crashing, and the caller only decides what to display.

use thiserror::Error;

use crate::api::ApiError;

/// Error taxonomy of the cart/session synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The request never reached the server or never came back.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The operation needs a logged-in user and there is none.
    #[error("You must be logged in")]
    Unauthenticated,

    /// The server answered `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// The server no longer accepts the session token.
    ///
    /// By the time this is returned the session and cart have been cleared.
    #[error("Session expired: {0}")]
    Deauthorized(String),

    /// A login or registration is in flight; cart operations must wait.
    #[error("Not ready: authentication in progress")]
    NotReady,

    /// Input failed local validation before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    /// Whether re-issuing the same action may succeed.
    ///
    /// Retries are always user-initiated; nothing here retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(e) => Self::NetworkFailure(e.to_string()),
            ApiError::RateLimited(secs) => {
                Self::NetworkFailure(format!("rate limited, retry after {secs} seconds"))
            }
            ApiError::Status { status, message } if status.is_server_error() => {
                Self::NetworkFailure(format!("HTTP {status}: {message}"))
            }
            ApiError::Status { message, .. } | ApiError::Rejected(message) => {
                Self::Rejected(message)
            }
            ApiError::Parse(e) => Self::Rejected(format!("unexpected response from server: {e}")),
            ApiError::InvalidBaseUrl(url) => Self::InvalidInput(format!("invalid API URL {url}")),
            ApiError::NotFound(what) => Self::Rejected(format!("Not found: {what}")),
            ApiError::Deauthorized(message) => Self::Deauthorized(message),
        }
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;
