//! Error types for the upload subsystem.
//!
//! All operations return [`Result<T>`] which uses [`UploadError`] as the
//! error type. Authentication failures carry their own cloneable
//! [`AuthError`] because they flow through a shared in-flight future in
//! the token cache.

use thiserror::Error;

/// Discriminant for authentication failures.
///
/// Decoded once at the provider boundary; callers match on the code rather
/// than probing error message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    /// The provider requires user interaction (expired session, MFA).
    InteractionRequired,
    /// The user has not consented to one or more requested scopes.
    ConsentRequired,
    /// An interactive window could not be opened.
    PopupBlocked,
    /// More than one signed-in account matched; the provider cannot pick.
    AccountAmbiguous,
    /// The acquired token is addressed to a different audience.
    WrongAudience,
    /// The acquired token is missing one or more required scopes.
    MissingScopes,
    /// Anything that no fallback can recover from.
    Fatal,
}

impl AuthErrorCode {
    /// Whether the interactive (secondary) provider may recover this failure.
    pub fn needs_interactive(self) -> bool {
        matches!(
            self,
            AuthErrorCode::InteractionRequired
                | AuthErrorCode::ConsentRequired
                | AuthErrorCode::PopupBlocked
                | AuthErrorCode::AccountAmbiguous
        )
    }
}

/// An authentication failure from a token provider or the cache itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("authentication failed ({code:?}): {message}")]
pub struct AuthError {
    /// Failure classification.
    pub code: AuthErrorCode,
    /// Provider-supplied detail, for logs and the run-level summary.
    pub message: String,
}

impl AuthError {
    /// Build an error from a code and a message.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A non-recoverable failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Fatal, message)
    }
}

/// Errors that can occur while uploading a batch of items.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Credential acquisition or validation failed. Not retried.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The batched identifier translation call failed as a whole.
    /// Not retried; aborts the run.
    #[error("identifier translation failed: {0}")]
    Translation(String),

    /// The upstream returned a rate-limit response (HTTP 429).
    #[error("rate limited{}", .retry_after_ms.map(|ms| format!(": retry after {ms}ms")).unwrap_or_default())]
    RateLimited {
        /// Server-suggested wait before retrying, if it sent one.
        retry_after_ms: Option<u64>,
    },

    /// A server-side failure (HTTP 5xx). Retried with a short delay.
    #[error("server error (HTTP {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// A client-side request failure (HTTP 4xx other than 401/403/429).
    /// Not retried.
    #[error("request rejected (HTTP {status}): {message}")]
    Request {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// The upstream returned a response that could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// An HTTP-level error from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The aggregate run-level error: one or more items failed to upload.
    /// Per-item detail remains queryable in the status registry.
    #[error("failed to upload {failed} documents")]
    BatchFailed {
        /// Number of selected items whose submission settled in error.
        failed: usize,
    },
}

/// A convenience type alias for upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;
