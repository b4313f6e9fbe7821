//! Error types for Connect API calls

use serde::Deserialize;

/// Errors from resource calls and upload jobs.
///
/// Display strings are what the relay hands back to the browser, so the
/// provider's own message is used verbatim where there is one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network-level failure (connect, timeout, reset).
    #[error("{0}")]
    Http(String),

    /// The provider rejected the bearer token.
    #[error("{0}")]
    InvalidAccessToken(String),

    /// Any other provider error body.
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("unexpected response from provider: {0}")]
    Decode(String),

    /// Upload job reached the `failed` state.
    #[error("{0}")]
    UploadFailed(String),

    #[error("upload job {job_id} still in progress after {polls} status checks")]
    UploadTimedOut { job_id: String, polls: u32 },

    #[error("upload polling cancelled")]
    Cancelled,
}

/// Error body shape used by every Connect endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Provider code for an expired, revoked or malformed token.
pub const INVALID_ACCESS_TOKEN: &str = "invalid_access_token";

impl Error {
    pub(crate) fn from_api(status: u16, body: ApiErrorBody) -> Self {
        if body.code == INVALID_ACCESS_TOKEN {
            Self::InvalidAccessToken(body.message)
        } else {
            Self::Api {
                status,
                code: body.code,
                message: body.message,
            }
        }
    }
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;
