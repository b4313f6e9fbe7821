//! Handler error type
//!
//! Every in-flow failure ends up here and is turned into a JSON `{error}`
//! response. Route-specific shapes (empty 400 on `/user`, plain text on
//! `/upload`) are produced by those handlers directly.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No `aut` cookie, bad signature, or no stored token for the identity.
    #[error("not authenticated")]
    Unauthenticated,

    /// Malformed or missing request input.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    OAuth(#[from] canva_auth::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::OAuth(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::OAuth(canva_auth::Error::CredentialParse(_) | canva_auth::Error::Io(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::OAuth(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Label for `relay_oauth_exchanges_total`.
    pub fn outcome(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "rejected",
            StatusCode::BAD_GATEWAY => "provider_error",
            StatusCode::INTERNAL_SERVER_ERROR => "store_error",
            _ => "unauthenticated",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
