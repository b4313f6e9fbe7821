//! Error types for the OAuth exchange and credential store

/// Errors from the PKCE flow, token exchange and credential persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Non-2xx answer from the token endpoint.
    #[error("HTTP Error! status: {status}")]
    TokenEndpoint { status: u16, body: String },

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("access token has no usable subject claim: {0}")]
    InvalidToken(String),

    #[error("PKCE verifier cookie missing or signature invalid")]
    MissingVerifier,

    #[error("PKCE verifier cookie malformed: {0}")]
    MalformedVerifier(String),

    #[error("PKCE verifier cookie expired ({age_secs}s old)")]
    ExpiredVerifier { age_secs: u64 },

    #[error("OAuth state does not match the value issued with the verifier")]
    StateMismatch,

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the error comes from the browser side of the flow (bad or stale
    /// cookie, forged state) rather than from the provider.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingVerifier
                | Self::MalformedVerifier(_)
                | Self::ExpiredVerifier { .. }
                | Self::StateMismatch
        )
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_endpoint_error_reports_status() {
        let err = Error::TokenEndpoint {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "HTTP Error! status: 500");
        assert!(!err.is_client_error());
    }

    #[test]
    fn cookie_errors_are_client_errors() {
        assert!(Error::MissingVerifier.is_client_error());
        assert!(Error::StateMismatch.is_client_error());
        assert!(Error::ExpiredVerifier { age_secs: 1300 }.is_client_error());
        assert!(!Error::Http("reset".into()).is_client_error());
    }
}
