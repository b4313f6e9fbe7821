//! Authorization code exchange
//!
//! Server-to-server POST to the token endpoint, authenticated with HTTP Basic
//! built from the client id and secret. Refresh and revocation are not used
//! by the relay.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::OAuthSettings;

/// Successful token endpoint response.
///
/// Only `access_token` is required; Canva also returns a refresh token and
/// lifetime which the relay keeps for logging but does not act on.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Exchange an authorization code plus PKCE verifier for an access token.
pub async fn exchange_code(
    client: &reqwest::Client,
    settings: &OAuthSettings,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&settings.token_url)
        .basic_auth(&settings.client_id, Some(settings.client_secret.expose()))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", settings.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;
    debug!(
        expires_in = token.expires_in,
        scope = token.scope.as_deref().unwrap_or(""),
        "token endpoint issued access token"
    );
    Ok(token)
}
