//! OAuth client settings for one deployment

use common::Secret;

use crate::constants::{API_BASE_URL, AUTHORIZE_ENDPOINT, SCOPES, TOKEN_PATH};

/// Everything the flow needs to talk to the provider on behalf of this
/// integration. Built once from the relay config.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub authorize_url: String,
    pub token_url: String,
    /// Must match the URI registered for the active deployment profile. Sent
    /// on both the authorize and token requests.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthSettings {
    /// Settings pointing at the public Canva endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            authorize_url: AUTHORIZE_ENDPOINT.to_string(),
            token_url: format!("{API_BASE_URL}{TOKEN_PATH}"),
            redirect_uri: redirect_uri.into(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Space-separated scope list as sent in the authorize URL.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}
