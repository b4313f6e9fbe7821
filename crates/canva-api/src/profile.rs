//! Current-user profile lookup

use reqwest::Method;
use serde_json::Value;

use crate::client::{CanvaClient, decode_json};
use crate::error::{Error, Result};

impl CanvaClient {
    /// `GET /users/me/profile`, returning the `profile` object untouched.
    ///
    /// A body without a `profile` object is an error whatever the status.
    pub async fn profile(&self, token: &str) -> Result<Value> {
        let url = self.endpoint(&["users", "me", "profile"]);
        let response = self
            .request(Method::GET, url, token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("profile request failed: {e}")))?;

        let mut body: Value = decode_json(response).await?;
        match body.get_mut("profile").map(Value::take) {
            Some(profile @ Value::Object(_)) => Ok(profile),
            _ => Err(Error::Decode("response has no profile object".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn returns_profile_object_verbatim() {
        let provider = MockProvider::start().await;
        provider.respond(
            "GET /users/me/profile",
            StatusCode::OK,
            serde_json::json!({"profile": {"display_name": "Ada", "extra": [1, 2]}}),
        );

        let profile = provider.client().profile("at_1").await.unwrap();
        assert_eq!(profile, serde_json::json!({"display_name": "Ada", "extra": [1, 2]}));
        assert_eq!(provider.last_authorization().as_deref(), Some("Bearer at_1"));
    }

    #[tokio::test]
    async fn missing_profile_is_error() {
        let provider = MockProvider::start().await;
        provider.respond("GET /users/me/profile", StatusCode::OK, serde_json::json!({"team": {}}));

        let err = provider.client().profile("at_1").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn invalid_token_is_reported() {
        let provider = MockProvider::start().await;
        provider.respond(
            "GET /users/me/profile",
            StatusCode::UNAUTHORIZED,
            serde_json::json!({"code": "invalid_access_token", "message": "Access token expired"}),
        );

        let err = provider.client().profile("at_old").await.unwrap_err();
        assert!(matches!(err, Error::InvalidAccessToken(ref m) if m == "Access token expired"));
    }
}
