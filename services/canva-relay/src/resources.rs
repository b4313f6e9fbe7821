//! Authenticated resource endpoints
//!
//! Each handler resolves the caller from the signed `aut` cookie to a stored
//! access token before touching the provider. Response shapes follow what
//! the frontend expects: `/user` answers 400 with an empty body on any
//! failure, `/folder` a JSON `{error}`, `/upload` plain text.

use axum::Json;
use axum::extract::{FromRequestParts, Multipart, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::SignedCookieJar;
use canva_api::{ROOT_FOLDER, upload_and_wait};
use canva_auth::SESSION_COOKIE;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::app::AppState;
use crate::error::Error;

/// Identity from the `aut` cookie plus its stored access token.
pub struct Authenticated {
    pub identity: String,
    pub token: String,
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let identity = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|identity| !identity.is_empty())
            .ok_or(Error::Unauthenticated)?;

        match state.store.get_token(&identity).await {
            Some(token) => Ok(Self { identity, token }),
            None => {
                debug!(identity, "no stored token for identity");
                Err(Error::Unauthenticated)
            }
        }
    }
}

/// `GET /user`: the caller's Canva profile.
#[instrument(skip_all, fields(identity = %auth.identity))]
pub async fn user(State(state): State<AppState>, auth: Authenticated) -> Response {
    match state.api.profile(&auth.token).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => {
            warn!(error = %e, "profile lookup failed");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FolderParams {
    #[serde(rename = "folderId")]
    folder_id: Option<String>,
}

/// `GET /folder?folderId=`: assets and sub-folders of one folder.
#[instrument(skip_all, fields(identity = %auth.identity))]
pub async fn folder(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(params): Query<FolderParams>,
) -> Response {
    let folder_id = params
        .folder_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| ROOT_FOLDER.to_string());

    match state.api.list_folder(&auth.token, &folder_id).await {
        Ok(listing) => {
            debug!(
                folder_id,
                assets = listing.assets.len(),
                folders = listing.folders.len(),
                "listed folder"
            );
            Json(listing).into_response()
        }
        Err(e) => {
            warn!(folder_id, error = %e, "folder listing failed");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    name: Option<String>,
}

/// Multipart field carrying the file.
const IMAGE_FIELD: &str = "image";

/// `POST /upload?name=`: push the `image` field to Canva and wait for the
/// upload job to finish.
#[instrument(skip_all, fields(identity = %auth.identity))]
pub async fn upload(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> Response {
    let Some(name) = params.name.filter(|n| !n.trim().is_empty()) else {
        return bad_request("Missing required query parameter: name".to_string());
    };

    let bytes = match image_field(multipart).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            return bad_request(format!("Missing required multipart field: {IMAGE_FIELD}"));
        }
        Err(message) => return bad_request(message),
    };

    match upload_and_wait(
        &state.api,
        &auth.token,
        &name,
        bytes,
        &state.poll_policy,
        &state.shutdown,
    )
    .await
    {
        Ok(outcome) => {
            info!(
                job_id = %outcome.job.id,
                polls = outcome.polls,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "asset uploaded"
            );
            (StatusCode::OK, "Asset uploaded successfully").into_response()
        }
        Err(e) => {
            warn!(error = %e, "asset upload failed");
            bad_request(e.to_string())
        }
    }
}

async fn image_field(mut multipart: Multipart) -> Result<Option<Vec<u8>>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field.bytes().await.map_err(|e| e.body_text())?;
            return Ok(Some(bytes.to_vec()));
        }
    }
    Ok(None)
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use canva_api::testing::MockProvider;
    use serde_json::json;
    use tower::ServiceExt;

    const BOUNDARY: &str = "relay-test-boundary";

    fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"logo.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, cookie: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    /// Router plus an `aut` cookie for a user with a stored token.
    async fn signed_in(provider: &MockProvider) -> (tempfile::TempDir, axum::Router, String) {
        let (dir, store) = temp_store().await;
        store.set_token("user-7", "at_user7".into()).await.unwrap();
        let app_state = state(provider, store);
        let cookie = signed_cookie(&app_state.cookie_key, SESSION_COOKIE, "user-7");
        (dir, router(app_state), cookie)
    }

    #[tokio::test]
    async fn resources_require_session_cookie() {
        let provider = MockProvider::start().await;
        let (_dir, app, _cookie) = signed_in(&provider).await;

        for uri in ["/user", "/folder"] {
            let response = app.clone().oneshot(browser_get(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body_json(response).await, json!({"error": "not authenticated"}));
        }

        let response = app
            .oneshot(upload_request("/upload?name=a", None, multipart_body("image", b"x")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(provider.hits("GET /users/me/profile"), 0);
        assert_eq!(provider.hits("GET /folders/root/items"), 0);
        assert_eq!(provider.hits("POST /asset-uploads"), 0);
    }

    #[tokio::test]
    async fn unknown_identity_and_forged_cookie_are_unauthenticated() {
        let provider = MockProvider::start().await;
        let (_dir, store) = temp_store().await;
        let app_state = state(&provider, store);
        let stranger = signed_cookie(&app_state.cookie_key, SESSION_COOKIE, "nobody");
        let app = router(app_state);

        let response = app
            .clone()
            .oneshot(browser_get("/user", Some(&stranger)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let forged = format!("{SESSION_COOKIE}=user-7");
        let response = app.oneshot(browser_get("/user", Some(&forged))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(provider.hits("GET /users/me/profile"), 0);
    }

    #[tokio::test]
    async fn user_returns_profile_with_stored_token() {
        let provider = MockProvider::start().await;
        provider.respond(
            "GET /users/me/profile",
            StatusCode::OK,
            json!({"profile": {"display_name": "Ada"}}),
        );
        let (_dir, app, cookie) = signed_in(&provider).await;

        let response = app.oneshot(browser_get("/user", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"display_name": "Ada"}));
        assert_eq!(provider.last_authorization().as_deref(), Some("Bearer at_user7"));
    }

    #[tokio::test]
    async fn user_provider_error_is_empty_400() {
        let provider = MockProvider::start().await;
        provider.respond(
            "GET /users/me/profile",
            StatusCode::UNAUTHORIZED,
            json!({"code": "invalid_access_token", "message": "Access token is invalid"}),
        );
        let (_dir, app, cookie) = signed_in(&provider).await;

        let response = app.oneshot(browser_get("/user", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn folder_projects_items_and_defaults_to_root() {
        let provider = MockProvider::start().await;
        provider.respond(
            "GET /folders/root/items",
            StatusCode::OK,
            json!({"items": [
                {"type": "asset", "asset": {"id": "A1", "name": "one", "thumbnail": {"url": "https://t/1"}}},
                {"type": "asset", "asset": {"id": "A2", "name": "two"}},
                {"type": "folder", "folder": {"id": "F1", "name": "sub", "thumbnail": {"url": "x"}}},
                {"type": "design", "design": {"id": "D1"}}
            ]}),
        );
        let (_dir, app, cookie) = signed_in(&provider).await;

        let response = app.oneshot(browser_get("/folder", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "assets": [
                    {"id": "A1", "name": "one", "url": "https://t/1"},
                    {"id": "A2", "name": "two", "url": null}
                ],
                "folders": [{"id": "F1", "name": "sub"}]
            })
        );
    }

    #[tokio::test]
    async fn folder_uses_folder_id_and_reports_provider_error() {
        let provider = MockProvider::start().await;
        provider.respond(
            "GET /folders/FAB12/items",
            StatusCode::UNAUTHORIZED,
            json!({"code": "invalid_access_token", "message": "Access token is invalid"}),
        );
        let (_dir, app, cookie) = signed_in(&provider).await;

        let response = app
            .oneshot(browser_get("/folder?folderId=FAB12", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Access token is invalid"}));
        assert_eq!(provider.hits("GET /folders/FAB12/items"), 1);
    }

    #[tokio::test]
    async fn upload_polls_until_success() {
        let provider = MockProvider::start().await;
        provider.respond(
            "POST /asset-uploads",
            StatusCode::OK,
            json!({"job": {"id": "J1", "status": "in_progress"}}),
        );
        provider.respond(
            "GET /asset-uploads/J1",
            StatusCode::OK,
            json!({"job": {"id": "J1", "status": "in_progress"}}),
        );
        provider.respond(
            "GET /asset-uploads/J1",
            StatusCode::OK,
            json!({"job": {"id": "J1", "status": "success", "asset": {"id": "A9"}}}),
        );
        let (_dir, app, cookie) = signed_in(&provider).await;

        let response = app
            .oneshot(upload_request(
                "/upload?name=logo",
                Some(&cookie),
                multipart_body("image", b"\x89PNG bytes"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Asset uploaded successfully");
        assert_eq!(provider.hits("POST /asset-uploads"), 1);
        assert_eq!(provider.hits("GET /asset-uploads/J1"), 2);
    }

    #[tokio::test]
    async fn upload_failure_reports_provider_message() {
        let provider = MockProvider::start().await;
        provider.respond(
            "POST /asset-uploads",
            StatusCode::OK,
            json!({"job": {"id": "J2", "status": "in_progress"}}),
        );
        provider.respond(
            "GET /asset-uploads/J2",
            StatusCode::OK,
            json!({"job": {"id": "J2", "status": "failed",
                   "error": {"code": "file_too_big", "message": "bad format"}}}),
        );
        let (_dir, app, cookie) = signed_in(&provider).await;

        let response = app
            .oneshot(upload_request(
                "/upload?name=logo",
                Some(&cookie),
                multipart_body("image", b"bytes"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "bad format");
    }

    #[tokio::test]
    async fn upload_sends_raw_bytes_and_name_metadata() {
        let provider = MockProvider::start().await;
        provider.respond(
            "POST /asset-uploads",
            StatusCode::OK,
            json!({"job": {"id": "J3", "status": "success"}}),
        );
        let (_dir, app, cookie) = signed_in(&provider).await;

        let response = app
            .oneshot(upload_request(
                "/upload?name=My%20Logo",
                Some(&cookie),
                multipart_body("image", b"raw-image-bytes"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(provider.last_body(), b"raw-image-bytes");
        let metadata: serde_json::Value =
            serde_json::from_str(&provider.last_header("asset-upload-metadata").unwrap()).unwrap();
        // "My Logo" in standard base64
        assert_eq!(metadata["name_base64"], "TXkgTG9nbw==");
        assert_eq!(provider.hits("GET /asset-uploads/J3"), 0);
    }

    #[tokio::test]
    async fn upload_validates_name_and_field() {
        let provider = MockProvider::start().await;
        let (_dir, app, cookie) = signed_in(&provider).await;

        let response = app
            .clone()
            .oneshot(upload_request("/upload", Some(&cookie), multipart_body("image", b"x")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Missing required query parameter: name");

        let response = app
            .oneshot(upload_request(
                "/upload?name=logo",
                Some(&cookie),
                multipart_body("file", b"x"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Missing required multipart field: image");
        assert_eq!(provider.hits("POST /asset-uploads"), 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_upload_polling() {
        let provider = MockProvider::start().await;
        provider.respond(
            "POST /asset-uploads",
            StatusCode::OK,
            json!({"job": {"id": "J4", "status": "in_progress"}}),
        );
        let (_dir, store) = temp_store().await;
        store.set_token("user-7", "at_user7".into()).await.unwrap();
        let app_state = state(&provider, store);
        let cookie = signed_cookie(&app_state.cookie_key, SESSION_COOKIE, "user-7");
        app_state.shutdown.cancel();

        let response = router(app_state)
            .oneshot(upload_request(
                "/upload?name=logo",
                Some(&cookie),
                multipart_body("image", b"x"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "upload polling cancelled");
    }
}
