//! Authorization code flow endpoints
//!
//! `/authorize` issues a PKCE challenge and parks the verifier in the signed
//! `ocv` cookie. `/oauth/redirect` takes it back, exchanges the code, names
//! the user from the token's subject claim, stores the token and hands the
//! browser a signed `aut` identity cookie.

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use canva_auth::{
    SESSION_COOKIE, VERIFIER_COOKIE, VERIFIER_TTL_SECS, VerifierCookie, begin_challenge,
    build_authorization_url, exchange_code, retrieve_verifier, subject_unverified, unix_now,
};
use common::DeploymentProfile;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::app::AppState;
use crate::error::{Error, Result};
use crate::metrics;

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// 302 Found carrying the jar's cookies. `Redirect` only offers 303/307/308.
fn found(jar: SignedCookieJar, location: &str) -> Response {
    (
        StatusCode::FOUND,
        jar,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

fn verifier_cookie(value: String, profile: DeploymentProfile) -> Cookie<'static> {
    Cookie::build((VERIFIER_COOKIE, value))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(VERIFIER_TTL_SECS as i64))
        .secure(profile.is_production())
        .build()
}

/// Session cookie naming the user. No max-age: it lives as long as the
/// browser session.
fn session_cookie(identity: String, profile: DeploymentProfile) -> Cookie<'static> {
    let same_site = if profile.is_production() {
        SameSite::Strict
    } else {
        SameSite::Lax
    };
    Cookie::build((SESSION_COOKIE, identity))
        .http_only(true)
        .path("/")
        .same_site(same_site)
        .secure(profile.is_production())
        .build()
}

/// `GET /authorize`: start the flow.
#[instrument(skip_all)]
pub async fn authorize(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Response> {
    let challenge = begin_challenge();
    let url = build_authorization_url(&state.oauth, &challenge)?;
    let cookie = VerifierCookie::new(&challenge, unix_now()).encode();

    info!("issued PKCE challenge, redirecting to provider");
    Ok(found(
        jar.add(verifier_cookie(cookie, state.profile)),
        url.as_str(),
    ))
}

/// `GET /oauth/redirect`: finish the flow.
#[instrument(skip_all)]
pub async fn oauth_redirect(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    match complete_exchange(&state, jar, params).await {
        Ok(response) => {
            metrics::record_oauth_exchange("success");
            Ok(response)
        }
        Err(e) => {
            warn!(error = %e, status = e.status().as_u16(), "oauth callback failed");
            metrics::record_oauth_exchange(e.outcome());
            Err(e)
        }
    }
}

async fn complete_exchange(
    state: &AppState,
    jar: SignedCookieJar,
    params: CallbackParams,
) -> Result<Response> {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        return Err(Error::BadRequest(format!(
            "authorization denied: {error} {description}"
        )
        .trim_end()
        .to_string()));
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::BadRequest("Missing required query parameter: code".into()))?;
    let returned_state = params.state.unwrap_or_default();

    let cookie = jar.get(VERIFIER_COOKIE);
    let verifier = retrieve_verifier(
        cookie.as_ref().map(|c| c.value()),
        &returned_state,
        unix_now(),
        VERIFIER_TTL_SECS,
    )?;

    let token = exchange_code(&state.http, &state.oauth, &code, &verifier).await?;
    let identity = subject_unverified(&token.access_token)?;

    // Persist before handing out the session cookie.
    state.store.set_token(&identity, token.access_token).await?;
    info!(identity, "stored access token");

    let jar = jar
        .add(session_cookie(identity, state.profile))
        .remove(Cookie::build(VERIFIER_COOKIE).path("/"));
    Ok(found(jar, "/success"))
}

/// `GET /success`: landing page after a completed flow.
pub async fn success() -> Html<&'static str> {
    Html("<p>Success</p>")
}
