//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The relay keeps no server-side flow state. The verifier and the `state`
//! nonce travel to the browser inside a signed cookie and come back with the
//! provider redirect. This module owns the values and the cookie payload;
//! signing is done by the HTTP layer's cookie jar.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use reqwest::Url;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::constants::RANDOM_BYTES;
use crate::error::{Error, Result};
use crate::settings::OAuthSettings;

/// Values produced when a browser starts the flow.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

/// Start a new flow: fresh verifier, its S256 challenge, and a CSRF state.
pub fn begin_challenge() -> PkceChallenge {
    let code_verifier = random_token();
    let code_challenge = compute_challenge(&code_verifier);
    PkceChallenge {
        code_verifier,
        code_challenge,
        state: random_token(),
    }
}

/// 96 random bytes as URL-safe base64 without padding (128 chars).
fn random_token() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the provider authorization URL for a challenge.
pub fn build_authorization_url(settings: &OAuthSettings, challenge: &PkceChallenge) -> Result<Url> {
    let scope = settings.scope_string();
    Url::parse_with_params(
        &settings.authorize_url,
        &[
            ("code_challenge", challenge.code_challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("scope", scope.as_str()),
            ("response_type", "code"),
            ("client_id", settings.client_id.as_str()),
            ("state", challenge.state.as_str()),
            ("redirect_uri", settings.redirect_uri.as_str()),
        ],
    )
    .map_err(|e| Error::Http(format!("invalid authorize url {}: {e}", settings.authorize_url)))
}

/// Payload of the verifier cookie: `<issued_at>.<state>.<verifier>`.
///
/// Base64url never contains `.`, so the separator is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierCookie {
    pub issued_at: u64,
    pub state: String,
    pub code_verifier: String,
}

impl VerifierCookie {
    pub fn new(challenge: &PkceChallenge, issued_at: u64) -> Self {
        Self {
            issued_at,
            state: challenge.state.clone(),
            code_verifier: challenge.code_verifier.clone(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}.{}.{}", self.issued_at, self.state, self.code_verifier)
    }

    /// Parse a cookie value and reject it once it is older than `ttl_secs`.
    ///
    /// Browsers drop the cookie after Max-Age, but the timestamp is inside
    /// the signed value so a replayed cookie is rejected here as well.
    pub fn decode(value: &str, now: u64, ttl_secs: u64) -> Result<Self> {
        let mut parts = value.splitn(3, '.');
        let (Some(issued), Some(state), Some(verifier)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::MalformedVerifier("expected three segments".into()));
        };
        let issued_at: u64 = issued
            .parse()
            .map_err(|_| Error::MalformedVerifier(format!("bad timestamp {issued:?}")))?;
        if state.is_empty() || verifier.is_empty() {
            return Err(Error::MalformedVerifier("empty state or verifier".into()));
        }

        let age_secs = now.saturating_sub(issued_at);
        if age_secs > ttl_secs {
            return Err(Error::ExpiredVerifier { age_secs });
        }

        Ok(Self {
            issued_at,
            state: state.to_string(),
            code_verifier: verifier.to_string(),
        })
    }

    /// Compare the state echoed by the provider with the one we issued.
    pub fn verify_state(&self, returned: &str) -> Result<()> {
        if bool::from(self.state.as_bytes().ct_eq(returned.as_bytes())) {
            Ok(())
        } else {
            Err(Error::StateMismatch)
        }
    }
}

/// Recover the code verifier on the callback side.
///
/// `cookie` is the already signature-checked cookie value; a missing or
/// forged cookie arrives here as `None`.
pub fn retrieve_verifier(
    cookie: Option<&str>,
    returned_state: &str,
    now: u64,
    ttl_secs: u64,
) -> Result<String> {
    let value = cookie.ok_or(Error::MissingVerifier)?;
    let cookie = VerifierCookie::decode(value, now, ttl_secs)?;
    cookie.verify_state(returned_state)?;
    Ok(cookie.code_verifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VERIFIER_TTL_SECS;
    use common::Secret;
    use std::collections::HashSet;

    fn settings() -> OAuthSettings {
        OAuthSettings::new(
            "OC-client",
            Secret::new("shh".to_string()),
            "http://127.0.0.1:3001/oauth/redirect",
        )
    }

    #[test]
    fn verifier_is_url_safe_base64() {
        let challenge = begin_challenge();
        // 96 bytes -> exactly 128 base64url chars, no padding
        assert_eq!(challenge.code_verifier.len(), 128);
        assert_eq!(challenge.state.len(), 128);
        assert!(
            challenge
                .code_verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "verifier must be URL-safe base64: {}",
            challenge.code_verifier
        );
    }

    #[test]
    fn challenge_is_sha256_of_verifier() {
        for _ in 0..16 {
            let challenge = begin_challenge();
            let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(challenge.code_verifier.as_bytes()));
            assert_eq!(challenge.code_challenge, expected);
        }
    }

    #[test]
    fn challenge_matches_known_value() {
        // SHA256("hello") in base64url
        assert_eq!(
            compute_challenge("hello"),
            "LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ"
        );
    }

    #[test]
    fn verifiers_do_not_collide() {
        let verifiers: HashSet<String> = (0..1000).map(|_| begin_challenge().code_verifier).collect();
        assert_eq!(verifiers.len(), 1000);
    }

    #[test]
    fn state_is_independent_of_verifier() {
        let challenge = begin_challenge();
        assert_ne!(challenge.state, challenge.code_verifier);
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let challenge = begin_challenge();
        let url = build_authorization_url(&settings(), &challenge).unwrap();

        assert!(url.as_str().starts_with("https://www.canva.com/api/oauth/authorize?"));
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["code_challenge"], challenge.code_challenge);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "OC-client");
        assert_eq!(params["state"], challenge.state);
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:3001/oauth/redirect");
        assert!(params["scope"].split(' ').any(|s| s == "folder:read"));
    }

    #[test]
    fn cookie_roundtrip_within_ttl() {
        let challenge = begin_challenge();
        let cookie = VerifierCookie::new(&challenge, 1_700_000_000);
        let decoded =
            VerifierCookie::decode(&cookie.encode(), 1_700_000_000 + 60, VERIFIER_TTL_SECS).unwrap();
        assert_eq!(decoded, cookie);
    }

    #[test]
    fn cookie_rejected_after_ttl() {
        let challenge = begin_challenge();
        let value = VerifierCookie::new(&challenge, 1_000).encode();
        let err = VerifierCookie::decode(&value, 1_000 + VERIFIER_TTL_SECS + 1, VERIFIER_TTL_SECS)
            .unwrap_err();
        assert!(matches!(err, Error::ExpiredVerifier { age_secs } if age_secs == VERIFIER_TTL_SECS + 1));
    }

    #[test]
    fn malformed_cookie_rejected() {
        for value in ["", "123", "abc.state.verifier", "123..verifier", "123.state."] {
            let err = VerifierCookie::decode(value, 123, VERIFIER_TTL_SECS).unwrap_err();
            assert!(matches!(err, Error::MalformedVerifier(_)), "{value:?} gave {err:?}");
        }
    }

    #[test]
    fn retrieve_requires_cookie_and_matching_state() {
        let challenge = begin_challenge();
        let value = VerifierCookie::new(&challenge, 10).encode();

        assert!(matches!(
            retrieve_verifier(None, &challenge.state, 10, VERIFIER_TTL_SECS),
            Err(Error::MissingVerifier)
        ));
        assert!(matches!(
            retrieve_verifier(Some(&value), "forged-state", 10, VERIFIER_TTL_SECS),
            Err(Error::StateMismatch)
        ));
        let verifier = retrieve_verifier(Some(&value), &challenge.state, 10, VERIFIER_TTL_SECS).unwrap();
        assert_eq!(verifier, challenge.code_verifier);
    }
}
