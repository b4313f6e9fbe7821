//! Subject claim extraction
//!
//! Trust boundary: the access token is decoded, NOT verified. This is only
//! sound because the token was received directly from the provider's token
//! endpoint over an authenticated TLS call made by this process. Any caller
//! that obtains a token from somewhere else (a header, a cookie, a client
//! payload) must verify the signature before trusting its claims.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
}

/// Read the `sub` claim from a JWT access token without checking its
/// signature. See the module docs for when this is acceptable.
pub fn subject_unverified(access_token: &str) -> Result<String> {
    let mut segments = access_token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature)) => payload,
        _ => return Err(Error::InvalidToken("not a three-segment JWT".into())),
    };

    // Some issuers pad their segments even though JWS forbids it.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::InvalidToken(format!("payload is not base64url: {e}")))?;
    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::InvalidToken(format!("payload is not JSON claims: {e}")))?;

    match claims.sub {
        Some(sub) if !sub.is_empty() => Ok(sub),
        _ => Err(Error::InvalidToken("missing sub claim".into())),
    }
}

#[cfg(test)]
pub(crate) fn fake_jwt(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_subject() {
        let token = fake_jwt(&serde_json::json!({"sub": "oUnPjZ2k2-user", "aud": "canva"}));
        assert_eq!(subject_unverified(&token).unwrap(), "oUnPjZ2k2-user");
    }

    #[test]
    fn signature_is_not_checked() {
        let token = fake_jwt(&serde_json::json!({"sub": "user-1"}));
        let (unsigned, _) = token.rsplit_once('.').unwrap();
        let tampered = format!("{unsigned}.AAAA");
        assert_eq!(subject_unverified(&tampered).unwrap(), "user-1");
    }

    #[test]
    fn rejects_missing_or_empty_subject() {
        let no_sub = fake_jwt(&serde_json::json!({"aud": "canva"}));
        assert!(matches!(subject_unverified(&no_sub), Err(Error::InvalidToken(_))));

        let empty_sub = fake_jwt(&serde_json::json!({"sub": ""}));
        assert!(matches!(subject_unverified(&empty_sub), Err(Error::InvalidToken(_))));
    }

    #[test]
    fn rejects_non_jwt_tokens() {
        for token in ["opaque-token", "a.b", "a.!!!.c", "a.bm90IGpzb24.c"] {
            assert!(
                matches!(subject_unverified(token), Err(Error::InvalidToken(_))),
                "{token} should be rejected"
            );
        }
    }
}
