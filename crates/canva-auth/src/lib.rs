//! Canva Connect OAuth support
//!
//! PKCE generation, the verifier cookie payload, authorization code exchange,
//! subject claim extraction and the per-user credential store. No HTTP
//! server types live here; the relay binary wires these into routes.
//!
//! Flow:
//! 1. `pkce::begin_challenge()` + `pkce::build_authorization_url()`
//! 2. `pkce::VerifierCookie` carries verifier and state through the browser
//! 3. `pkce::retrieve_verifier()` on the callback checks age and state
//! 4. `token::exchange_code()` trades the code for an access token
//! 5. `claims::subject_unverified()` names the user
//! 6. `credentials::CredentialStore::set_token()` persists it

pub mod claims;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod pkce;
pub mod settings;
pub mod token;

pub use claims::subject_unverified;
pub use constants::*;
pub use credentials::{CredentialStore, UserCredential};
pub use error::{Error, Result};
pub use pkce::{
    PkceChallenge, VerifierCookie, begin_challenge, build_authorization_url, compute_challenge,
    retrieve_verifier,
};
pub use settings::OAuthSettings;
pub use token::{TokenResponse, exchange_code};

/// Seconds since the unix epoch, for cookie timestamps.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
