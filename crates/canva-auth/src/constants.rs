//! Canva Connect OAuth constants
//!
//! Endpoints and scopes for the public Canva Connect integration. The client
//! id and secret are deployment configuration and live in the relay config.

/// Authorization endpoint the browser is redirected to.
pub const AUTHORIZE_ENDPOINT: &str = "https://www.canva.com/api/oauth/authorize";

/// Base URL of the Connect REST API. The token endpoint hangs off it.
pub const API_BASE_URL: &str = "https://api.canva.com/rest/v1";

/// Path of the token endpoint relative to [`API_BASE_URL`].
pub const TOKEN_PATH: &str = "/oauth/token";

/// Capabilities requested on every authorization.
pub const SCOPES: &[&str] = &[
    "asset:read",
    "asset:write",
    "brandtemplate:content:read",
    "brandtemplate:meta:read",
    "design:content:read",
    "design:content:write",
    "design:meta:read",
    "folder:read",
    "folder:write",
    "profile:read",
];

/// Cookie carrying the PKCE verifier and state across the provider redirect.
pub const VERIFIER_COOKIE: &str = "ocv";

/// Cookie binding a browser session to a stored credential.
pub const SESSION_COOKIE: &str = "aut";

/// Lifetime of the verifier cookie.
pub const VERIFIER_TTL_SECS: u64 = 20 * 60;

/// Random bytes behind each verifier and state value.
pub const RANDOM_BYTES: usize = 96;
