//! Deployment profiles
//!
//! The profile decides the frontend origin, the registered OAuth redirect URI
//! and how strict the session cookies are. It is resolved once at startup;
//! an unrecognized name is a startup error rather than a silent fallback.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentProfile {
    #[default]
    Development,
    Production,
}

impl DeploymentProfile {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Browser origin allowed to call the relay with credentials.
    pub fn default_frontend_origin(self) -> &'static str {
        match self {
            Self::Development => "http://127.0.0.1:3000",
            Self::Production => "https://canva-hacaton-frontend-2ad65e9dc464.herokuapp.com",
        }
    }

    /// Redirect URI registered with the provider for this deployment.
    pub fn default_redirect_uri(self) -> &'static str {
        match self {
            Self::Development => "http://127.0.0.1:3001/oauth/redirect",
            Self::Production => {
                "https://canva-hackathon-backend-33cb89cc3ea5.herokuapp.com/oauth/redirect"
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl FromStr for DeploymentProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(Error::UnknownProfile(s.to_string())),
        }
    }
}

impl fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
