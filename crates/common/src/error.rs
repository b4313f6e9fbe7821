//! Startup and configuration errors

use thiserror::Error;

/// Errors raised while resolving configuration at startup.
///
/// All of these are fatal: the relay refuses to start rather than run with a
/// half-resolved configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown deployment profile {0:?} (expected \"development\" or \"production\")")]
    UnknownProfile(String),

    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
