//! Types shared by the Canva relay crates

mod error;
mod profile;
mod secret;

pub use error::{Error, Result};
pub use profile::DeploymentProfile;
pub use secret::Secret;
