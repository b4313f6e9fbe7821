//! Configuration types and loading
//!
//! Precedence: env vars > TOML file > defaults. The file is optional. Secrets
//! (client secret, cookie signing key) come from the environment or a
//! secret file and are never read from the TOML directly.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use canva_api::PollPolicy;
use canva_auth::OAuthSettings;
use common::{DeploymentProfile, Secret};
use serde::Deserialize;

/// Config file used when neither `--config` nor `CONFIG_PATH` is given.
const DEFAULT_CONFIG_FILE: &str = "canva-relay.toml";

/// Minimum cookie signing secret length.
const MIN_COOKIE_SECRET_LEN: usize = 32;

/// Fully resolved configuration. Built once at startup.
#[derive(Debug)]
pub struct Config {
    pub profile: DeploymentProfile,
    /// Browser origin allowed by CORS
    pub frontend_origin: String,
    /// Redirect URI registered with the provider for this profile
    pub redirect_uri: String,
    pub server: ServerConfig,
    pub canva: CanvaConfig,
    /// Cookie signing secret (`DATABASE_ENCRYPTION_KEY`)
    pub cookie_secret: Secret<String>,
    pub store: StoreConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug)]
pub struct CanvaConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_poll_initial_ms")]
    pub poll_initial_interval_ms: u64,
    #[serde(default = "default_poll_max_ms")]
    pub poll_max_interval_ms: u64,
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    #[serde(default = "default_poll_deadline_secs")]
    pub poll_deadline_secs: u64,
}

/// On-disk shape. Everything is optional; defaults are applied in
/// [`Config::resolve`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    profile: Option<DeploymentProfile>,
    frontend_origin: Option<String>,
    redirect_uri: Option<String>,
    server: Option<ServerConfig>,
    #[serde(default)]
    canva: FileCanvaConfig,
    store: Option<StoreConfig>,
    upload: Option<UploadConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileCanvaConfig {
    client_id: Option<String>,
    client_secret_file: Option<PathBuf>,
    authorize_url: Option<String>,
    token_url: Option<String>,
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3001))
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_store_path() -> PathBuf {
    PathBuf::from("db.json")
}

fn default_poll_initial_ms() -> u64 {
    1000
}

fn default_poll_max_ms() -> u64 {
    10_000
}

fn default_poll_max_attempts() -> u32 {
    30
}

fn default_poll_deadline_secs() -> u64 {
    120
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_initial_interval_ms: default_poll_initial_ms(),
            poll_max_interval_ms: default_poll_max_ms(),
            poll_max_attempts: default_poll_max_attempts(),
            poll_deadline_secs: default_poll_deadline_secs(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file plus the process environment.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let contents = match path {
            Some(path) => Some(std::fs::read_to_string(path)?),
            None => None,
        };
        Self::resolve(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from file contents and an env lookup.
    pub fn resolve(
        contents: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> common::Result<Self> {
        let file: FileConfig = match contents {
            Some(contents) => toml::from_str(contents)?,
            None => FileConfig::default(),
        };
        let env_value = |key: &str| env(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let profile = match env_value("APP_ENV") {
            Some(name) => name.parse()?,
            None => file.profile.unwrap_or_default(),
        };

        let frontend_origin = env_value("FRONTEND_ORIGIN")
            .or(file.frontend_origin)
            .unwrap_or_else(|| profile.default_frontend_origin().to_string());
        let redirect_uri = env_value("REDIRECT_URI")
            .or(file.redirect_uri)
            .unwrap_or_else(|| profile.default_redirect_uri().to_string());

        let mut server = file.server.unwrap_or_default();
        if let Some(port) = env_value("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| common::Error::Config(format!("PORT must be a port number, got: {port}")))?;
            // Platform-assigned port: listen on every interface
            server.listen_addr = SocketAddr::from(([0, 0, 0, 0], port));
        }
        if server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if server.max_upload_bytes == 0 {
            return Err(common::Error::Config(
                "max_upload_bytes must be greater than 0".into(),
            ));
        }

        let client_id = env_value("CANVA_CLIENT_ID")
            .or(file.canva.client_id)
            .ok_or(common::Error::MissingSecret("CANVA_CLIENT_ID"))?;

        // Client secret: env var takes precedence over file
        let client_secret = match Secret::from_lookup("CANVA_CLIENT_SECRET", &env) {
            Some(secret) => secret,
            None => {
                let path = file
                    .canva
                    .client_secret_file
                    .as_ref()
                    .ok_or(common::Error::MissingSecret("CANVA_CLIENT_SECRET"))?;
                let secret = std::fs::read_to_string(path).map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read client_secret_file {}: {e}",
                        path.display()
                    ))
                })?;
                let secret = secret.trim().to_owned();
                if secret.is_empty() {
                    return Err(common::Error::MissingSecret("CANVA_CLIENT_SECRET"));
                }
                Secret::new(secret)
            }
        };

        let cookie_secret = Secret::from_lookup("DATABASE_ENCRYPTION_KEY", &env)
            .ok_or(common::Error::MissingSecret("DATABASE_ENCRYPTION_KEY"))?;
        if cookie_secret.len() < MIN_COOKIE_SECRET_LEN {
            return Err(common::Error::Config(format!(
                "DATABASE_ENCRYPTION_KEY must be at least {MIN_COOKIE_SECRET_LEN} bytes"
            )));
        }

        let api_base_url = file
            .canva
            .api_base_url
            .unwrap_or_else(|| canva_api::DEFAULT_BASE_URL.to_string());
        // Checked before token_url is derived from it
        require_http_url("api_base_url", &api_base_url)?;
        let token_url = file.canva.token_url.unwrap_or_else(|| {
            format!(
                "{}{}",
                api_base_url.trim_end_matches('/'),
                canva_auth::TOKEN_PATH
            )
        });
        let authorize_url = file
            .canva
            .authorize_url
            .unwrap_or_else(|| canva_auth::AUTHORIZE_ENDPOINT.to_string());
        let timeout_secs = file.canva.timeout_secs.unwrap_or_else(default_timeout_secs);
        if timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        for (name, url) in [
            ("frontend_origin", &frontend_origin),
            ("redirect_uri", &redirect_uri),
            ("authorize_url", &authorize_url),
            ("token_url", &token_url),
        ] {
            require_http_url(name, url)?;
        }

        let store = match env_value("DATABASE_PATH") {
            Some(path) => StoreConfig {
                path: PathBuf::from(path),
            },
            None => file.store.unwrap_or_default(),
        };

        let upload = file.upload.unwrap_or_default();
        if upload.poll_initial_interval_ms == 0
            || upload.poll_max_attempts == 0
            || upload.poll_deadline_secs == 0
        {
            return Err(common::Error::Config(
                "upload poll interval, attempts and deadline must be greater than 0".into(),
            ));
        }

        Ok(Config {
            profile,
            frontend_origin,
            redirect_uri,
            server,
            canva: CanvaConfig {
                client_id,
                client_secret,
                authorize_url,
                token_url,
                api_base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            cookie_secret,
            store,
            upload,
        })
    }

    /// OAuth client settings for the active profile.
    pub fn oauth_settings(&self) -> OAuthSettings {
        let mut settings = OAuthSettings::new(
            self.canva.client_id.clone(),
            self.canva.client_secret.clone(),
            self.redirect_uri.clone(),
        );
        settings.authorize_url = self.canva.authorize_url.clone();
        settings.token_url = self.canva.token_url.clone();
        settings
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.upload.poll_initial_interval_ms),
            max_interval: Duration::from_millis(
                self.upload
                    .poll_max_interval_ms
                    .max(self.upload.poll_initial_interval_ms),
            ),
            multiplier: 2,
            max_polls: self.upload.poll_max_attempts,
            deadline: Duration::from_secs(self.upload.poll_deadline_secs),
        }
    }

    /// Resolve config file path from CLI arg, then CONFIG_PATH, then the
    /// default file if it exists. `None` means run on env and defaults.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

fn require_http_url(name: &str, url: &str) -> common::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {url}"
        )))
    }
}
