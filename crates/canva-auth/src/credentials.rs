//! Per-user credential store
//!
//! A flat JSON file holding one `{id, token}` entry per user identity. The
//! whole collection is loaded at startup and rewritten after every mutation.
//! A tokio Mutex is held across mutate-and-persist, so concurrent callbacks
//! for different users cannot lose each other's writes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One user's stored access token, keyed by the token's subject claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    pub id: String,
    pub token: String,
}

/// Durable identity → access token mapping.
///
/// Constructed once in `main` and shared by reference with every handler.
pub struct CredentialStore {
    path: PathBuf,
    users: Mutex<Vec<UserCredential>>,
}

impl CredentialStore {
    /// Load the store from `path`.
    ///
    /// A missing file starts an empty store and writes `[]` immediately so
    /// later writes have a file to replace. An unreadable or malformed file
    /// is an error: the caller should abort startup rather than silently
    /// discard every stored credential.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let users = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let users: Vec<UserCredential> = serde_json::from_str(&contents).map_err(|e| {
                    Error::CredentialParse(format!("parsing {}: {e}", path.display()))
                })?;
                info!(path = %path.display(), users = users.len(), "loaded credential store");
                users
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "credential store not found, starting empty");
                let users = Vec::new();
                write_atomic(&path, &users).await?;
                users
            }
            Err(e) => {
                return Err(Error::Io(format!("reading {}: {e}", path.display())));
            }
        };

        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    /// Token stored for `identity`, if any.
    pub async fn get_token(&self, identity: &str) -> Option<String> {
        let users = self.users.lock().await;
        users
            .iter()
            .find(|user| user.id == identity)
            .map(|user| user.token.clone())
    }

    /// Insert or overwrite the token for `identity`, then persist the whole
    /// store. Existing entries keep their position.
    pub async fn set_token(&self, identity: &str, token: String) -> Result<()> {
        let mut users = self.users.lock().await;
        match users.iter_mut().find(|user| user.id == identity) {
            Some(user) => {
                user.token = token;
                debug!(identity, "updated stored token");
            }
            None => {
                users.push(UserCredential {
                    id: identity.to_string(),
                    token,
                });
                debug!(identity, "stored token for new identity");
            }
        }
        write_atomic(&self.path, &users).await
    }

    /// Copy of every stored credential in file order.
    pub async fn snapshot(&self) -> Vec<UserCredential> {
        self.users.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replace the store file with a pretty-printed snapshot.
///
/// Written to a sibling temp file and renamed over the target, with 0600
/// permissions on unix since the file holds bearer tokens.
async fn write_atomic(path: &Path, users: &[UserCredential]) -> Result<()> {
    let json = serde_json::to_string_pretty(users)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "credentials".into());
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), users = users.len(), "persisted credential store");
    Ok(())
}
