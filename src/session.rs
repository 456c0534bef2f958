use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::api_connection::endpoints::LoginResponse;

/// Tokens obtained at login. Lives from `login` until `logout`.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub username: String,
}

// Keeps tokens out of logs and panic messages.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl From<LoginResponse> for Session {
    fn from(response: LoginResponse) -> Self {
        Self {
            access_token: response.access,
            refresh_token: response.refresh,
            username: response.user.username,
        }
    }
}

/// JSON file holding the current session between CLI invocations.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nobody is logged in.
    pub async fn load(&self) -> Result<Option<Session>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read session file '{}'", self.path.display())
                })
            }
        };
        let session = serde_json::from_str(&content).with_context(|| {
            format!("Session file '{}' is corrupted; log in again", self.path.display())
        })?;
        Ok(Some(session))
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create '{}'", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write session file '{}'", self.path.display()))?;
        debug!(path = %self.path.display(), user = %session.username, "session saved");
        Ok(())
    }

    /// Forgets the session without contacting the server. An unreadable file
    /// is removed as well; its owner is then unknown.
    pub async fn logout(&self) -> Result<Option<Session>> {
        let session = self.load().await.unwrap_or_else(|e| {
            debug!(error = %e, "discarding unreadable session file");
            None
        });
        self.clear().await?;
        Ok(session)
    }

    /// Removes the stored session. Clearing an absent session is not an error.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove session file '{}'", self.path.display())
            }),
        }
    }
}
