//! Session model and durable credential storage
//!
//! The store keeps one JSON document with two fixed keys (`CREDENTIAL_KEY`,
//! `USER_KEY`). Every write replaces the whole document with temp-file +
//! rename, so a reader sees either both new values or both old ones. A tokio
//! Mutex serializes `load`, `save` and `clear` within the process.
//!
//! `load` never fails: a missing, corrupt or half-populated document reads as
//! `Session::Anonymous`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use common::Secret;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{CREDENTIAL_KEY, USER_KEY};
use crate::error::{Error, Result};

/// Access/refresh token pair.
///
/// Immutable: a refresh produces a whole new `Credential`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for API calls
    pub token: Secret<String>,
    /// Token traded for a new pair at `/refresh-token`
    pub refresh_token: Secret<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
            refresh_token: Secret::new(refresh_token.into()),
        }
    }

    /// The access token, for the `Authorization` header.
    pub fn access(&self) -> &str {
        self.token.expose()
    }
}

/// Signed-in user snapshot. Replaced whole, never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub name: String,
    pub email: String,
    /// Avatar file name on the server, if the user uploaded one
    #[serde(default)]
    pub avatar: Option<String>,
}

/// The backend sends numeric ids; older stored documents hold strings.
fn id_from_string_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }
    Ok(match RawId::deserialize(d)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Who the app is talking to the API as.
///
/// Transitions:
/// - Anonymous → Authenticated (sign-in)
/// - Authenticated → Refreshing (access token rejected, refresh started)
/// - Refreshing → Authenticated (refresh succeeded, user retained)
/// - any → Anonymous (sign-out or refresh failure)
///
/// A profile only exists alongside a credential, so the profile can never
/// outlive a sign-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated {
        credential: Credential,
        user: UserProfile,
    },
    /// Stale credential kept until the refresh lands. Never persisted.
    Refreshing {
        credential: Credential,
        user: UserProfile,
    },
}

impl Session {
    pub fn authenticated(credential: Credential, user: UserProfile) -> Self {
        Session::Authenticated { credential, user }
    }

    /// State label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Session::Anonymous => "anonymous",
            Session::Authenticated { .. } => "authenticated",
            Session::Refreshing { .. } => "refreshing",
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { credential, .. } | Session::Refreshing { credential, .. } => {
                Some(credential)
            }
        }
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { user, .. } | Session::Refreshing { user, .. } => Some(user),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Session::Anonymous)
    }
}

/// Durable session storage backed by a single JSON file.
pub struct CredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CredentialStore {
    /// Create a store for the given file. Touches nothing on disk.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted session.
    ///
    /// Returns `Anonymous` when the file is missing or unreadable, when
    /// either entry fails to parse, or when only one of the two entries is
    /// present.
    pub async fn load(&self) -> Session {
        let _guard = self.lock.lock().await;

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored session");
                return Session::Anonymous;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable session file, treating as signed out");
                return Session::Anonymous;
            }
        };

        match parse_document(&contents) {
            Ok(session) => {
                info!(path = %self.path.display(), state = session.label(), "loaded stored session");
                session
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt session file, treating as signed out");
                Session::Anonymous
            }
        }
    }

    /// Persist both entries of the session in one atomic write.
    ///
    /// `Refreshing` is stored as the pair it holds; `Anonymous` clears.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.lock.lock().await;
        let document = build_document(session)?;
        write_atomic(&self.path, &document).await?;
        debug!(state = session.label(), "saved session");
        Ok(())
    }

    /// Remove both entries. Succeeds when nothing was stored.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "cleared stored session");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(format!("removing session file: {e}"))),
        }
    }
}

fn build_document(session: &Session) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut document = serde_json::Map::new();
    if let (Some(credential), Some(user)) = (session.credential(), session.user()) {
        let credential = serde_json::to_value(credential)
            .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;
        let user = serde_json::to_value(user)
            .map_err(|e| Error::CredentialParse(format!("serializing user: {e}")))?;
        document.insert(CREDENTIAL_KEY.to_owned(), credential);
        document.insert(USER_KEY.to_owned(), user);
    }
    Ok(document)
}

fn parse_document(contents: &str) -> Result<Session> {
    let mut document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(contents)
        .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;

    match (document.remove(CREDENTIAL_KEY), document.remove(USER_KEY)) {
        (Some(credential), Some(user)) => {
            let credential: Credential = serde_json::from_value(credential)
                .map_err(|e| Error::CredentialParse(format!("parsing {CREDENTIAL_KEY}: {e}")))?;
            let user: UserProfile = serde_json::from_value(user)
                .map_err(|e| Error::CredentialParse(format!("parsing {USER_KEY}: {e}")))?;
            Ok(Session::authenticated(credential, user))
        }
        (None, None) => Ok(Session::Anonymous),
        (credential, _) => {
            let missing = if credential.is_some() { USER_KEY } else { CREDENTIAL_KEY };
            warn!(missing, "session file holds only one entry, ignoring it");
            Ok(Session::Anonymous)
        }
    }
}

/// Distinguishes temp files when several stores share a directory.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write the session document atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write leaves the previous document intact.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains tokens.
async fn write_atomic(
    path: &Path,
    document: &serde_json::Map<String, serde_json::Value>,
) -> Result<()> {
    let json = serde_json::to_string_pretty(document)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;
    if !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Io(format!("creating session directory: {e}")))?;
    }

    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_path = dir.join(format!(".session.tmp.{}.{n}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    if let Err(e) = replace_with(&tmp_path, path).await {
        // The temp file holds tokens
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    debug!(path = %path.display(), "persisted session");
    Ok(())
}

/// Restrict the temp file to its owner and move it over `path`.
async fn replace_with(tmp_path: &Path, path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))
}
