//! Persisted login session.
//!
//! A small JSON key-value file holding the serialized current user and a
//! logged-in flag. It is read once at startup, before any command runs.

use farmstead_core::Owner;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const CURRENT_USER_KEY: &str = "current_user";
pub const IS_LOGGED_IN_KEY: &str = "is_logged_in";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub current_user: Option<Owner>,
    pub is_logged_in: bool,
}

impl Session {
    pub fn logged_in(owner: Owner) -> Self {
        Self {
            current_user: Some(owner),
            is_logged_in: true,
        }
    }

    /// The logged-in user, if the session is complete.
    pub fn user(&self) -> Option<&Owner> {
        if self.is_logged_in {
            self.current_user.as_ref()
        } else {
            None
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to access session file '{}': {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Session file '{}' is corrupt: {}", .0.display(), .1)]
    Corrupt(PathBuf, #[source] serde_json::Error),

    #[error("Session file '{}' has an invalid '{}' entry", .0.display(), .1)]
    InvalidEntry(PathBuf, &'static str),
}

/// Serialize an owner to the string stored under [`CURRENT_USER_KEY`].
pub fn encode_owner(owner: &Owner) -> Result<String, serde_json::Error> {
    serde_json::to_string(owner)
}

pub fn decode_owner(encoded: &str) -> Result<Owner, serde_json::Error> {
    serde_json::from_str(encoded)
}

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

    /// Read the session. A missing file is an empty, logged-out session.
    pub fn load(&self) -> Result<Session, SessionError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Session::default()),
            Err(e) => return Err(SessionError::Io(self.path.clone(), e)),
        };

        let entries: Map<String, Value> = serde_json::from_str(&contents)
            .map_err(|e| SessionError::Corrupt(self.path.clone(), e))?;

        let current_user = match entries.get(CURRENT_USER_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(encoded)) => Some(
                decode_owner(encoded).map_err(|e| SessionError::Corrupt(self.path.clone(), e))?,
            ),
            Some(_) => {
                return Err(SessionError::InvalidEntry(
                    self.path.clone(),
                    CURRENT_USER_KEY,
                ))
            }
        };

        let is_logged_in = match entries.get(IS_LOGGED_IN_KEY) {
            None => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => {
                return Err(SessionError::InvalidEntry(
                    self.path.clone(),
                    IS_LOGGED_IN_KEY,
                ))
            }
        };

        Ok(Session {
            current_user,
            is_logged_in,
        })
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let mut entries = Map::new();
        if let Some(owner) = &session.current_user {
            let encoded =
                encode_owner(owner).map_err(|e| SessionError::Corrupt(self.path.clone(), e))?;
            entries.insert(CURRENT_USER_KEY.to_string(), Value::String(encoded));
        }
        entries.insert(
            IS_LOGGED_IN_KEY.to_string(),
            Value::Bool(session.is_logged_in),
        );

        let contents = serde_json::to_string_pretty(&Value::Object(entries))
            .map_err(|e| SessionError::Corrupt(self.path.clone(), e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SessionError::Io(parent.to_path_buf(), e))?;
            }
        }

        // Replace atomically.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, contents).map_err(|e| SessionError::Io(tmp.clone(), e))?;
        fs::rename(&tmp, &self.path).map_err(|e| SessionError::Io(self.path.clone(), e))?;

        debug!(path = %self.path.display(), logged_in = session.is_logged_in, "Session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(self.path.clone(), e)),
        }
    }

    /// Load the session for startup. Never fails: an unreadable or
    /// inconsistent session is cleared and a logged-out session returned.
    pub fn restore(&self) -> Session {
        match self.load() {
            Ok(session) if session.is_logged_in && session.current_user.is_none() => {
                warn!(path = %self.path.display(), "Session marked logged in without a user; clearing");
                self.clear_quietly();
                Session::default()
            }
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to restore session; continuing logged out");
                self.clear_quietly();
                Session::default()
            }
        }
    }

    fn clear_quietly(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "Failed to clear session file");
        }
    }
}
