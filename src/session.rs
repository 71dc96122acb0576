use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::catalog;
use crate::models::User;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SessionState {
    #[serde(default)]
    user: Option<User>,
    /// Access keys changed by an administrator, by unit id.
    #[serde(default)]
    access_keys: BTreeMap<String, String>,
}

/// Local session: the logged-in user and overridden unit access keys.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    state: SessionState,
}

impl SessionStore {
    /// Opens the session file, starting empty when it does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == ErrorKind::NotFound => SessionState::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), "session loaded");
        Ok(Self { path, state })
    }

    pub fn save(&self) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.state)?)?;
        Ok(())
    }

    /// Forgets everything, including key overrides, and removes the file.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::default();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn set_user(&mut self, user: User) -> Result<(), SessionError> {
        self.state.user = Some(user);
        self.save()
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.state.user = None;
        self.save()
    }

    /// Overrides a unit's key. A blank key restores the default.
    pub fn set_access_key(&mut self, unit_id: &str, key: &str) -> Result<(), SessionError> {
        let key = key.trim();
        if key.is_empty() {
            self.state.access_keys.remove(unit_id);
        } else {
            self.state
                .access_keys
                .insert(unit_id.to_string(), key.to_string());
        }
        self.save()
    }

    /// Effective key of a unit: the override if one exists, else the default.
    pub fn access_key_for(&self, unit_id: &str) -> Option<String> {
        self.state
            .access_keys
            .get(unit_id)
            .filter(|key| !key.trim().is_empty())
            .cloned()
            .or_else(|| catalog::unit_by_id(unit_id).map(|unit| unit.access_key.to_string()))
    }

    pub fn verify_key(&self, unit_id: &str, input: &str) -> bool {
        match self.access_key_for(unit_id) {
            Some(expected) => normalize_key(&expected) == normalize_key(input),
            None => false,
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn leader() -> User {
        User {
            id: "u-1".to_string(),
            phone: "98765432".to_string(),
            unit_id: Some("danli".to_string()),
            name: "Ana".to_string(),
            role: Role::StakeLeader,
            profile_image: None,
        }
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionStore::load(dir.path().join("session.json")).unwrap();
        assert!(session.current_user().is_none());
    }

    #[test]
    fn user_survives_reload_until_logout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");

        let mut session = SessionStore::load(&path).unwrap();
        session.set_user(leader()).unwrap();

        let mut reloaded = SessionStore::load(&path).unwrap();
        assert_eq!(reloaded.current_user(), Some(&leader()));

        reloaded.logout().unwrap();
        assert!(SessionStore::load(&path).unwrap().current_user().is_none());
    }

    #[test]
    fn default_keys_match_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionStore::load(dir.path().join("s.json")).unwrap();
        assert!(session.verify_key("danli", " stk-dan-77 "));
        assert!(!session.verify_key("danli", "STK-TEG-77"));
        assert!(!session.verify_key("nowhere", "STK-DAN-77"));
    }

    #[test]
    fn overridden_key_replaces_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let mut session = SessionStore::load(&path).unwrap();
        session.set_access_key("danli", "NEW-KEY").unwrap();

        let session = SessionStore::load(&path).unwrap();
        assert!(session.verify_key("danli", "new-key"));
        assert!(!session.verify_key("danli", "STK-DAN-77"));
        assert_eq!(session.access_key_for("uyuca").as_deref(), Some("STK-UYU-77"));
    }

    #[test]
    fn blank_override_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let mut session = SessionStore::load(&path).unwrap();
        session.set_access_key("danli", "NEW-KEY").unwrap();
        session.set_access_key("danli", "   ").unwrap();

        let session = SessionStore::load(&path).unwrap();
        assert!(session.verify_key("danli", "STK-DAN-77"));
        assert!(!session.verify_key("danli", ""));
        assert_eq!(session.access_key_for("danli").as_deref(), Some("STK-DAN-77"));
    }

    #[test]
    fn blank_key_in_session_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, r#"{"access_keys": {"danli": ""}}"#).unwrap();

        let session = SessionStore::load(&path).unwrap();
        assert!(session.verify_key("danli", "stk-dan-77"));
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let mut session = SessionStore::load(&path).unwrap();
        session.set_user(leader()).unwrap();
        session.set_access_key("danli", "X").unwrap();

        session.clear().unwrap();
        assert!(!path.exists());
        assert!(session.current_user().is_none());
        assert!(session.verify_key("danli", "STK-DAN-77"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(SessionStore::load(&path), Err(SessionError::Corrupt(_))));
    }
}
