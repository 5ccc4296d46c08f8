//! Process-wide session registry: creates sessions lazily on first inbound
//! message for an id, and tears down both in-memory and on-disk state on
//! delete.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use sa_domain::error::{Error, Result};

use crate::session::Session;

pub struct SessionStore {
    base_dir: PathBuf,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return the existing session for `session_id`, or create it.
    pub fn get_or_create(&self, session_id: &str) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.read().get(session_id) {
            return Ok(session.clone());
        }
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get(session_id) {
            return Ok(session.clone());
        }
        let session = Arc::new(Session::new(&self.base_dir, session_id)?);
        sessions.insert(session_id.to_owned(), session.clone());
        tracing::info!(session_id, "session created");
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Remove a session from memory and delete its on-disk state.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.write().remove(session_id);
        let dir = self.session_dir(session_id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(Error::Io)?;
        }
        tracing::info!(session_id, "session deleted");
        Ok(())
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_dir.join("sessions").join(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}
