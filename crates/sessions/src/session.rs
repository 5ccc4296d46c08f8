//! The process-local, mutable per-session record.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use sa_domain::cancel::CancelToken;
use sa_domain::error::Result;

use crate::log::ConversationLog;

/// A session's in-memory dataset table: name → opaque tabular value. The
/// shape of the value is owned entirely by whichever tool put it there;
/// this crate never inspects it.
pub type Datasets = RwLock<HashMap<String, Value>>;

/// A process-local, mutable record keyed by session_id.
///
/// Invariant: `datasets` and the conversation log are mutated only under
/// this session's lock during a turn, or by explicit admin operations
/// (delete, compress) — enforced by callers acquiring [`Session::lock`]
/// around a turn, not by this type itself (the lock is a `tokio::Mutex`
/// held across awaits, so it can't be `parking_lot`).
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub artifact_dir: PathBuf,
    pub datasets: Datasets,
    pub log: Arc<ConversationLog>,
    active_tool_call_ids: Mutex<HashSet<String>>,
    cancellation_token: RwLock<CancelToken>,
    turn_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Session {
    pub fn new(base_dir: &Path, session_id: impl Into<String>) -> Result<Self> {
        let session_id = session_id.into();
        let artifact_dir = base_dir.join("sessions").join(&session_id).join("artifacts");
        std::fs::create_dir_all(&artifact_dir).map_err(sa_domain::error::Error::Io)?;
        let log = Arc::new(ConversationLog::new(base_dir, &session_id)?);
        Ok(Self {
            session_id,
            created_at: Utc::now(),
            artifact_dir,
            datasets: RwLock::new(HashMap::new()),
            log,
            active_tool_call_ids: Mutex::new(HashSet::new()),
            cancellation_token: RwLock::new(CancelToken::new()),
            turn_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Acquire the per-session turn lock. Held by the Agent Runner for the
    /// duration of one `run()` call so a second inbound message for the
    /// same session can't interleave with it.
    pub fn turn_lock(&self) -> Arc<tokio::sync::Mutex<()>> {
        self.turn_lock.clone()
    }

    /// A fresh cancellation token for the turn about to start, replacing
    /// any stale token from a prior (already-finished) turn.
    pub fn begin_turn(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.cancellation_token.write() = token.clone();
        token
    }

    pub fn cancellation_token(&self) -> CancelToken {
        self.cancellation_token.read().clone()
    }

    pub fn request_cancel(&self) {
        self.cancellation_token.read().cancel();
    }

    pub fn mark_tool_active(&self, call_id: impl Into<String>) {
        self.active_tool_call_ids.lock().insert(call_id.into());
    }

    pub fn mark_tool_done(&self, call_id: &str) {
        self.active_tool_call_ids.lock().remove(call_id);
    }

    pub fn active_tool_call_ids(&self) -> HashSet<String> {
        self.active_tool_call_ids.lock().clone()
    }

    pub fn get_dataset(&self, name: &str) -> Option<Value> {
        self.datasets.read().get(name).cloned()
    }

    pub fn set_dataset(&self, name: impl Into<String>, value: Value) {
        self.datasets.write().insert(name.into(), value);
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets.read().keys().cloned().collect()
    }
}
