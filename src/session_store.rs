//! # Session Store Module
//!
//! Per-user conversation state owned by the flow controller.
//!
//! Every user gets one session slot guarded by its own async mutex. The
//! controller holds that lock for the whole handling of an event, including
//! any Commerce API call, so two events for the same user never interleave
//! and a double-tapped confirm button places a single order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::dialogue::ConversationState;

/// Telegram user id used as the session key
pub type UserKey = i64;

/// Shared handle to one user's state
pub type Session = Arc<AsyncMutex<ConversationState>>;

/// In-memory session store keyed by user id
///
/// Sessions are created on first access and live until pruned. Pruning only
/// drops idle sessions nobody is currently holding.
pub struct ConversationStore {
    sessions: Mutex<HashMap<UserKey, Session>>,
}

/// Serialized form written by [`ConversationStore::write_snapshot`]
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub sessions: BTreeMap<UserKey, ConversationState>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the session slot for `user`
    pub fn session(&self, user: UserKey) -> Session {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            sessions
                .entry(user)
                .or_insert_with(|| Arc::new(AsyncMutex::new(ConversationState::Idle))),
        )
    }

    /// Current state for `user`, waiting for any in-flight event to finish
    pub async fn state_of(&self, user: UserKey) -> ConversationState {
        let session = self.session(user);
        let state = session.lock().await;
        state.clone()
    }

    /// Number of tracked sessions
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop idle sessions that no event is currently using
    pub fn prune_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| {
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(state) => !matches!(*state, ConversationState::Idle),
                Err(_) => true,
            }
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "Pruned idle sessions");
        }
        pruned
    }

    /// Collect every non-idle session. Sessions busy with an event are skipped.
    pub fn snapshot(&self) -> Snapshot {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let sessions = sessions
            .iter()
            .filter_map(|(user, session)| {
                let state = session.try_lock().ok()?;
                (!matches!(*state, ConversationState::Idle)).then(|| (*user, state.clone()))
            })
            .collect();

        Snapshot {
            taken_at: Utc::now(),
            sessions,
        }
    }

    /// Write a JSON snapshot to `path`, replacing it atomically.
    ///
    /// The file is an inspection aid only and is never loaded back.
    pub async fn write_snapshot(&self, path: &Path) -> anyhow::Result<usize> {
        let snapshot = self.snapshot();
        let count = snapshot.sessions.len();
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        info!(path = %path.display(), sessions = count, "Wrote session snapshot");
        Ok(count)
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
