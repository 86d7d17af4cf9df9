//! Ties `SessionState` to durable storage. `SessionManager` is the only thing the rest of the
//! workspace talks to; it hides the `state_tag`/`state_json` split behind `load`/`save`.

use std::sync::Arc;

use chrono::Utc;
use dispatch_store::Store;

use crate::error::SessionResult;
use crate::state::SessionState;

/// Loads and persists `SessionState` for a user, backed by any `Store` implementation.
pub struct SessionManager {
    store: Arc<dyn Store>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns the user's current state, defaulting to `Idle` if no session row exists yet
    /// (a brand-new operator).
    pub async fn load(&self, user_id: i64) -> SessionResult<SessionState> {
        match self.store.get_session(user_id).await? {
            Some(record) => SessionState::from_record(&record),
            None => Ok(SessionState::Idle),
        }
    }

    pub async fn save(&self, user_id: i64, state: &SessionState) -> SessionResult<()> {
        let record = state.to_record(user_id, Utc::now())?;
        self.store.save_session(&record).await?;
        Ok(())
    }

    /// Convenience for handlers that compute the next state from the current one in a single
    /// step, avoiding a separate load/save pair at every call site.
    pub async fn transition<F>(&self, user_id: i64, f: F) -> SessionResult<SessionState>
    where
        F: FnOnce(SessionState) -> SessionState,
    {
        let current = self.load(user_id).await?;
        let next = f(current);
        self.save(user_id, &next).await?;
        Ok(next)
    }

    /// Resets a user back to `Idle`, used after a terminal action (post queued, batch closed,
    /// edit applied) completes a flow.
    pub async fn reset(&self, user_id: i64) -> SessionResult<()> {
        self.save(user_id, &SessionState::Idle).await
    }
}
