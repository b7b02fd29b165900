//! # agentdock-session — per-session state store (spec §4.3)
//!
//! [`SessionStateManager`] sits on top of any
//! `agentdock_storage::StorageProvider` under a fixed namespace. It
//! guarantees per-session linearizable updates (spec §8 property 2) via a
//! map of per-session `tokio::sync::Mutex` guards — grounded on
//! `neuron-state-memory::MemoryStore`'s single `RwLock<HashMap<..>>` for
//! the storage shape, generalized with a second map of fine-grained locks
//! since spec §4.3 requires serialization *per session*, not across all
//! sessions. A background sweeper removes sessions past their TTL,
//! cancelled cooperatively via `tokio_util::sync::CancellationToken` in
//! the idiom `neuron-loop`'s cancellation example uses.

#![deny(missing_docs)]

mod config;

pub use config::SessionManagerConfig;

use agentdock_core::{PublicSessionView, SessionId, SessionState, StorageError};
use agentdock_storage::{StorageOptions, StorageProvider};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-session state store with TTL sweep and linearized updates.
pub struct SessionStateManager {
    provider: Arc<dyn StorageProvider>,
    config: SessionManagerConfig,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    sweeper: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SessionStateManager {
    /// Build a manager over `provider` and start its background sweeper.
    pub fn new(provider: Arc<dyn StorageProvider>, config: SessionManagerConfig) -> Arc<Self> {
        let manager = Arc::new(Self {
            provider,
            config,
            locks: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        });
        manager.clone().spawn_sweeper();
        manager
    }

    fn opts(&self) -> StorageOptions {
        StorageOptions::namespace(self.config.namespace.clone())
    }

    async fn lock_for(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionState>, StorageError> {
        let value = self.provider.get(session_id.as_str(), &self.opts()).await?;
        match value {
            Some(v) => serde_json::from_value(v)
                .map(Some)
                .map_err(|e| StorageError::Other(format!("corrupt session record: {e}"))),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &SessionState) -> Result<(), StorageError> {
        let value = serde_json::to_value(state)
            .map_err(|e| StorageError::Other(format!("failed to serialize session: {e}")))?;
        self.provider.set(state.session_id.as_str(), value, &self.opts()).await
    }

    /// Load the session, creating a fresh one if absent.
    pub async fn get_or_create(&self, session_id: &SessionId) -> Result<SessionState, StorageError> {
        let guard = self.lock_for(session_id).await;
        let _permit = guard.lock().await;
        match self.load(session_id).await? {
            Some(state) => Ok(state),
            None => {
                let state = SessionState::new(session_id.clone(), Utc::now());
                self.save(&state).await?;
                Ok(state)
            }
        }
    }

    /// Apply `patch` to the session's current state under its lock,
    /// persist, and return the resulting state. Returns `None` if the
    /// session doesn't exist.
    pub async fn update(
        &self,
        session_id: &SessionId,
        patch: impl FnOnce(&mut SessionState),
    ) -> Result<Option<SessionState>, StorageError> {
        let guard = self.lock_for(session_id).await;
        let _permit = guard.lock().await;
        let Some(mut state) = self.load(session_id).await? else {
            return Ok(None);
        };
        patch(&mut state);
        state.last_accessed = Utc::now();
        self.save(&state).await?;
        Ok(Some(state))
    }

    /// Set the active step name, creating the session first if needed.
    pub async fn set_active_step(&self, session_id: &SessionId, step_name: Option<String>) -> Result<(), StorageError> {
        self.get_or_create(session_id).await?;
        self.update(session_id, |state| state.active_step = step_name).await?;
        Ok(())
    }

    /// Replace a session's state with a fresh one, keeping its id.
    pub async fn reset_state(&self, session_id: &SessionId) -> Result<SessionState, StorageError> {
        let guard = self.lock_for(session_id).await;
        let _permit = guard.lock().await;
        let state = SessionState::new(session_id.clone(), Utc::now());
        self.save(&state).await?;
        Ok(state)
    }

    /// Delete a session's persisted state and forget its lock.
    pub async fn cleanup_session(&self, session_id: &SessionId) -> Result<(), StorageError> {
        self.provider.delete(session_id.as_str(), &self.opts()).await?;
        self.locks.lock().await.remove(session_id);
        Ok(())
    }

    /// The public view of a session's state, if it exists.
    pub async fn to_ai_view(&self, session_id: &SessionId) -> Result<Option<PublicSessionView>, StorageError> {
        Ok(self.load(session_id).await?.as_ref().map(PublicSessionView::from))
    }

    fn spawn_sweeper(self: Arc<Self>) {
        let token = CancellationToken::new();
        let sweep_token = token.clone();
        let interval = std::time::Duration::from_millis(self.config.sweep_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = sweep_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            warn!(error = %e, "session sweeper tick failed");
                        }
                    }
                }
            }
        });
        // Only ever written here, once, right after construction — no
        // contention to worry about.
        if let Ok(mut slot) = self.sweeper.try_lock() {
            *slot = Some((token, handle));
        }
    }

    async fn sweep_once(&self) -> Result<(), StorageError> {
        let now = Utc::now();
        let keys = self.provider.list("", &self.opts()).await?;
        let mut removed = 0usize;
        for key in keys {
            let session_id = SessionId::new(key);
            if let Some(state) = self.load(&session_id).await? {
                let idle_seconds = (now - state.last_accessed).num_seconds();
                if idle_seconds >= self.config.ttl_seconds {
                    self.provider.delete(session_id.as_str(), &self.opts()).await?;
                    self.locks.lock().await.remove(&session_id);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, "session sweeper removed expired sessions");
        }
        Ok(())
    }

    /// Cancel the sweeper and wait for it to stop. Idempotent.
    pub async fn shutdown(&self) {
        if let Some((token, handle)) = self.sweeper.lock().await.take() {
            token.cancel();
            let _ = handle.await;
        }
    }
}
