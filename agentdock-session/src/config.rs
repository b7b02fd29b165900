//! Configuration for [`crate::SessionStateManager`] (spec §6 "Configuration
//! surface": `session.ttlSeconds`, `session.sweepIntervalMs`).

/// Construction-time options for a session store.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Namespace passed to the backing [`agentdock_storage::StorageProvider`].
    pub namespace: String,
    /// Idle session lifetime, in seconds, before the sweeper removes it.
    pub ttl_seconds: i64,
    /// Sweeper tick cadence, in milliseconds.
    pub sweep_interval_ms: u64,
    /// Cap on `recentlyUsedTools` length (spec §4.5, default 20).
    pub recent_tools_cap: usize,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            namespace: "sessions".to_string(),
            ttl_seconds: 3600,
            sweep_interval_ms: 60_000,
            recent_tools_cap: 20,
        }
    }
}
