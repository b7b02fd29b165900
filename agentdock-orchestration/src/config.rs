//! Configuration for [`crate::OrchestrationManager`] (spec §6 "Configuration
//! surface": `orchestration.recentToolsCap`).

/// Construction-time options for an orchestration manager.
#[derive(Debug, Clone)]
pub struct OrchestrationManagerConfig {
    /// Cap on a session's `recently_used_tools` length (default 20).
    pub recent_tools_cap: usize,
}

impl Default for OrchestrationManagerConfig {
    fn default() -> Self {
        Self { recent_tools_cap: 20 }
    }
}
