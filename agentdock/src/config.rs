//! Construction-time configuration surface (spec §6 "Configuration surface").

use agentdock_memory::{ExtractionConfig, RecallConfig};
use agentdock_orchestration::OrchestrationManagerConfig;
use agentdock_storage::DecayRules;

/// Backend selection and key prefixing for the storage layer.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend type tag registered with the [`agentdock_storage::StorageFactory`]
    /// (`"memory"` is the only backend this crate registers out of the box).
    pub backend: String,
    /// Prefixes all keys this deployment writes.
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: "memory".into(), namespace: "agentdock".into() }
    }
}

/// Session idle lifetime and sweep cadence.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle session lifetime, in seconds.
    pub ttl_seconds: i64,
    /// Sweeper cadence, in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_seconds: 3600, sweep_interval_ms: 60_000 }
    }
}

/// Top-level construction options for [`crate::AgentDockCore`], one field
/// per row of the configuration surface table.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// `storage.type` / `storage.namespace`.
    pub storage: StorageConfig,
    /// `session.ttlSeconds` / `session.sweepIntervalMs`.
    pub session: SessionConfig,
    /// `orchestration.recentToolsCap`.
    pub orchestration: OrchestrationManagerConfig,
    /// `memory.decay.{rate,importanceWeight,accessBoost,floor}`.
    pub memory_decay: DecayRules,
    /// `recall.hybridWeights.*`, `recall.limit`, `recall.minRelevance`.
    pub recall: RecallConfig,
    /// `extraction.{maxBatchSize,minBatchSize,timeoutMinutes,extractionRate,minMessageLength}`.
    pub extraction: ExtractionConfig,
}
