//! The `MemoryOps` capability (spec §4.2).

use agentdock_core::{
    AgentId, BatchId, ConnectionType, ExtractionMethod, MemoryConnection, MemoryId, SessionId,
    StorageError, Tier, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Input to [`MemoryOps::store`] — everything about a memory the caller
/// controls. Id, resonance, access count, and timestamps are assigned by
/// the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    /// Free-text content.
    pub content: String,
    /// Memory tier.
    pub tier: Tier,
    /// Caller-asserted importance (0..1).
    pub importance: f64,
    /// Originating session, if any.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Keyword set.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// How this record was produced.
    pub extraction_method: ExtractionMethod,
    /// Token count of `content`, if known.
    #[serde(default)]
    pub token_count: Option<u32>,
    /// Extraction batch this record came from, if any.
    #[serde(default)]
    pub batch_id: Option<BatchId>,
    /// Ids of the source messages that produced this record.
    #[serde(default)]
    pub source_message_ids: Vec<String>,
}

/// Partial patch applied by [`MemoryOps::update`]. `None` fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPatch {
    /// New content, if changing.
    pub content: Option<String>,
    /// New importance, if changing.
    pub importance: Option<f64>,
    /// New keyword set, if changing.
    pub keywords: Option<Vec<String>>,
    /// Metadata keys to merge in (existing keys are overwritten).
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Recall query filters (spec §4.2 "Pure text recall").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallOptions {
    /// Restrict to these tiers; empty means all tiers.
    #[serde(default)]
    pub tiers: Vec<Tier>,
    /// Minimum importance, inclusive.
    #[serde(default)]
    pub min_importance: Option<f64>,
    /// Minimum resonance, inclusive.
    #[serde(default)]
    pub min_resonance: Option<f64>,
    /// Require at least one of these keywords to be present.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Restrict to records created within `[start, end]`.
    #[serde(default)]
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Restrict to a single originating session.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Whether a matched row's access stats are bumped
    /// (`access_count += 1`, `last_accessed_at <- now`). Default `true`
    /// (spec §4.2).
    #[serde(default = "default_true")]
    pub update_access_stats: bool,
}

fn default_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

impl RecallOptions {
    /// Options with only a result limit set.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

/// Aggregate stats for a (user, agent?) pair (spec §4.2 `getStats`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Total memory count.
    pub count: u64,
    /// Count broken down by tier.
    pub count_by_tier: HashMap<Tier, u64>,
    /// Average importance across all counted records.
    pub avg_importance: f64,
    /// Approximate total size in bytes of stored content.
    pub size_bytes: u64,
}

/// Decay parameters for [`MemoryOps::apply_decay`] (spec §4.2 "Decay").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecayRules {
    /// Exponential decay rate applied to existing resonance per day of age.
    pub rate: f64,
    /// Weight applied to `importance` when recomputing resonance.
    pub importance_weight: f64,
    /// Weight applied to `ln(access_count + 1)` when recomputing resonance.
    pub access_boost: f64,
    /// Records at or below this resonance are deleted (unless tier-exempt).
    pub floor: f64,
}

impl Default for DecayRules {
    fn default() -> Self {
        Self {
            rate: 0.1,
            importance_weight: 0.1,
            access_boost: 0.05,
            floor: 0.01,
        }
    }
}

/// Result of a decay sweep.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DecayOutcome {
    /// Number of records examined.
    pub processed: u64,
    /// Number of records whose resonance was updated but kept.
    pub decayed: u64,
    /// Number of records deleted for falling below the floor.
    pub removed: u64,
}

/// Result of [`MemoryOps::find_connected`] — every memory and connection
/// touched by the traversal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectedResult {
    /// Memories reached by the traversal (including the seed).
    pub memories: Vec<agentdock_core::MemoryRecord>,
    /// Connections whose endpoints are both in `memories`.
    pub connections: Vec<MemoryConnection>,
}

/// Per-tier memory CRUD, hybrid recall, decay, and the connection graph
/// (spec §4.2). Exposed on providers whose backend is capable, via
/// [`crate::provider::StorageProvider::as_memory_ops`].
#[async_trait]
pub trait MemoryOps: Send + Sync {
    /// Store a new memory, returning its assigned id.
    async fn store(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        memory: NewMemory,
    ) -> Result<MemoryId, StorageError>;

    /// Recall memories for `(user_id, agent_id)` matching `query` and
    /// `opts`, ordered by the composite relevance score of spec §4.2.
    async fn recall(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &str,
        opts: &RecallOptions,
    ) -> Result<Vec<agentdock_core::MemoryRecord>, StorageError>;

    /// Apply a partial patch to an existing memory.
    async fn update(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        id: &MemoryId,
        patch: MemoryPatch,
    ) -> Result<(), StorageError>;

    /// Delete a memory. Returns whether a row was actually removed.
    async fn delete(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        id: &MemoryId,
    ) -> Result<bool, StorageError>;

    /// Fetch a single memory by id, scoped to `user_id`. Never returns a
    /// record owned by another user (spec §3 "Ownership and tenancy").
    async fn get_by_id(
        &self,
        user_id: &UserId,
        id: &MemoryId,
    ) -> Result<Option<agentdock_core::MemoryRecord>, StorageError>;

    /// Aggregate stats, optionally scoped to a single agent.
    async fn get_stats(
        &self,
        user_id: &UserId,
        agent_id: Option<&AgentId>,
    ) -> Result<MemoryStats, StorageError>;

    /// Recompute resonance for every memory of `(user_id, agent_id)` and
    /// delete records that fall below the floor (tier-exempt records
    /// excluded). One transaction per `(user, agent)` pair.
    async fn apply_decay(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        rules: DecayRules,
    ) -> Result<DecayOutcome, StorageError>;

    /// Create or strengthen connections. On conflict with an existing
    /// `(source, target)` edge, strength becomes `max(old, new)`.
    async fn create_connections(
        &self,
        user_id: &UserId,
        connections: Vec<MemoryConnection>,
    ) -> Result<(), StorageError>;

    /// BFS from `memory_id`, breadth-limited by `depth`, edge-filtered by
    /// `min_strength`, cycle-safe via a visited set.
    async fn find_connected(
        &self,
        user_id: &UserId,
        memory_id: &MemoryId,
        depth: u32,
        min_strength: f64,
    ) -> Result<ConnectedResult, StorageError>;
}

/// Connection type re-export convenience for callers that only import this
/// module.
pub use agentdock_core::ConnectionType as MemoryConnectionType;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_rules_default_is_sane() {
        let rules = DecayRules::default();
        assert!(rules.rate > 0.0);
        assert!(rules.floor > 0.0 && rules.floor < 1.0);
    }

    #[test]
    fn recall_options_default_limit_is_nonzero() {
        let opts = RecallOptions::default();
        assert_eq!(opts.limit, 20);
        assert!(opts.update_access_stats);
    }

    #[test]
    fn with_limit_only_sets_limit() {
        let opts = RecallOptions::with_limit(5);
        assert_eq!(opts.limit, 5);
        assert!(opts.tiers.is_empty());
    }

    #[test]
    fn unused_connection_type_variant_compiles() {
        let _ = ConnectionType::Opposite;
    }
}
