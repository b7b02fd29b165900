//! Memory record and connection types (spec §3 "Memory record", "Memory
//! connection").

use crate::id::{AgentId, BatchId, MemoryId, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which of the four memory tiers a record belongs to. Retention policy
/// differs per tier — `applyDecay` exempts `Semantic` and `Procedural`
/// from pure time-based eviction (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Short-lived, high-resonance-decay working memory.
    Working,
    /// Event-shaped recollections of what happened.
    Episodic,
    /// Durable facts and relationships. Exempt from eviction.
    Semantic,
    /// Durable how-to knowledge. Exempt from eviction.
    Procedural,
}

impl Tier {
    /// Whether this tier is exempt from resonance-floor eviction
    /// (spec §3 "procedural and semantic tiers are exempt").
    pub fn exempt_from_eviction(self) -> bool {
        matches!(self, Tier::Semantic | Tier::Procedural)
    }
}

/// How a memory was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Deterministic rule-based extraction.
    Rules,
    /// Produced by an LLM extractor.
    Llm,
    /// Stored directly by a caller, bypassing extraction.
    Manual,
}

/// Reference to a stored embedding (vector-capable backends only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRef {
    /// Id of the stored embedding row.
    pub id: String,
    /// Name of the embedding model used.
    pub model: String,
    /// Vector dimensionality.
    pub dimension: usize,
}

/// A single memory record (spec §3 "Memory record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique id, assigned on store.
    pub id: MemoryId,
    /// Owning user. Every operation that touches this record requires a
    /// matching, non-empty user id (spec §3 "Ownership and tenancy").
    pub user_id: UserId,
    /// Owning agent.
    pub agent_id: AgentId,
    /// Free-text content.
    pub content: String,
    /// Memory tier.
    pub tier: Tier,
    /// Caller-asserted importance, static — never mutated by decay
    /// (0..1). See DESIGN.md for the importance-vs-resonance decision.
    pub importance: f64,
    /// Time-decaying salience score (>= 0). The only field `applyDecay`
    /// rewrites.
    pub resonance: f64,
    /// Number of times this record has been returned by a recall that
    /// requested access-stat updates.
    pub access_count: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time (content/metadata mutation, not access).
    pub updated_at: DateTime<Utc>,
    /// Last access time (bumped by recall, not by decay).
    pub last_accessed_at: DateTime<Utc>,
    /// Originating session, if any.
    pub session_id: Option<SessionId>,
    /// Keyword set used for keyword-subset filtering in recall.
    pub keywords: Vec<String>,
    /// Free-form metadata bag.
    pub metadata: HashMap<String, serde_json::Value>,
    /// How this record was produced.
    pub extraction_method: ExtractionMethod,
    /// Token count of `content`, if computed.
    pub token_count: Option<u32>,
    /// Extraction batch this record came from, if any.
    pub batch_id: Option<BatchId>,
    /// Ids of the source messages that produced this record.
    pub source_message_ids: Vec<String>,
    /// Reference to a stored embedding, if the backend is vector-capable.
    pub embedding: Option<EmbeddingRef>,
}

impl MemoryRecord {
    /// Age in days since `last_accessed_at`, as of `now`. Never negative.
    pub fn age_days_since_last_access(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (now - self.last_accessed_at).num_seconds().max(0) as f64;
        seconds / 86_400.0
    }
}

/// The kind of a directed edge between two memories owned by the same user
/// (spec §3 "Memory connection").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Generic association.
    Related,
    /// Source causes target.
    Causes,
    /// Source is part of target.
    PartOf,
    /// Source is similar to target.
    Similar,
    /// Source is the opposite of target.
    Opposite,
}

/// A directed edge between two memory ids belonging to the same user.
/// Unique per (source, target) pair; on conflict the higher strength wins
/// (spec §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConnection {
    /// Source memory id.
    pub source_id: MemoryId,
    /// Target memory id.
    pub target_id: MemoryId,
    /// Connection type.
    pub connection_type: ConnectionType,
    /// Strength in `0..1`.
    pub strength: f64,
    /// Optional human-readable reason.
    pub reason: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_and_procedural_are_exempt_from_eviction() {
        assert!(Tier::Semantic.exempt_from_eviction());
        assert!(Tier::Procedural.exempt_from_eviction());
        assert!(!Tier::Working.exempt_from_eviction());
        assert!(!Tier::Episodic.exempt_from_eviction());
    }

    #[test]
    fn age_days_never_negative() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = MemoryRecord {
            id: MemoryId::new("m1"),
            user_id: UserId::new("u1"),
            agent_id: AgentId::new("a1"),
            content: "x".into(),
            tier: Tier::Working,
            importance: 0.5,
            resonance: 0.5,
            access_count: 0,
            created_at: now,
            updated_at: now,
            last_accessed_at: now + chrono::Duration::hours(1),
            session_id: None,
            keywords: vec![],
            metadata: HashMap::new(),
            extraction_method: ExtractionMethod::Manual,
            token_count: None,
            batch_id: None,
            source_message_ids: vec![],
            embedding: None,
        };
        assert_eq!(record.age_days_since_last_access(now), 0.0);
    }
}
