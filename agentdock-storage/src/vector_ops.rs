//! The vector-capable extension of [`crate::memory_ops::MemoryOps`] (spec
//! §4.2 "Vector-capable variant").

use crate::memory_ops::{MemoryPatch, NewMemory, RecallOptions};
use agentdock_core::{AgentId, EmbeddingRef, MemoryId, MemoryRecord, StorageError, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A dense embedding vector plus the metadata needed to interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    /// Model that produced the vector.
    pub model: String,
    /// Raw vector components.
    pub vector: Vec<f32>,
}

impl Embedding {
    /// Cosine similarity against another embedding of the same
    /// dimension. Returns 0.0 if either vector has zero magnitude or the
    /// dimensions differ (callers are expected to only compare same-model
    /// embeddings, but this never panics).
    pub fn cosine_similarity(&self, other: &Embedding) -> f64 {
        if self.vector.len() != other.vector.len() {
            return 0.0;
        }
        let dot: f64 = self
            .vector
            .iter()
            .zip(other.vector.iter())
            .map(|(a, b)| (*a as f64) * (*b as f64))
            .sum();
        let norm_a: f64 = self.vector.iter().map(|a| (*a as f64).powi(2)).sum::<f64>().sqrt();
        let norm_b: f64 = other.vector.iter().map(|b| (*b as f64).powi(2)).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

/// Weights used to fuse vector and lexical rankings (spec §4.2 "Hybrid
/// search", default vector 0.7 / text 0.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    /// Weight applied to the vector-ranked list.
    pub vector: f64,
    /// Weight applied to the lexical-ranked list.
    pub text: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            vector: 0.7,
            text: 0.3,
        }
    }
}

/// Options for a hybrid search call.
#[derive(Debug, Clone)]
pub struct HybridSearchOptions {
    /// Result cap, applied to each underlying path and to the fused list.
    pub limit: usize,
    /// Cosine-distance cutoff for the vector path: candidates with
    /// `1 - cosine_similarity > vector_threshold` are excluded.
    pub vector_threshold: f64,
    /// Fusion weights.
    pub weights: HybridWeights,
}

impl Default for HybridSearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            vector_threshold: 0.5,
            weights: HybridWeights::default(),
        }
    }
}

/// Vector-capable extension of [`MemoryOps`](crate::memory_ops::MemoryOps).
/// A provider exposes this via
/// [`StorageProvider::as_vector_ops`](crate::provider::StorageProvider::as_vector_ops).
#[async_trait]
pub trait VectorOps: Send + Sync {
    /// Store a memory together with its embedding in one call.
    async fn store_with_embedding(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        memory: NewMemory,
        embedding: Embedding,
    ) -> Result<MemoryId, StorageError>;

    /// KNN search by embedding, filtered by `(user_id, agent_id)`.
    async fn search_by_vector(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &Embedding,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StorageError>;

    /// Lexical search (BM25 where available, substring otherwise).
    async fn search_by_text(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &str,
        opts: &RecallOptions,
    ) -> Result<Vec<MemoryRecord>, StorageError>;

    /// Reciprocal-rank-fused vector + lexical search. Falls back to the
    /// lexical path if the vector path errors, to the vector path if the
    /// lexical path errors, and to plain recall if both error — callers
    /// invoke this directly; fallback is implemented by
    /// `agentdock-memory`'s `RecallService`, not inside this trait, since
    /// the fallback needs the non-vector-capable `MemoryOps::recall` path
    /// too.
    async fn hybrid_search(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &str,
        embedding: &Embedding,
        opts: &HybridSearchOptions,
    ) -> Result<Vec<MemoryRecord>, StorageError>;

    /// Memories most similar to an existing memory's embedding.
    async fn find_similar(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        memory_id: &MemoryId,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StorageError>;

    /// Fetch the stored embedding reference for a memory.
    async fn get_embedding(
        &self,
        user_id: &UserId,
        memory_id: &MemoryId,
    ) -> Result<Option<EmbeddingRef>, StorageError>;

    /// Replace the embedding for an existing memory.
    async fn update_embedding(
        &self,
        user_id: &UserId,
        memory_id: &MemoryId,
        embedding: Embedding,
    ) -> Result<(), StorageError>;

    /// Patch applied alongside embedding updates when the caller also
    /// changes content (kept here so implementations can share one
    /// "update memory + embedding" transaction instead of composing two
    /// round trips). Optional: default implementation is a no-op patch.
    async fn update_with_patch(
        &self,
        _user_id: &UserId,
        _agent_id: &AgentId,
        _memory_id: &MemoryId,
        _patch: MemoryPatch,
    ) -> Result<(), StorageError> {
        Ok(())
    }
}
