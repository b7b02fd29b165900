//! # agentdock-storage-memory — in-process `StorageProvider` (spec §4.1, §4.2)
//!
//! A single [`MemoryProvider`] backs the KV/list contract
//! (`agentdock_storage::StorageProvider`) and both capability bundles
//! (`MemoryOps`, `VectorOps`) over plain `RwLock<HashMap<..>>` state —
//! no persistence, process lifetime only. Grounded on
//! `neuron-state-memory::MemoryStore`, generalized from a flat KV store
//! to the three concerns spec §4 separates.
//!
//! Register it with a [`agentdock_storage::StorageFactory`] under a type
//! tag such as `"memory"`:
//!
//! ```ignore
//! let mut factory = StorageFactory::new();
//! factory.register("memory", |_namespace| {
//!     Ok(Arc::new(MemoryProvider::new()) as Arc<dyn StorageProvider>)
//! });
//! ```

#![deny(missing_docs)]

mod kv;
mod memories;
mod vectors;

use agentdock_core::{AgentId, EmbeddingRef, MemoryId, StorageError, UserId};
use agentdock_storage::{
    ConnectedResult, DecayOutcome, DecayRules, Embedding, HybridSearchOptions, MemoryOps,
    MemoryPatch, MemoryStats, NewMemory, RecallOptions, StorageOptions, StorageProvider, VectorOps,
};
use async_trait::async_trait;
use kv::KvStore;
use memories::MemoryGraph;
use vectors::VectorStore;

/// In-process backend implementing the full storage contract: KV/list,
/// memory CRUD + recall + decay + connection graph, and cosine-similarity
/// vector search.
pub struct MemoryProvider {
    kv: KvStore,
    graph: MemoryGraph,
    vectors: VectorStore,
}

impl MemoryProvider {
    /// An empty provider.
    pub fn new() -> Self {
        Self {
            kv: KvStore::new(),
            graph: MemoryGraph::new(),
            vectors: VectorStore::new(),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    async fn get(&self, key: &str, opts: &StorageOptions) -> Result<Option<serde_json::Value>, StorageError> {
        self.kv.get(key, opts).await
    }

    async fn set(&self, key: &str, value: serde_json::Value, opts: &StorageOptions) -> Result<(), StorageError> {
        self.kv.set(key, value, opts).await
    }

    async fn delete(&self, key: &str, opts: &StorageOptions) -> Result<bool, StorageError> {
        self.kv.delete(key, opts).await
    }

    async fn list(&self, prefix: &str, opts: &StorageOptions) -> Result<Vec<String>, StorageError> {
        self.kv.list(prefix, opts).await
    }

    async fn get_list(
        &self,
        key: &str,
        start: usize,
        end: usize,
        opts: &StorageOptions,
    ) -> Result<Option<Vec<serde_json::Value>>, StorageError> {
        self.kv.get_list(key, start, end, opts).await
    }

    async fn save_list(&self, key: &str, values: Vec<serde_json::Value>, opts: &StorageOptions) -> Result<(), StorageError> {
        self.kv.save_list(key, values, opts).await
    }

    async fn delete_list(&self, key: &str, opts: &StorageOptions) -> Result<bool, StorageError> {
        self.kv.delete_list(key, opts).await
    }

    async fn clear(&self, prefix: Option<&str>) -> Result<(), StorageError> {
        self.kv.clear(prefix).await
    }

    fn as_memory_ops(&self) -> Option<&dyn MemoryOps> {
        Some(self)
    }

    fn as_vector_ops(&self) -> Option<&dyn VectorOps> {
        Some(self)
    }
}

#[async_trait]
impl MemoryOps for MemoryProvider {
    async fn store(&self, user_id: &UserId, agent_id: &AgentId, memory: NewMemory) -> Result<MemoryId, StorageError> {
        self.graph.store(user_id, agent_id, memory).await
    }

    async fn recall(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &str,
        opts: &RecallOptions,
    ) -> Result<Vec<agentdock_core::MemoryRecord>, StorageError> {
        self.graph.recall(user_id, agent_id, query, opts).await
    }

    async fn update(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        id: &MemoryId,
        patch: MemoryPatch,
    ) -> Result<(), StorageError> {
        self.graph.update(user_id, agent_id, id, patch).await
    }

    async fn delete(&self, user_id: &UserId, agent_id: &AgentId, id: &MemoryId) -> Result<bool, StorageError> {
        self.graph.delete(user_id, agent_id, id).await
    }

    async fn get_by_id(&self, user_id: &UserId, id: &MemoryId) -> Result<Option<agentdock_core::MemoryRecord>, StorageError> {
        self.graph.get_by_id(user_id, id).await
    }

    async fn get_stats(&self, user_id: &UserId, agent_id: Option<&AgentId>) -> Result<MemoryStats, StorageError> {
        self.graph.get_stats(user_id, agent_id).await
    }

    async fn apply_decay(&self, user_id: &UserId, agent_id: &AgentId, rules: DecayRules) -> Result<DecayOutcome, StorageError> {
        self.graph.apply_decay(user_id, agent_id, rules).await
    }

    async fn create_connections(
        &self,
        user_id: &UserId,
        connections: Vec<agentdock_core::MemoryConnection>,
    ) -> Result<(), StorageError> {
        self.graph.create_connections(user_id, connections).await
    }

    async fn find_connected(
        &self,
        user_id: &UserId,
        memory_id: &MemoryId,
        depth: u32,
        min_strength: f64,
    ) -> Result<ConnectedResult, StorageError> {
        self.graph.find_connected(user_id, memory_id, depth, min_strength).await
    }
}

#[async_trait]
impl VectorOps for MemoryProvider {
    async fn store_with_embedding(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        memory: NewMemory,
        embedding: Embedding,
    ) -> Result<MemoryId, StorageError> {
        let id = self.graph.store(user_id, agent_id, memory).await?;
        let embedding_ref = self.vectors.set(id.clone(), embedding).await;
        self.graph.set_embedding_ref(&id, embedding_ref).await;
        Ok(id)
    }

    async fn search_by_vector(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &Embedding,
        limit: usize,
    ) -> Result<Vec<agentdock_core::MemoryRecord>, StorageError> {
        let candidates = self.graph.ids_for(user_id, agent_id).await;
        let ranked = self.vectors.rank(query, &candidates, -1.0).await;
        let mut out = Vec::with_capacity(limit.min(ranked.len()));
        for (id, _) in ranked.into_iter().take(limit) {
            if let Some(record) = self.graph.get_by_id(user_id, &id).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn search_by_text(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &str,
        opts: &RecallOptions,
    ) -> Result<Vec<agentdock_core::MemoryRecord>, StorageError> {
        self.graph.recall(user_id, agent_id, query, opts).await
    }

    async fn hybrid_search(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &str,
        embedding: &Embedding,
        opts: &HybridSearchOptions,
    ) -> Result<Vec<agentdock_core::MemoryRecord>, StorageError> {
        let candidates = self.graph.ids_for(user_id, agent_id).await;
        let min_similarity = 1.0 - opts.vector_threshold;
        let vector_ranked: Vec<MemoryId> = self
            .vectors
            .rank(embedding, &candidates, min_similarity)
            .await
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let text_opts = RecallOptions {
            limit: opts.limit,
            update_access_stats: false,
            ..Default::default()
        };
        let text_ranked: Vec<MemoryId> = self
            .graph
            .recall(user_id, agent_id, query, &text_opts)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let fused = vectors::reciprocal_rank_fusion(
            &vector_ranked,
            opts.weights.vector,
            &text_ranked,
            opts.weights.text,
        );

        let mut out = Vec::with_capacity(opts.limit.min(fused.len()));
        for (id, _) in fused.into_iter().take(opts.limit) {
            if let Some(record) = self.graph.get_by_id(user_id, &id).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn find_similar(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        memory_id: &MemoryId,
        limit: usize,
    ) -> Result<Vec<agentdock_core::MemoryRecord>, StorageError> {
        let Some(query) = self.vectors.get_vector(memory_id).await else {
            return Ok(vec![]);
        };
        let mut candidates = self.graph.ids_for(user_id, agent_id).await;
        candidates.retain(|id| id != memory_id);
        let ranked = self.vectors.rank(&query, &candidates, -1.0).await;
        let mut out = Vec::with_capacity(limit.min(ranked.len()));
        for (id, _) in ranked.into_iter().take(limit) {
            if let Some(record) = self.graph.get_by_id(user_id, &id).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn get_embedding(&self, user_id: &UserId, memory_id: &MemoryId) -> Result<Option<EmbeddingRef>, StorageError> {
        if self.graph.get_by_id(user_id, memory_id).await?.is_none() {
            return Ok(None);
        }
        Ok(self.vectors.get_ref(memory_id).await)
    }

    async fn update_embedding(&self, user_id: &UserId, memory_id: &MemoryId, embedding: Embedding) -> Result<(), StorageError> {
        if self.graph.get_by_id(user_id, memory_id).await?.is_none() {
            return Err(StorageError::Other(format!("memory {memory_id} not found")));
        }
        let embedding_ref = self.vectors.set(memory_id.clone(), embedding).await;
        self.graph.set_embedding_ref(memory_id, embedding_ref).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdock_core::{ExtractionMethod, Tier};

    fn memory(content: &str) -> NewMemory {
        NewMemory {
            content: content.into(),
            tier: Tier::Episodic,
            importance: 0.5,
            session_id: None,
            keywords: vec![],
            metadata: Default::default(),
            extraction_method: ExtractionMethod::Manual,
            token_count: None,
            batch_id: None,
            source_message_ids: vec![],
        }
    }

    #[tokio::test]
    async fn kv_and_memory_ops_share_one_provider() {
        let provider = MemoryProvider::new();
        provider
            .set("config", serde_json::json!({"k": 1}), &StorageOptions::namespace("s1"))
            .await
            .unwrap();
        assert!(provider.as_memory_ops().is_some());
        assert!(provider.as_vector_ops().is_some());

        let user = UserId::new("u1");
        let agent = AgentId::new("a1");
        let id = MemoryOps::store(&provider, &user, &agent, memory("hello")).await.unwrap();
        let record = provider.get_by_id(&user, &id).await.unwrap().unwrap();
        assert_eq!(record.content, "hello");
    }

    #[tokio::test]
    async fn vector_search_ranks_by_similarity() {
        let provider = MemoryProvider::new();
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");

        let close = Embedding { model: "m".into(), vector: vec![1.0, 0.0] };
        let far = Embedding { model: "m".into(), vector: vec![0.0, 1.0] };
        provider
            .store_with_embedding(&user, &agent, memory("close"), close.clone())
            .await
            .unwrap();
        provider
            .store_with_embedding(&user, &agent, memory("far"), far)
            .await
            .unwrap();

        let results = provider.search_by_vector(&user, &agent, &close, 5).await.unwrap();
        assert_eq!(results[0].content, "close");
    }

    #[tokio::test]
    async fn hybrid_search_fuses_vector_and_text_matches() {
        let provider = MemoryProvider::new();
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");

        let query_embedding = Embedding { model: "m".into(), vector: vec![1.0, 0.0] };
        provider
            .store_with_embedding(&user, &agent, memory("keyword match only"), Embedding { model: "m".into(), vector: vec![0.0, 1.0] })
            .await
            .unwrap();
        provider
            .store_with_embedding(&user, &agent, memory("vector match only"), query_embedding.clone())
            .await
            .unwrap();

        let opts = HybridSearchOptions {
            vector_threshold: 1.0,
            ..Default::default()
        };
        let results = provider
            .hybrid_search(&user, &agent, "keyword", &query_embedding, &opts)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn find_similar_excludes_the_seed_memory() {
        let provider = MemoryProvider::new();
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");
        let embedding = Embedding { model: "m".into(), vector: vec![1.0, 0.0] };
        let seed = provider
            .store_with_embedding(&user, &agent, memory("seed"), embedding.clone())
            .await
            .unwrap();
        provider
            .store_with_embedding(&user, &agent, memory("twin"), embedding)
            .await
            .unwrap();

        let results = provider.find_similar(&user, &agent, &seed, 10).await.unwrap();
        assert!(results.iter().all(|r| r.content != "seed"));
    }

    #[tokio::test]
    async fn get_embedding_returns_none_for_non_vector_memory() {
        let provider = MemoryProvider::new();
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");
        let id = MemoryOps::store(&provider, &user, &agent, memory("plain")).await.unwrap();
        assert!(provider.get_embedding(&user, &id).await.unwrap().is_none());
    }
}
