//! C6 — cross-tier recall fusion (spec §4.6).

use agentdock_core::{AgentId, MemoryId, MemoryRecord, StorageError, Tier, UserId};
use agentdock_storage::{Embedding, MemoryOps, RecallOptions, StorageProvider, VectorOps};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const RRF_K: f64 = 60.0;

/// Weights for RecallService's own four-signal composite score. Distinct
/// from `agentdock_storage::HybridWeights`, which only fuses a backend's
/// vector and lexical *candidate lists*; this is the re-scoring pass spec
/// §6's `recall.hybridWeights.{vector,text,temporal,procedural}` describes,
/// applied once both candidate lists are in hand.
#[derive(Debug, Clone, Copy)]
pub struct RecallWeights {
    /// Weight applied to a record's reciprocal rank in the vector-ranked list.
    pub vector: f64,
    /// Weight applied to a record's reciprocal rank in the lexical-ranked list.
    pub text: f64,
    /// Weight applied to recency (`1 / (1 + age_days)`).
    pub temporal: f64,
    /// Weight applied when a record's tier is `Procedural`.
    pub procedural: f64,
}

impl Default for RecallWeights {
    fn default() -> Self {
        Self {
            vector: 0.5,
            text: 0.3,
            temporal: 0.15,
            procedural: 0.05,
        }
    }
}

/// Construction-time options for [`RecallService`].
#[derive(Debug, Clone)]
pub struct RecallConfig {
    /// Composite re-scoring weights.
    pub weights: RecallWeights,
    /// Default result cap.
    pub limit: usize,
    /// Default minimum composite score to keep a result.
    pub min_relevance: f64,
    /// Default `findConnected` expansion depth when `include_related` is set.
    pub max_related_depth: u32,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            weights: RecallWeights::default(),
            limit: 20,
            min_relevance: 0.0,
            max_related_depth: 1,
        }
    }
}

/// A recall request (spec §4.6 input).
#[derive(Debug, Clone, Default)]
pub struct RecallQuery {
    /// Free-text query.
    pub query: String,
    /// Restrict to these tiers; empty means all tiers.
    pub memory_tiers: Vec<Tier>,
    /// Override the service's default result cap.
    pub limit: Option<usize>,
    /// Override the service's default minimum composite score.
    pub min_relevance: Option<f64>,
    /// Restrict to records created within `[start, end]`.
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Expand top results via `findConnected`.
    pub include_related: bool,
    /// Precomputed query embedding. Embedding generation is an external
    /// collaborator (spec Non-goals: no model inference) — callers that
    /// want the vector path supply one; without it, recall is lexical-only.
    pub query_embedding: Option<Embedding>,
}

/// Orchestrates cross-tier recall: queries the vector and lexical paths
/// independently so each can fail without taking the other down (spec §8
/// property 8, "hybrid-recall fallback"), re-scores the union under
/// [`RecallWeights`], filters by `min_relevance`, and optionally expands
/// top results through the connection graph.
pub struct RecallService {
    provider: Arc<dyn StorageProvider>,
    config: RecallConfig,
}

impl RecallService {
    /// Build a recall service over a storage provider. `provider` need not
    /// be vector-capable — recall degrades to the lexical path if
    /// `as_vector_ops` returns `None`.
    pub fn new(provider: Arc<dyn StorageProvider>, config: RecallConfig) -> Self {
        Self { provider, config }
    }

    /// Run a cross-tier recall.
    pub async fn recall(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: RecallQuery,
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let limit = query.limit.unwrap_or(self.config.limit);
        let min_relevance = query.min_relevance.unwrap_or(self.config.min_relevance);
        let wide_limit = limit.saturating_mul(3).max(limit);

        let opts = RecallOptions {
            tiers: query.memory_tiers.clone(),
            time_range: query.time_range,
            limit: wide_limit,
            ..Default::default()
        };

        let (vector_ranked, text_ranked) = self
            .candidate_lists(user_id, agent_id, &query, &opts, wide_limit)
            .await?;

        let mut scored = self.fuse(&vector_ranked, &text_ranked);
        scored.retain(|(record, _)| {
            query.memory_tiers.is_empty() || query.memory_tiers.contains(&record.tier)
        });
        scored.retain(|(_, score)| *score >= min_relevance);
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let mut results: Vec<MemoryRecord> = scored.into_iter().map(|(r, _)| r).collect();

        if query.include_related {
            self.expand_related(user_id, &mut results).await?;
        }

        Ok(results)
    }

    /// Run the vector and lexical candidate searches independently,
    /// falling back per spec §8 property 8: a path that errors is treated
    /// as empty rather than failing the whole recall, and if both the
    /// vector-capable paths are unavailable or fail, plain `MemoryOps::recall`
    /// is the final fallback.
    async fn candidate_lists(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &RecallQuery,
        opts: &RecallOptions,
        wide_limit: usize,
    ) -> Result<(Vec<MemoryRecord>, Vec<MemoryRecord>), StorageError> {
        let Some(vector_ops) = self.provider.as_vector_ops() else {
            let memory_ops = self
                .provider
                .as_memory_ops()
                .ok_or_else(|| StorageError::Other("provider implements neither MemoryOps nor VectorOps".into()))?;
            let fallback = memory_ops.recall(user_id, agent_id, &query.query, opts).await?;
            return Ok((Vec::new(), fallback));
        };

        let vector_result = match &query.query_embedding {
            Some(embedding) => vector_ops
                .search_by_vector(user_id, agent_id, embedding, wide_limit)
                .await,
            None => Ok(Vec::new()),
        };
        let text_result = vector_ops.search_by_text(user_id, agent_id, &query.query, opts).await;

        match (vector_result, text_result) {
            (Ok(v), Ok(t)) => Ok((v, t)),
            (Err(e), Ok(t)) => {
                debug!(error = %e, "vector recall path failed, falling back to lexical only");
                Ok((Vec::new(), t))
            }
            (Ok(v), Err(e)) => {
                debug!(error = %e, "lexical recall path failed, falling back to vector only");
                Ok((v, Vec::new()))
            }
            (Err(ve), Err(te)) => {
                debug!(vector_error = %ve, text_error = %te, "both recall paths failed, falling back to plain recall");
                let Some(memory_ops) = self.provider.as_memory_ops() else {
                    return Err(te);
                };
                let fallback = memory_ops.recall(user_id, agent_id, &query.query, opts).await?;
                Ok((Vec::new(), fallback))
            }
        }
    }

    /// Combine the two ranked lists into one scored set. A record present
    /// in only one list is scored on that list's terms alone — reciprocal
    /// rank fusion naturally does this (a missing list contributes zero).
    fn fuse(
        &self,
        vector_ranked: &[MemoryRecord],
        text_ranked: &[MemoryRecord],
    ) -> Vec<(MemoryRecord, f64)> {
        let now = Utc::now();
        let mut rrf: HashMap<MemoryId, f64> = HashMap::new();
        for (rank, record) in vector_ranked.iter().enumerate() {
            *rrf.entry(record.id.clone()).or_insert(0.0) +=
                self.config.weights.vector / (RRF_K + rank as f64 + 1.0);
        }
        for (rank, record) in text_ranked.iter().enumerate() {
            *rrf.entry(record.id.clone()).or_insert(0.0) +=
                self.config.weights.text / (RRF_K + rank as f64 + 1.0);
        }

        let mut by_id: HashMap<MemoryId, MemoryRecord> = HashMap::new();
        for record in vector_ranked.iter().chain(text_ranked.iter()) {
            by_id.entry(record.id.clone()).or_insert_with(|| record.clone());
        }

        by_id
            .into_iter()
            .map(|(id, record)| {
                let rrf_score = rrf.get(&id).copied().unwrap_or(0.0);
                let temporal = 1.0 / (1.0 + record.age_days_since_last_access(now));
                let procedural = if record.tier == Tier::Procedural { 1.0 } else { 0.0 };
                let score = rrf_score
                    + self.config.weights.temporal * temporal
                    + self.config.weights.procedural * procedural;
                (record, score)
            })
            .collect()
    }

    /// Expand `results` in place with memories reachable from each current
    /// result via the connection graph, up to `max_related_depth`, deduped
    /// against what's already present.
    async fn expand_related(
        &self,
        user_id: &UserId,
        results: &mut Vec<MemoryRecord>,
    ) -> Result<(), StorageError> {
        let Some(memory_ops) = self.provider.as_memory_ops() else {
            return Ok(());
        };
        let mut seen: std::collections::HashSet<MemoryId> =
            results.iter().map(|r| r.id.clone()).collect();
        let seeds: Vec<MemoryId> = results.iter().map(|r| r.id.clone()).collect();

        for seed in seeds {
            let connected = memory_ops
                .find_connected(user_id, &seed, self.config.max_related_depth, 0.0)
                .await?;
            for record in connected.memories {
                if seen.insert(record.id.clone()) {
                    results.push(record);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdock_core::{ConnectionType, ExtractionMethod};
    use agentdock_storage::NewMemory;
    use agentdock_storage_memory::MemoryProvider;
    use std::collections::HashMap as StdHashMap;

    fn new_memory(content: &str, tier: Tier, importance: f64) -> NewMemory {
        NewMemory {
            content: content.into(),
            tier,
            importance,
            session_id: None,
            keywords: vec![],
            metadata: StdHashMap::new(),
            extraction_method: ExtractionMethod::Manual,
            token_count: None,
            batch_id: None,
            source_message_ids: vec![],
        }
    }

    fn embedding(vector: Vec<f32>) -> Embedding {
        Embedding {
            model: "test".into(),
            vector,
        }
    }

    #[tokio::test]
    async fn recall_without_a_query_embedding_uses_the_lexical_path_only() {
        let provider: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        let service = RecallService::new(provider.clone(), RecallConfig::default());
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");
        provider
            .as_memory_ops()
            .unwrap()
            .store(&user, &agent, new_memory("kubernetes pod scheduling", Tier::Episodic, 0.5))
            .await
            .unwrap();

        let results = service
            .recall(
                &user,
                &agent,
                RecallQuery {
                    query: "pod scheduling".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn seed_scenario_s4_vector_weight_dominates_ordering() {
        let provider: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        let vector_ops = provider.as_vector_ops().unwrap();
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");

        let m1 = vector_ops
            .store_with_embedding(
                &user,
                &agent,
                new_memory("kubernetes pod scheduling", Tier::Episodic, 0.5),
                embedding(vec![1.0, 0.0, 0.0]),
            )
            .await
            .unwrap();
        let m2 = vector_ops
            .store_with_embedding(
                &user,
                &agent,
                new_memory(
                    "kubernetes pod scheduling algorithms overview",
                    Tier::Episodic,
                    0.5,
                ),
                embedding(vec![0.0, 1.0, 0.0]),
            )
            .await
            .unwrap();

        let vector_heavy = RecallService::new(
            provider.clone(),
            RecallConfig {
                weights: RecallWeights {
                    vector: 0.7,
                    text: 0.3,
                    temporal: 0.0,
                    procedural: 0.0,
                },
                ..RecallConfig::default()
            },
        );
        let results = vector_heavy
            .recall(
                &user,
                &agent,
                RecallQuery {
                    query: "pod scheduling".into(),
                    query_embedding: Some(embedding(vec![1.0, 0.0, 0.0])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(results[0].id, m1);

        let text_heavy = RecallService::new(
            provider,
            RecallConfig {
                weights: RecallWeights {
                    vector: 0.3,
                    text: 0.7,
                    temporal: 0.0,
                    procedural: 0.0,
                },
                ..RecallConfig::default()
            },
        );
        let results = text_heavy
            .recall(
                &user,
                &agent,
                RecallQuery {
                    query: "algorithms overview".into(),
                    query_embedding: Some(embedding(vec![1.0, 0.0, 0.0])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(results[0].id, m2);
    }

    #[tokio::test]
    async fn seed_scenario_s2_isolation_returns_empty_for_other_user() {
        let provider: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        let service = RecallService::new(provider.clone(), RecallConfig::default());
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let agent = AgentId::new("a1");

        provider
            .as_memory_ops()
            .unwrap()
            .store(&alice, &agent, new_memory("alpha", Tier::Episodic, 0.5))
            .await
            .unwrap();

        let results = service
            .recall(
                &bob,
                &agent,
                RecallQuery {
                    query: "alpha".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn min_relevance_filters_out_low_scoring_results() {
        let provider: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        let service = RecallService::new(provider.clone(), RecallConfig::default());
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");
        provider
            .as_memory_ops()
            .unwrap()
            .store(&user, &agent, new_memory("alpha", Tier::Episodic, 0.5))
            .await
            .unwrap();

        let results = service
            .recall(
                &user,
                &agent,
                RecallQuery {
                    query: "alpha".into(),
                    min_relevance: Some(1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn include_related_expands_via_connection_graph() {
        let provider: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        let memory_ops = provider.as_memory_ops().unwrap();
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");

        let seed = memory_ops
            .store(&user, &agent, new_memory("seed memory", Tier::Episodic, 0.5))
            .await
            .unwrap();
        let related = memory_ops
            .store(&user, &agent, new_memory("unrelated text entirely", Tier::Episodic, 0.5))
            .await
            .unwrap();
        memory_ops
            .create_connections(
                &user,
                vec![agentdock_core::MemoryConnection {
                    source_id: seed.clone(),
                    target_id: related.clone(),
                    connection_type: ConnectionType::Related,
                    strength: 0.9,
                    reason: None,
                    created_at: Utc::now(),
                }],
            )
            .await
            .unwrap();

        let service = RecallService::new(provider, RecallConfig::default());
        let results = service
            .recall(
                &user,
                &agent,
                RecallQuery {
                    query: "seed".into(),
                    include_related: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(results.iter().any(|r| r.id == related));
    }
}
