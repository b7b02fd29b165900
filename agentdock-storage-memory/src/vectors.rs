//! The `VectorOps` half of [`crate::MemoryProvider`] — spec §4.2 "Vector-
//! capable variant".
//!
//! Candidate ranking is plain cosine similarity; `search_by_text` defers
//! entirely to [`crate::memories::MemoryGraph::recall`]; `hybrid_search`
//! fuses the two rankings with reciprocal rank fusion (k=60), the
//! standard constant from the original RRF paper and the one the spec
//! calls for.

use agentdock_core::{EmbeddingRef, MemoryId};
use agentdock_storage::Embedding;
use std::collections::HashMap;
use tokio::sync::RwLock;

const RRF_K: f64 = 60.0;

pub(crate) struct VectorStore {
    embeddings: RwLock<HashMap<MemoryId, (EmbeddingRef, Embedding)>>,
}

impl VectorStore {
    pub(crate) fn new() -> Self {
        Self {
            embeddings: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn set(&self, id: MemoryId, embedding: Embedding) -> EmbeddingRef {
        let embedding_ref = EmbeddingRef {
            id: format!("emb-{id}"),
            model: embedding.model.clone(),
            dimension: embedding.vector.len(),
        };
        self.embeddings
            .write()
            .await
            .insert(id, (embedding_ref.clone(), embedding));
        embedding_ref
    }

    pub(crate) async fn get_ref(&self, id: &MemoryId) -> Option<EmbeddingRef> {
        self.embeddings.read().await.get(id).map(|(r, _)| r.clone())
    }

    pub(crate) async fn get_vector(&self, id: &MemoryId) -> Option<Embedding> {
        self.embeddings.read().await.get(id).map(|(_, e)| e.clone())
    }

    /// Rank `candidate_ids` by cosine similarity to `query`, filtered to
    /// `similarity >= min_similarity`, descending.
    pub(crate) async fn rank(
        &self,
        query: &Embedding,
        candidate_ids: &[MemoryId],
        min_similarity: f64,
    ) -> Vec<(MemoryId, f64)> {
        let embeddings = self.embeddings.read().await;
        let mut ranked: Vec<(MemoryId, f64)> = candidate_ids
            .iter()
            .filter_map(|id| embeddings.get(id).map(|(_, e)| (id.clone(), query.cosine_similarity(e))))
            .filter(|(_, score)| *score >= min_similarity)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Fuse two independently-ranked id lists via reciprocal rank fusion:
/// `score(id) = sum over lists containing id of weight / (k + rank)`.
pub(crate) fn reciprocal_rank_fusion(
    vector_ranked: &[MemoryId],
    vector_weight: f64,
    text_ranked: &[MemoryId],
    text_weight: f64,
) -> Vec<(MemoryId, f64)> {
    let mut scores: HashMap<MemoryId, f64> = HashMap::new();
    for (rank, id) in vector_ranked.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += vector_weight / (RRF_K + rank as f64 + 1.0);
    }
    for (rank, id) in text_ranked.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += text_weight / (RRF_K + rank as f64 + 1.0);
    }
    let mut fused: Vec<(MemoryId, f64)> = scores.into_iter().collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rank_orders_by_similarity_descending() {
        let store = VectorStore::new();
        let a = MemoryId::new("a");
        let b = MemoryId::new("b");
        store
            .set(a.clone(), Embedding { model: "m".into(), vector: vec![1.0, 0.0] })
            .await;
        store
            .set(b.clone(), Embedding { model: "m".into(), vector: vec![0.0, 1.0] })
            .await;

        let query = Embedding { model: "m".into(), vector: vec![0.9, 0.1] };
        let ranked = store.rank(&query, &[a.clone(), b.clone()], 0.0).await;
        assert_eq!(ranked[0].0, a);
    }

    #[tokio::test]
    async fn rank_filters_below_min_similarity() {
        let store = VectorStore::new();
        let a = MemoryId::new("a");
        store
            .set(a.clone(), Embedding { model: "m".into(), vector: vec![1.0, 0.0] })
            .await;
        let query = Embedding { model: "m".into(), vector: vec![0.0, 1.0] };
        let ranked = store.rank(&query, &[a], 0.5).await;
        assert!(ranked.is_empty());
    }

    #[test]
    fn rrf_favors_items_ranked_highly_in_both_lists() {
        let a = MemoryId::new("a");
        let b = MemoryId::new("b");
        let c = MemoryId::new("c");
        let vector_ranked = vec![a.clone(), b.clone(), c.clone()];
        let text_ranked = vec![b.clone(), a.clone(), c.clone()];
        let fused = reciprocal_rank_fusion(&vector_ranked, 0.7, &text_ranked, 0.3);
        // a is #1 in vector, #2 in text; b is #2 in vector, #1 in text.
        // With vector weighted higher, a should come out ahead.
        assert_eq!(fused[0].0, a);
    }
}
