//! The `MemoryOps` half of [`crate::MemoryProvider`] — spec §4.2.
//!
//! Grounded on `neuron-state-memory::MemoryStore` for the
//! `RwLock<HashMap<..>>` shape, generalized from a flat KV store to the
//! richer memory record + connection graph the spec requires.

use agentdock_core::{
    AgentId, ConnectionType, EmbeddingRef, MemoryConnection, MemoryId, MemoryRecord, StorageError,
    UserId,
};
use agentdock_storage::{ConnectedResult, DecayOutcome, DecayRules, MemoryPatch, MemoryStats, NewMemory, RecallOptions};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;

/// Composite relevance score from spec §4.2: weighted importance,
/// resonance, and recency, favoring memories accessed recently.
fn relevance_score(record: &MemoryRecord, now: chrono::DateTime<Utc>) -> f64 {
    let age_days = record.age_days_since_last_access(now);
    0.3 * record.importance + 0.2 * record.resonance + 0.5 * (1.0 / (1.0 + age_days))
}

pub(crate) struct MemoryGraph {
    records: RwLock<HashMap<MemoryId, MemoryRecord>>,
    connections: RwLock<HashMap<(MemoryId, MemoryId), MemoryConnection>>,
}

impl MemoryGraph {
    pub(crate) fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn store(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        memory: NewMemory,
    ) -> Result<MemoryId, StorageError> {
        let id = MemoryId::new(uuid::Uuid::new_v4().to_string());
        let now = Utc::now();
        let record = MemoryRecord {
            id: id.clone(),
            user_id: user_id.clone(),
            agent_id: agent_id.clone(),
            content: memory.content,
            tier: memory.tier,
            importance: memory.importance,
            resonance: memory.importance,
            access_count: 0,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            session_id: memory.session_id,
            keywords: memory.keywords,
            metadata: memory.metadata,
            extraction_method: memory.extraction_method,
            token_count: memory.token_count,
            batch_id: memory.batch_id,
            source_message_ids: memory.source_message_ids,
            embedding: None,
        };
        self.records.write().await.insert(id.clone(), record);
        Ok(id)
    }

    pub(crate) async fn recall(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: &str,
        opts: &RecallOptions,
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let now = Utc::now();
        let query_lower = query.to_lowercase();
        let mut matched: Vec<MemoryId> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|r| &r.user_id == user_id && &r.agent_id == agent_id)
                .filter(|r| opts.tiers.is_empty() || opts.tiers.contains(&r.tier))
                .filter(|r| opts.min_importance.is_none_or(|min| r.importance >= min))
                .filter(|r| opts.min_resonance.is_none_or(|min| r.resonance >= min))
                .filter(|r| {
                    opts.keywords.is_empty()
                        || opts.keywords.iter().any(|k| r.keywords.contains(k))
                })
                .filter(|r| {
                    opts.time_range
                        .is_none_or(|(start, end)| r.created_at >= start && r.created_at <= end)
                })
                .filter(|r| opts.session_id.as_ref().is_none_or(|sid| r.session_id.as_ref() == Some(sid)))
                .filter(|r| {
                    query_lower.is_empty()
                        || r.content.to_lowercase().contains(&query_lower)
                        || r.keywords.iter().any(|k| k.to_lowercase() == query_lower)
                })
                .map(|r| r.id.clone())
                .collect()
        };

        {
            let records = self.records.read().await;
            matched.sort_by(|a, b| {
                let ra = &records[a];
                let rb = &records[b];
                relevance_score(rb, now)
                    .partial_cmp(&relevance_score(ra, now))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| rb.created_at.cmp(&ra.created_at))
            });
        }
        matched.truncate(opts.limit);

        if opts.update_access_stats {
            let mut records = self.records.write().await;
            for id in &matched {
                if let Some(r) = records.get_mut(id) {
                    r.access_count += 1;
                    r.last_accessed_at = now;
                }
            }
        }

        let records = self.records.read().await;
        Ok(matched.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    pub(crate) async fn update(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        id: &MemoryId,
        patch: MemoryPatch,
    ) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .filter(|r| &r.user_id == user_id && &r.agent_id == agent_id)
            .ok_or_else(|| StorageError::Other(format!("memory {id} not found")))?;
        if let Some(content) = patch.content {
            record.content = content;
        }
        if let Some(importance) = patch.importance {
            record.importance = importance;
        }
        if let Some(keywords) = patch.keywords {
            record.keywords = keywords;
        }
        if let Some(metadata) = patch.metadata {
            record.metadata.extend(metadata);
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) async fn delete(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        id: &MemoryId,
    ) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let removed = match records.get(id) {
            Some(r) if &r.user_id == user_id && &r.agent_id == agent_id => {
                records.remove(id);
                true
            }
            _ => false,
        };
        drop(records);
        if removed {
            let mut connections = self.connections.write().await;
            connections.retain(|(src, dst), _| src != id && dst != id);
        }
        Ok(removed)
    }

    pub(crate) async fn get_by_id(
        &self,
        user_id: &UserId,
        id: &MemoryId,
    ) -> Result<Option<MemoryRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(id).filter(|r| &r.user_id == user_id).cloned())
    }

    /// All memory ids owned by `(user_id, agent_id)` — used by the vector
    /// search paths to build their candidate set.
    pub(crate) async fn ids_for(&self, user_id: &UserId, agent_id: &AgentId) -> Vec<MemoryId> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| &r.user_id == user_id && &r.agent_id == agent_id)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Attach (or replace) a memory's embedding reference.
    pub(crate) async fn set_embedding_ref(&self, id: &MemoryId, embedding_ref: EmbeddingRef) {
        if let Some(record) = self.records.write().await.get_mut(id) {
            record.embedding = Some(embedding_ref);
        }
    }

    pub(crate) async fn get_stats(
        &self,
        user_id: &UserId,
        agent_id: Option<&AgentId>,
    ) -> Result<MemoryStats, StorageError> {
        let records = self.records.read().await;
        let matching: Vec<&MemoryRecord> = records
            .values()
            .filter(|r| &r.user_id == user_id)
            .filter(|r| agent_id.is_none_or(|a| &r.agent_id == a))
            .collect();

        let count = matching.len() as u64;
        let mut count_by_tier = HashMap::new();
        let mut importance_sum = 0.0;
        let mut size_bytes = 0u64;
        for r in &matching {
            *count_by_tier.entry(r.tier).or_insert(0u64) += 1;
            importance_sum += r.importance;
            size_bytes += r.content.len() as u64;
        }
        let avg_importance = if count > 0 { importance_sum / count as f64 } else { 0.0 };

        Ok(MemoryStats {
            count,
            count_by_tier,
            avg_importance,
            size_bytes,
        })
    }

    pub(crate) async fn apply_decay(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        rules: DecayRules,
    ) -> Result<DecayOutcome, StorageError> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let ids: Vec<MemoryId> = records
            .values()
            .filter(|r| &r.user_id == user_id && &r.agent_id == agent_id)
            .map(|r| r.id.clone())
            .collect();

        let mut outcome = DecayOutcome::default();
        let mut to_remove = Vec::new();
        for id in &ids {
            let record = records.get_mut(id).expect("id collected from same map");
            let age_days = record.age_days_since_last_access(now);
            let new_resonance = record.resonance * (-rules.rate * age_days).exp()
                + record.importance * rules.importance_weight
                + (record.access_count as f64 + 1.0).ln() * rules.access_boost;
            record.resonance = new_resonance.max(0.0);
            outcome.processed += 1;

            if record.resonance <= rules.floor && !record.tier.exempt_from_eviction() {
                to_remove.push(id.clone());
                outcome.removed += 1;
            } else {
                outcome.decayed += 1;
            }
        }
        for id in &to_remove {
            records.remove(id);
        }
        drop(records);
        if !to_remove.is_empty() {
            let mut connections = self.connections.write().await;
            connections.retain(|(src, dst), _| !to_remove.contains(src) && !to_remove.contains(dst));
        }
        Ok(outcome)
    }

    pub(crate) async fn create_connections(
        &self,
        user_id: &UserId,
        connections: Vec<MemoryConnection>,
    ) -> Result<(), StorageError> {
        let records = self.records.read().await;
        for conn in &connections {
            let source_ok = records.get(&conn.source_id).is_some_and(|r| &r.user_id == user_id);
            let target_ok = records.get(&conn.target_id).is_some_and(|r| &r.user_id == user_id);
            if !source_ok || !target_ok {
                return Err(StorageError::Other(format!(
                    "connection endpoints must both belong to user {user_id}"
                )));
            }
        }
        drop(records);

        let mut store = self.connections.write().await;
        for conn in connections {
            let key = (conn.source_id.clone(), conn.target_id.clone());
            store
                .entry(key)
                .and_modify(|existing| {
                    if conn.strength > existing.strength {
                        existing.strength = conn.strength;
                    }
                })
                .or_insert(conn);
        }
        Ok(())
    }

    pub(crate) async fn find_connected(
        &self,
        user_id: &UserId,
        memory_id: &MemoryId,
        depth: u32,
        min_strength: f64,
    ) -> Result<ConnectedResult, StorageError> {
        let records = self.records.read().await;
        let connections = self.connections.read().await;

        // Connections are directed, but reachability for this traversal is
        // treated as undirected: an edge a->b also lets b reach a, while the
        // returned connection list keeps the original direction.
        let mut adjacency: HashMap<&MemoryId, Vec<&MemoryConnection>> = HashMap::new();
        for conn in connections.values() {
            if conn.strength < min_strength {
                continue;
            }
            adjacency.entry(&conn.source_id).or_default().push(conn);
            adjacency.entry(&conn.target_id).or_default().push(conn);
        }

        let mut visited: HashSet<MemoryId> = HashSet::new();
        let mut touched_connections: Vec<MemoryConnection> = Vec::new();
        visited.insert(memory_id.clone());

        let mut frontier: VecDeque<(MemoryId, u32)> = VecDeque::new();
        frontier.push_back((memory_id.clone(), 0));

        while let Some((current, current_depth)) = frontier.pop_front() {
            if current_depth >= depth {
                continue;
            }
            let Some(edges) = adjacency.get(&current) else {
                continue;
            };
            for conn in edges {
                let neighbor = if conn.source_id == current {
                    &conn.target_id
                } else {
                    &conn.source_id
                };
                touched_connections.push((*conn).clone());
                if visited.insert(neighbor.clone()) {
                    frontier.push_back((neighbor.clone(), current_depth + 1));
                }
            }
        }

        touched_connections.sort_by(|a, b| {
            (a.source_id.as_str(), a.target_id.as_str()).cmp(&(b.source_id.as_str(), b.target_id.as_str()))
        });
        touched_connections.dedup_by(|a, b| a.source_id == b.source_id && a.target_id == b.target_id);

        let memories: Vec<MemoryRecord> = visited
            .iter()
            .filter_map(|id| records.get(id))
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();

        Ok(ConnectedResult {
            memories,
            connections: touched_connections,
        })
    }
}
