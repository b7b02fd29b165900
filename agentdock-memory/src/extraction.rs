//! C7 — batched extraction orchestration (spec §4.7).

use agentdock_core::{AgentId, MemoryId, StorageError, UserId};
use agentdock_storage::{MemoryOps, NewMemory, StorageProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A single inbound message queued for extraction.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Message author role (`"user"`, `"assistant"`, ...).
    pub role: String,
    /// Message text.
    pub content: String,
    /// Caller-assigned id, carried onto any memory this message produces.
    pub message_id: String,
}

/// Construction-time options for [`ExtractionOrchestrator`].
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Fire a batch once its buffer reaches this many messages.
    pub max_batch_size: usize,
    /// Never fire purely on age below this many buffered messages.
    pub min_batch_size: usize,
    /// Fire a batch once its oldest message has waited this long.
    pub timeout_minutes: i64,
    /// Probability that a surviving batch is sampled in for extraction.
    pub extraction_rate: f64,
    /// Messages shorter than this (in chars) are dropped before sampling.
    pub min_message_length: usize,
    /// Background sweep cadence for the age-based trigger.
    pub sweep_interval_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 20,
            min_batch_size: 3,
            timeout_minutes: 30,
            extraction_rate: 0.2,
            min_message_length: 8,
            sweep_interval_ms: 60_000,
        }
    }
}

/// Metrics emitted for a batch once it has fired, been filtered, sampled
/// and (if sampled in) run through the extractor chain.
#[derive(Debug, Clone)]
pub struct BatchMetrics {
    /// Id of the fired batch.
    pub batch_id: agentdock_core::BatchId,
    /// User the batch belongs to.
    pub user_id: UserId,
    /// Agent the batch belongs to.
    pub agent_id: AgentId,
    /// Messages present when the batch fired.
    pub message_count: usize,
    /// Messages that survived `min_message_length` filtering.
    pub survived_filter: usize,
    /// Whether the batch was sampled in for extraction.
    pub sampled_in: bool,
    /// Memories written to storage by this batch.
    pub memories_produced: usize,
    /// Rough cost estimate for the extraction work performed.
    pub cost_estimate: f64,
    /// Fraction of the batch's messages that survived filtering.
    pub coverage: f64,
    /// Wall-clock duration of the batch run, in milliseconds.
    pub duration_ms: u64,
}

/// A pluggable memory extractor. Implementations are tried in order;
/// the first to return a non-empty result short-circuits the rest
/// (spec §4.7: "rule-based, small-model, large-model... first that
/// yields results short-circuits").
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable name, used only for logging.
    fn name(&self) -> &str;

    /// Produce candidate memories from a surviving, sampled-in batch.
    /// Returning an empty vec (not an error) signals "nothing found here,
    /// try the next extractor" — a genuine failure should still return `Ok`
    /// with an empty vec unless the batch itself is unusable.
    async fn extract(&self, messages: &[InboundMessage]) -> Result<Vec<NewMemory>, StorageError>;
}

/// A keyword-free, dependency-free extractor used as the default first
/// stage: every message that survived length filtering becomes one
/// episodic memory. Cheap, deterministic, and a reasonable floor when no
/// model-backed extractor is configured.
pub struct RuleBasedExtractor {
    /// Importance assigned to every produced memory.
    pub default_importance: f64,
}

impl Default for RuleBasedExtractor {
    fn default() -> Self {
        Self { default_importance: 0.4 }
    }
}

#[async_trait]
impl Extractor for RuleBasedExtractor {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn extract(&self, messages: &[InboundMessage]) -> Result<Vec<NewMemory>, StorageError> {
        Ok(messages
            .iter()
            .map(|m| NewMemory {
                content: m.content.clone(),
                tier: agentdock_core::Tier::Episodic,
                importance: self.default_importance,
                session_id: None,
                keywords: Vec::new(),
                metadata: HashMap::new(),
                extraction_method: agentdock_core::ExtractionMethod::Rules,
                token_count: None,
                batch_id: None,
                source_message_ids: vec![m.message_id.clone()],
            })
            .collect())
    }
}

struct Buffer {
    messages: Vec<InboundMessage>,
    opened_at: DateTime<Utc>,
}

impl Buffer {
    fn new() -> Self {
        Self { messages: Vec::new(), opened_at: Utc::now() }
    }
}

/// Buffers inbound messages per `(userId, agentId)` pair and fires
/// extraction batches on size, explicit request, or age, sampling
/// surviving batches against `extraction_rate` and running them through
/// an ordered list of [`Extractor`]s.
pub struct ExtractionOrchestrator {
    provider: Arc<dyn StorageProvider>,
    config: ExtractionConfig,
    extractors: Vec<Arc<dyn Extractor>>,
    buffers: Mutex<HashMap<(UserId, AgentId), Buffer>>,
    rng: Mutex<StdRng>,
    sweeper: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl ExtractionOrchestrator {
    /// Build an orchestrator with a production (entropy-seeded) RNG and
    /// spawn its age-based sweeper.
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        config: ExtractionConfig,
        extractors: Vec<Arc<dyn Extractor>>,
    ) -> Arc<Self> {
        Self::with_rng(provider, config, extractors, StdRng::from_entropy())
    }

    /// Build an orchestrator with a caller-supplied RNG seed, for
    /// deterministic sampling in tests (spec §8 property 10).
    pub fn with_seed(
        provider: Arc<dyn StorageProvider>,
        config: ExtractionConfig,
        extractors: Vec<Arc<dyn Extractor>>,
        seed: u64,
    ) -> Arc<Self> {
        Self::with_rng(provider, config, extractors, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        provider: Arc<dyn StorageProvider>,
        config: ExtractionConfig,
        extractors: Vec<Arc<dyn Extractor>>,
        rng: StdRng,
    ) -> Arc<Self> {
        let orchestrator = Arc::new(Self {
            provider,
            config,
            extractors,
            buffers: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
            sweeper: Mutex::new(None),
        });
        orchestrator.clone().spawn_sweeper();
        orchestrator
    }

    /// Append inbound messages to the buffer for `(user_id, agent_id)`,
    /// firing a batch immediately if the buffer reaches `max_batch_size`.
    pub async fn ingest(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        messages: Vec<InboundMessage>,
    ) -> Result<Option<BatchMetrics>, StorageError> {
        let should_fire = {
            let mut buffers = self.buffers.lock().await;
            let buffer = buffers
                .entry((user_id.clone(), agent_id.clone()))
                .or_insert_with(Buffer::new);
            buffer.messages.extend(messages);
            buffer.messages.len() >= self.config.max_batch_size
        };
        if should_fire {
            return self.process(user_id, agent_id).await;
        }
        Ok(None)
    }

    /// Explicitly fire whatever is currently buffered for `(user_id,
    /// agent_id)`, regardless of size or age. Returns `None` if the
    /// buffer was empty.
    pub async fn process(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
    ) -> Result<Option<BatchMetrics>, StorageError> {
        let messages = {
            let mut buffers = self.buffers.lock().await;
            match buffers.remove(&(user_id.clone(), agent_id.clone())) {
                Some(buffer) if !buffer.messages.is_empty() => buffer.messages,
                _ => return Ok(None),
            }
        };
        self.run_batch(user_id, agent_id, messages).await.map(Some)
    }

    async fn run_batch(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        messages: Vec<InboundMessage>,
    ) -> Result<BatchMetrics, StorageError> {
        let started = std::time::Instant::now();
        let batch_id = agentdock_core::BatchId::new(uuid::Uuid::new_v4().to_string());
        let message_count = messages.len();

        let filtered: Vec<InboundMessage> = messages
            .into_iter()
            .filter(|m| m.content.len() >= self.config.min_message_length)
            .collect();
        let survived_filter = filtered.len();

        let sampled_in = {
            let mut rng = self.rng.lock().await;
            rng.gen::<f64>() < self.config.extraction_rate
        };

        let mut memory_ids: Vec<MemoryId> = Vec::new();
        if sampled_in && !filtered.is_empty() {
            let memory_ops = self
                .provider
                .as_memory_ops()
                .ok_or_else(|| StorageError::Other("provider does not implement MemoryOps".into()))?;
            for extractor in &self.extractors {
                let produced = extractor.extract(&filtered).await?;
                if produced.is_empty() {
                    continue;
                }
                debug!(extractor = extractor.name(), count = produced.len(), "extractor produced memories");
                for mut memory in produced {
                    memory.batch_id = Some(batch_id.clone());
                    let id = memory_ops.store(user_id, agent_id, memory).await?;
                    memory_ids.push(id);
                }
                break;
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let coverage = if message_count == 0 {
            0.0
        } else {
            survived_filter as f64 / message_count as f64
        };
        Ok(BatchMetrics {
            batch_id,
            user_id: user_id.clone(),
            agent_id: agent_id.clone(),
            message_count,
            survived_filter,
            sampled_in,
            memories_produced: memory_ids.len(),
            cost_estimate: if sampled_in { memory_ids.len() as f64 * 0.01 } else { 0.0 },
            coverage,
            duration_ms,
        })
    }

    fn spawn_sweeper(self: Arc<Self>) {
        let token = CancellationToken::new();
        let sweep_token = token.clone();
        let interval = std::time::Duration::from_millis(self.config.sweep_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = sweep_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            warn!(error = %e, "extraction sweeper tick failed");
                        }
                    }
                }
            }
        });
        if let Ok(mut slot) = self.sweeper.try_lock() {
            *slot = Some((token, handle));
        }
    }

    async fn sweep_once(&self) -> Result<(), StorageError> {
        let due: Vec<(UserId, AgentId)> = {
            let buffers = self.buffers.lock().await;
            let now = Utc::now();
            buffers
                .iter()
                .filter(|(_, buffer)| {
                    buffer.messages.len() >= self.config.min_batch_size
                        && (now - buffer.opened_at).num_minutes() >= self.config.timeout_minutes
                })
                .map(|(key, _)| key.clone())
                .collect()
        };
        for (user_id, agent_id) in due {
            self.process(&user_id, &agent_id).await?;
        }
        Ok(())
    }

    /// Cancel the sweeper and wait for it to stop. Idempotent.
    pub async fn shutdown(&self) {
        if let Some((token, handle)) = self.sweeper.lock().await.take() {
            token.cancel();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdock_storage::StorageProvider;
    use agentdock_storage_memory::MemoryProvider;

    fn msg(content: &str) -> InboundMessage {
        InboundMessage {
            role: "user".into(),
            content: content.into(),
            message_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn provider() -> Arc<dyn StorageProvider> {
        Arc::new(MemoryProvider::new())
    }

    #[tokio::test]
    async fn buffer_fires_on_max_batch_size() {
        let orchestrator = ExtractionOrchestrator::with_seed(
            provider(),
            ExtractionConfig { max_batch_size: 2, extraction_rate: 1.0, ..Default::default() },
            vec![Arc::new(RuleBasedExtractor::default())],
            7,
        );
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");
        assert!(orchestrator
            .ingest(&user, &agent, vec![msg("hello there friend")])
            .await
            .unwrap()
            .is_none());
        let metrics = orchestrator
            .ingest(&user, &agent, vec![msg("second message arrives")])
            .await
            .unwrap()
            .expect("batch should fire at max_batch_size");
        assert_eq!(metrics.message_count, 2);
        assert!(metrics.sampled_in);
        assert_eq!(metrics.memories_produced, 2);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn short_messages_are_filtered_before_sampling() {
        let orchestrator = ExtractionOrchestrator::with_seed(
            provider(),
            ExtractionConfig { extraction_rate: 1.0, min_message_length: 50, ..Default::default() },
            vec![Arc::new(RuleBasedExtractor::default())],
            7,
        );
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");
        orchestrator.ingest(&user, &agent, vec![msg("short")]).await.unwrap();
        let metrics = orchestrator.process(&user, &agent).await.unwrap().unwrap();
        assert_eq!(metrics.survived_filter, 0);
        assert_eq!(metrics.memories_produced, 0);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn explicit_process_fires_an_under_sized_buffer() {
        let orchestrator = ExtractionOrchestrator::with_seed(
            provider(),
            ExtractionConfig { extraction_rate: 1.0, ..Default::default() },
            vec![Arc::new(RuleBasedExtractor::default())],
            7,
        );
        let user = UserId::new("u1");
        let agent = AgentId::new("a1");
        orchestrator.ingest(&user, &agent, vec![msg("one lonely message")]).await.unwrap();
        let metrics = orchestrator.process(&user, &agent).await.unwrap().unwrap();
        assert_eq!(metrics.message_count, 1);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn buffers_are_isolated_per_user() {
        let orchestrator = ExtractionOrchestrator::with_seed(
            provider(),
            ExtractionConfig { extraction_rate: 1.0, ..Default::default() },
            vec![Arc::new(RuleBasedExtractor::default())],
            7,
        );
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let agent = AgentId::new("a1");
        orchestrator.ingest(&alice, &agent, vec![msg("alice says hello")]).await.unwrap();
        assert!(orchestrator.process(&bob, &agent).await.unwrap().is_none());
        let metrics = orchestrator.process(&alice, &agent).await.unwrap().unwrap();
        assert_eq!(metrics.message_count, 1);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn seed_scenario_s5_extraction_rate_within_tolerance() {
        let orchestrator = ExtractionOrchestrator::with_seed(
            provider(),
            ExtractionConfig { extraction_rate: 0.2, min_batch_size: 1, ..Default::default() },
            vec![Arc::new(RuleBasedExtractor::default())],
            42,
        );
        let mut sampled_in_count = 0;
        for i in 0..500 {
            let user = UserId::new(format!("batch-user-{i}"));
            let agent = AgentId::new("a1");
            let metrics = orchestrator
                .process(&user, &agent)
                .await
                .unwrap();
            assert!(metrics.is_none());
            let metrics = orchestrator
                .ingest(
                    &user,
                    &agent,
                    vec![msg("message one here"), msg("message two here"), msg("message three here")],
                )
                .await
                .unwrap();
            let metrics = match metrics {
                Some(m) => m,
                None => orchestrator.process(&user, &agent).await.unwrap().unwrap(),
            };
            if metrics.sampled_in {
                sampled_in_count += 1;
            }
        }
        assert!(
            (70..=130).contains(&sampled_in_count),
            "expected between 70 and 130 sampled-in batches, got {sampled_in_count}"
        );
        orchestrator.shutdown().await;
    }
}
