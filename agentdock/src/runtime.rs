//! Top-level facade wiring storage, session state, orchestration, recall
//! and extraction into the in-process API a transport layer calls
//! (spec §6 "Core in-process API").

use crate::config::CoreConfig;
use agentdock_core::cancel::{self, Cancellation};
use agentdock_core::{
    AgentId, CapabilityMissing, CoreResult, MemoryRecord, OrchestrationConfig, PublicSessionView,
    SessionId, TokenUsage, ToolId, UserId,
};
use agentdock_memory::{BatchMetrics, ExtractionOrchestrator, Extractor, InboundMessage, RecallQuery, RecallService, RuleBasedExtractor};
use agentdock_orchestration::OrchestrationManager;
use agentdock_session::SessionStateManager;
use agentdock_storage::{DecayOutcome, DecayRules, MemoryOps, StorageFactory, StorageProvider};
use agentdock_storage_memory::MemoryProvider;
use std::sync::Arc;

/// Outcome of [`AgentDockCore::handle_turn`] (spec §6).
#[derive(Debug, Clone)]
pub struct HandleTurnOutcome {
    /// Name of the step resolved for this turn, if any.
    pub active_step: Option<String>,
    /// Tool catalog filtered for the resolved step.
    pub allowed_tools: Vec<ToolId>,
    /// Public view of the session after resolution.
    pub public_state: PublicSessionView,
}

/// Wires together the per-component crates into the single object a
/// transport layer holds. The [`StorageFactory`] it resolves
/// `config.storage.{backend,namespace}` against is a caller-owned,
/// explicit constructor argument (DESIGN.md: no language-level global
/// registry) — deployments that need a non-memory backend register their
/// own constructor on it before calling [`AgentDockCore::new`].
pub struct AgentDockCore {
    factory: StorageFactory,
    provider: Arc<dyn StorageProvider>,
    sessions: Arc<SessionStateManager>,
    orchestration: OrchestrationManager,
    recall_service: RecallService,
    extraction: Arc<ExtractionOrchestrator>,
    memory_decay: DecayRules,
}

impl AgentDockCore {
    /// A factory with only the built-in in-memory backend registered under
    /// the `"memory"` tag.
    pub fn default_factory() -> StorageFactory {
        let mut factory = StorageFactory::new();
        factory.register("memory", |_ns| Ok(Arc::new(MemoryProvider::new()) as Arc<dyn StorageProvider>));
        factory
    }

    /// Build a core instance from `config` and a caller-supplied factory,
    /// resolving `config.storage.{backend,namespace}` against it. Extractors
    /// run in the order given; pass an empty vec to fall back to a single
    /// [`RuleBasedExtractor`].
    pub async fn new(
        config: CoreConfig,
        factory: StorageFactory,
        extractors: Vec<Arc<dyn Extractor>>,
    ) -> CoreResult<Self> {
        let provider = factory.get_or_create(&config.storage.backend, &config.storage.namespace).await?;

        let sessions = SessionStateManager::new(
            Arc::clone(&provider),
            agentdock_session::SessionManagerConfig {
                namespace: config.storage.namespace.clone(),
                ttl_seconds: config.session.ttl_seconds,
                sweep_interval_ms: config.session.sweep_interval_ms,
                recent_tools_cap: config.orchestration.recent_tools_cap,
            },
        );
        let orchestration = OrchestrationManager::new(Arc::clone(&sessions), config.orchestration.clone());
        let recall_service = RecallService::new(Arc::clone(&provider), config.recall.clone());
        let extractors = if extractors.is_empty() {
            vec![Arc::new(RuleBasedExtractor::default()) as Arc<dyn Extractor>]
        } else {
            extractors
        };
        let extraction = ExtractionOrchestrator::new(Arc::clone(&provider), config.extraction.clone(), extractors);

        Ok(Self {
            factory,
            provider,
            sessions,
            orchestration,
            recall_service,
            extraction,
            memory_decay: config.memory_decay,
        })
    }

    /// Resolve the active step and allowed tools for the upcoming model
    /// turn, and hand `messages` to the extraction orchestrator's buffer
    /// for this `(userId, agentId)` pair.
    ///
    /// Checked against `cancel` at entry and before each storage round
    /// trip (spec §5 "every await-equivalent point checks it"); in-flight
    /// storage calls are allowed to finish rather than abort mid-write.
    pub async fn handle_turn(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        session_id: &SessionId,
        messages: Vec<InboundMessage>,
        orchestration_cfg: &OrchestrationConfig,
        all_tool_ids: &[ToolId],
        cancel: &Cancellation,
    ) -> CoreResult<HandleTurnOutcome> {
        cancel::check(cancel)?;
        self.orchestration.ensure_state(session_id).await?;
        cancel::check(cancel)?;
        let active_step = self.orchestration.resolve_step(orchestration_cfg, session_id).await?;
        let allowed_tools = self
            .orchestration
            .allowed_tools(orchestration_cfg, session_id, all_tool_ids)
            .await?;
        cancel::check(cancel)?;
        if !messages.is_empty() {
            self.extraction.ingest(user_id, agent_id, messages).await?;
        }
        let public_state = self
            .sessions
            .to_ai_view(session_id)
            .await?
            .expect("ensure_state was just called for this session");

        Ok(HandleTurnOutcome {
            active_step: active_step.map(|s| s.name),
            allowed_tools,
            public_state,
        })
    }

    /// Record that `tool_id` was observed in a model response.
    pub async fn report_tool_use(
        &self,
        session_id: &SessionId,
        tool_id: &ToolId,
        orchestration_cfg: &OrchestrationConfig,
        cancel: &Cancellation,
    ) -> CoreResult<()> {
        cancel::check(cancel)?;
        self.orchestration.on_tool_used(orchestration_cfg, session_id, tool_id).await?;
        Ok(())
    }

    /// Add a model turn's token usage to the session's running totals.
    pub async fn report_token_usage(
        &self,
        session_id: &SessionId,
        usage: TokenUsage,
        cancel: &Cancellation,
    ) -> CoreResult<()> {
        cancel::check(cancel)?;
        self.orchestration.add_cumulative_tokens(session_id, usage).await?;
        Ok(())
    }

    /// Cross-tier recall (C6).
    pub async fn recall(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        query: RecallQuery,
        cancel: &Cancellation,
    ) -> CoreResult<Vec<MemoryRecord>> {
        cancel::check(cancel)?;
        Ok(self.recall_service.recall(user_id, agent_id, query).await?)
    }

    /// Queue inbound conversation messages for extraction without going
    /// through a full model turn (e.g. backfilling history).
    pub async fn ingest(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        messages: Vec<InboundMessage>,
        cancel: &Cancellation,
    ) -> CoreResult<Option<BatchMetrics>> {
        cancel::check(cancel)?;
        Ok(self.extraction.ingest(user_id, agent_id, messages).await?)
    }

    /// Apply the configured decay rules to a user's memories, under the
    /// construction-time `memory.decay.*` settings. Not part of the spec's
    /// core in-process API — intended to be driven by a caller's own
    /// periodic scheduler, not by a model turn.
    pub async fn apply_decay(
        &self,
        user_id: &UserId,
        agent_id: &AgentId,
        cancel: &Cancellation,
    ) -> CoreResult<DecayOutcome> {
        cancel::check(cancel)?;
        let memory_ops = self.provider.as_memory_ops().ok_or(CapabilityMissing::Memory)?;
        Ok(memory_ops.apply_decay(user_id, agent_id, self.memory_decay).await?)
    }

    /// The underlying storage provider, for callers that need direct
    /// access to `MemoryOps`/`VectorOps` beyond what this facade wraps.
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// The session manager, for direct session inspection or reset.
    pub fn sessions(&self) -> &Arc<SessionStateManager> {
        &self.sessions
    }

    /// Cancel background sweepers (session TTL, extraction timeout) and
    /// tear down every provider instance the factory handed out. Call once
    /// at shutdown.
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
        self.extraction.shutdown().await;
        self.factory.shutdown().await;
    }
}
