//! Runtime for conversational agents: per-session orchestration state,
//! cross-tier memory recall, and batched extraction, wired behind a single
//! in-process facade (spec §6 "External interfaces").
//!
//! Each concern lives in its own crate (`agentdock-session`,
//! `agentdock-orchestration`, `agentdock-memory`, `agentdock-storage*`) and
//! can be used directly; this crate only wires them together for callers
//! that want the whole thing behind one object.

#![deny(missing_docs)]

mod config;
mod runtime;

pub use config::{CoreConfig, SessionConfig, StorageConfig};
pub use runtime::{AgentDockCore, HandleTurnOutcome};

pub use agentdock_core::cancel::Cancellation;
pub use agentdock_core::{
    AgentId, BatchId, Condition, CoreError, CoreResult, MemoryId, OrchestrationConfig,
    PublicSessionView, SessionId, Step, Tier, ToolId, UserId,
};
pub use agentdock_memory::{
    BatchMetrics, ExtractionConfig, ExtractionOrchestrator, Extractor, InboundMessage,
    RecallConfig, RecallQuery, RecallWeights, RuleBasedExtractor,
};
pub use agentdock_orchestration::OrchestrationManagerConfig;
pub use agentdock_storage::{DecayRules, StorageFactory, StorageProvider};
