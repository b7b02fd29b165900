//! # agentdock-core — shared data model for the AgentDock-Core runtime
//!
//! This crate defines the identifiers, error kinds, and data model shared
//! by every other `agentdock-*` crate: session state, orchestration
//! configuration, and the memory record/connection types.
//!
//! ## Layout
//!
//! | Module | What it defines |
//! |--------|------------------|
//! | [`id`] | Typed id newtypes (`UserId`, `AgentId`, `SessionId`, ...) |
//! | [`error`] | The six error kinds of spec §7, plus [`error::CoreError`] |
//! | [`session`] | [`session::SessionState`] and its public view |
//! | [`orchestration_config`] | [`orchestration_config::OrchestrationConfig`], steps, conditions |
//! | [`memory`] | [`memory::MemoryRecord`], tiers, connections |
//! | [`cancel`] | Cooperative cancellation token plumbing |
//!
//! ## Design principle
//!
//! This crate holds data and errors only — no I/O, no async traits. Every
//! other crate in the workspace depends on it; it depends on nothing
//! workspace-internal. This keeps the dependency graph a DAG rooted here,
//! the way `layer0` roots the teacher workspace.

#![deny(missing_docs)]

pub mod cancel;
pub mod error;
pub mod id;
pub mod memory;
pub mod orchestration_config;
pub mod session;

pub use error::{
    CapabilityMissing, Cancelled, CoreError, CoreResult, DecodeError, StorageError,
    TenancyViolation, ValidationError,
};
pub use id::{AgentId, BatchId, MemoryId, SessionId, ToolId, UserId};
pub use memory::{ConnectionType, EmbeddingRef, ExtractionMethod, MemoryConnection, MemoryRecord, Tier};
pub use orchestration_config::{AvailableTools, Condition, OrchestrationConfig, Step};
pub use session::{PublicSessionView, SessionState, TokenUsage};
