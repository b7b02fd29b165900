//! Session record and its public view (spec §3, §6).

use crate::id::{SessionId, ToolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative token usage for a session. All fields are monotonically
/// non-decreasing across the session's lifetime (spec §8, property 6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub prompt: u64,
    /// Completion tokens.
    pub completion: u64,
    /// Total tokens (not required to equal `prompt + completion`; callers
    /// may report a provider-specific total that includes cache tokens).
    pub total: u64,
}

impl TokenUsage {
    /// Add another usage delta to this one, saturating rather than
    /// overflowing (spec §4.5 notes overflow is not expected, but
    /// saturating keeps the invariant true even under a pathological
    /// caller).
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt = self.prompt.saturating_add(other.prompt);
        self.completion = self.completion.saturating_add(other.completion);
        self.total = self.total.saturating_add(other.total);
    }
}

/// Per-session state (spec §3 "Session record").
///
/// Created implicitly on first reference by [`SessionStateManager`](../agentdock_session/index.html);
/// destroyed by TTL sweep or explicit removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Opaque session identifier.
    pub session_id: SessionId,
    /// Name of the currently active step, if any.
    pub active_step: Option<String>,
    /// Index into the active step's tool sequence.
    pub sequence_index: usize,
    /// Recently used tool ids, most-recent-first, bounded length.
    pub recently_used_tools: Vec<ToolId>,
    /// Cumulative token usage across the session's turns.
    pub cumulative_token_usage: TokenUsage,
    /// Last-accessed timestamp; updated by every mutating call.
    pub last_accessed: DateTime<Utc>,
}

impl SessionState {
    /// A freshly created, empty session state.
    pub fn new(session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            active_step: None,
            sequence_index: 0,
            recently_used_tools: Vec::new(),
            cumulative_token_usage: TokenUsage::default(),
            last_accessed: now,
        }
    }

    /// Append a tool id to the head of the recently-used list,
    /// de-duplicating and bounding to `cap` entries (spec §4.5).
    pub fn record_tool_use(&mut self, tool: ToolId, cap: usize) {
        self.recently_used_tools.retain(|t| t != &tool);
        self.recently_used_tools.insert(0, tool);
        self.recently_used_tools.truncate(cap);
    }

    /// Whether `tool` appears anywhere in the recently-used list.
    pub fn has_used(&self, tool: &ToolId) -> bool {
        self.recently_used_tools.iter().any(|t| t == tool)
    }
}

/// The subset of [`SessionState`] transports may expose to their clients
/// (spec §6 "Public session-state view"). Internal bookkeeping — raw
/// timestamps beyond what's listed here — must not leak through this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSessionView {
    /// Opaque session identifier.
    pub session_id: SessionId,
    /// Name of the currently active step, if any.
    pub active_step: Option<String>,
    /// Index into the active step's tool sequence.
    pub sequence_index: usize,
    /// Recently used tool ids, most-recent-first.
    pub recently_used_tools: Vec<ToolId>,
    /// Cumulative token usage across the session's turns.
    pub cumulative_token_usage: TokenUsage,
}

impl From<&SessionState> for PublicSessionView {
    fn from(state: &SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            active_step: state.active_step.clone(),
            sequence_index: state.sequence_index,
            recently_used_tools: state.recently_used_tools.clone(),
            cumulative_token_usage: state.cumulative_token_usage,
        }
    }
}
