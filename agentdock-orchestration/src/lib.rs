//! # agentdock-orchestration — per-session step state machine (spec §4.4, §4.5)
//!
//! Two pieces sit on top of [`agentdock_session::SessionStateManager`]:
//!
//! - [`StepSequencer`] — the ordered-tool-sequence half of tool filtering
//!   (`filter_tools_by_sequence`, `advance_index`/`advance`).
//! - [`OrchestrationManager`] — resolves the active step from an
//!   `OrchestrationConfig` and a session's recently-used tools, filters the
//!   tool catalog for that step, and reacts to tool use and token usage.
//!
//! Structurally this replaces the teacher's multi-agent dispatcher
//! (`HashMap`-keyed registry of `Arc<dyn Operator>`, `dispatch` fan-out to
//! external agents) with a single-session step machine — a different
//! contract under the same name (see `DESIGN.md`).

#![deny(missing_docs)]

mod config;
mod sequencer;

pub use config::OrchestrationManagerConfig;
pub use sequencer::StepSequencer;

use agentdock_core::orchestration_config::{Condition, OrchestrationConfig, Step};
use agentdock_core::{SessionId, StorageError, TokenUsage, ToolId};
use agentdock_session::SessionStateManager;
use std::sync::Arc;
use tracing::debug;

/// Resolves the active step, filters tools, and tracks tool/token use for a
/// session, all driven by a caller-supplied [`OrchestrationConfig`].
///
/// The configuration itself is read-only input (spec §3) and is never
/// persisted by this type — only the per-session outcomes (`active_step`,
/// `sequence_index`, `recently_used_tools`, `cumulative_token_usage`) live
/// in the session store.
pub struct OrchestrationManager {
    sessions: Arc<SessionStateManager>,
    config: OrchestrationManagerConfig,
}

impl OrchestrationManager {
    /// Build a manager over an existing session store.
    pub fn new(sessions: Arc<SessionStateManager>, config: OrchestrationManagerConfig) -> Self {
        Self { sessions, config }
    }

    /// Ensure a session exists, creating it (in the `no-step` initial state)
    /// if absent.
    pub async fn ensure_state(&self, session_id: &SessionId) -> Result<(), StorageError> {
        self.sessions.get_or_create(session_id).await?;
        Ok(())
    }

    /// Resolve the active step for a session against `cfg`.
    ///
    /// Considers every non-default step with at least one condition whose
    /// conditions all hold against the session's `recently_used_tools`
    /// (`recently_used_tools` is most-recent-first). Among those candidates,
    /// the one whose `ToolUsed` condition was satisfied most recently wins —
    /// not declaration order — since a later tool use supersedes an earlier
    /// step trigger even if that step is declared first. A step with several
    /// conditions is ranked by its most recently satisfied one (the smallest
    /// `recently_used_tools` index among them), since that's the use that
    /// completed the step's trigger. Ties fall back to declaration order.
    /// The winning step is persisted if it differs from the
    /// currently-recorded active step. If no step matches: the
    /// currently-persisted active step is reused if it still exists in
    /// `cfg`, else the configuration's default step is used, else there is
    /// no active step.
    pub async fn resolve_step(
        &self,
        cfg: &OrchestrationConfig,
        session_id: &SessionId,
    ) -> Result<Option<Step>, StorageError> {
        let state = self.sessions.get_or_create(session_id).await?;

        let matched = cfg
            .steps
            .iter()
            .filter(|step| {
                !step.is_default
                    && !step.conditions.is_empty()
                    && step.conditions_met(&state.recently_used_tools)
            })
            .min_by_key(|step| {
                step.conditions
                    .iter()
                    .filter_map(|c| match c {
                        Condition::ToolUsed { tool } => {
                            state.recently_used_tools.iter().position(|t| t == tool)
                        }
                    })
                    .min()
                    .unwrap_or(usize::MAX)
            });

        let resolved = match matched {
            Some(step) => Some(step.clone()),
            None => match state.active_step.as_deref().and_then(|name| cfg.find(name)) {
                Some(step) => Some(step.clone()),
                None => cfg.default_step().cloned(),
            },
        };

        if let Some(step) = &resolved {
            if state.active_step.as_deref() != Some(step.name.as_str()) {
                debug!(
                    session = %session_id,
                    from = ?state.active_step,
                    to = %step.name,
                    "orchestration step transition"
                );
                let name = step.name.clone();
                self.sessions
                    .update(session_id, move |s| s.active_step = Some(name))
                    .await?;
            }
        }

        Ok(resolved)
    }

    /// Filter `all_tool_ids` down to what's usable in a session's active
    /// step. With no active step, the catalog is returned unchanged — there
    /// is nothing yet to restrict against.
    ///
    /// 1. Non-empty `step.sequence` → delegate to [`StepSequencer`].
    /// 2. Else non-empty `available_tools.allowed` → intersect.
    /// 3. Else non-empty `available_tools.denied` → subtract.
    /// 4. Else → unchanged.
    pub async fn allowed_tools(
        &self,
        cfg: &OrchestrationConfig,
        session_id: &SessionId,
        all_tool_ids: &[ToolId],
    ) -> Result<Vec<ToolId>, StorageError> {
        let Some(step) = self.resolve_step(cfg, session_id).await? else {
            return Ok(all_tool_ids.to_vec());
        };

        if !step.sequence.is_empty() {
            let state = self.sessions.get_or_create(session_id).await?;
            return Ok(StepSequencer::filter_tools_by_sequence(
                &step,
                state.sequence_index,
                all_tool_ids,
            ));
        }

        let Some(available) = &step.available_tools else {
            return Ok(all_tool_ids.to_vec());
        };

        if !available.allowed.is_empty() {
            return Ok(all_tool_ids
                .iter()
                .filter(|t| available.allowed.contains(t))
                .cloned()
                .collect());
        }

        if !available.denied.is_empty() {
            return Ok(all_tool_ids
                .iter()
                .filter(|t| !available.denied.contains(t))
                .cloned()
                .collect());
        }

        Ok(all_tool_ids.to_vec())
    }

    /// React to a tool having been used: record it in `recently_used_tools`
    /// (de-duplicated, bounded to `recentToolsCap`) and advance the active
    /// step's sequence, in a single serialized session update — `advance`
    /// must observe the same update that recorded the tool's use, not a
    /// prior one.
    pub async fn on_tool_used(
        &self,
        cfg: &OrchestrationConfig,
        session_id: &SessionId,
        tool_id: &ToolId,
    ) -> Result<(), StorageError> {
        let state = self.sessions.get_or_create(session_id).await?;
        let sequence = state
            .active_step
            .as_deref()
            .and_then(|name| cfg.find(name))
            .map(|step| step.sequence.clone())
            .unwrap_or_default();

        let cap = self.config.recent_tools_cap;
        let tool_id = tool_id.clone();
        self.sessions
            .update(session_id, move |s| {
                s.record_tool_use(tool_id.clone(), cap);
                StepSequencer::advance_index(&sequence, &mut s.sequence_index, &tool_id);
            })
            .await?;
        Ok(())
    }

    /// Add a turn's (prompt, completion, total) token counts to the
    /// session's running totals.
    pub async fn add_cumulative_tokens(
        &self,
        session_id: &SessionId,
        usage: TokenUsage,
    ) -> Result<(), StorageError> {
        self.sessions
            .update(session_id, move |s| s.cumulative_token_usage.add(usage))
            .await?;
        Ok(())
    }

    /// Reset a session's orchestration state back to `no-step`, keeping its
    /// id.
    pub async fn reset(&self, session_id: &SessionId) -> Result<(), StorageError> {
        self.sessions.reset_state(session_id).await?;
        Ok(())
    }

    /// Remove a session's orchestration state entirely.
    pub async fn remove(&self, session_id: &SessionId) -> Result<(), StorageError> {
        self.sessions.cleanup_session(session_id).await
    }
}
