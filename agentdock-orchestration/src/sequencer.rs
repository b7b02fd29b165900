//! C4 — ordered-tool-sequence half of tool filtering (spec §4.4).

use agentdock_core::orchestration_config::Step;
use agentdock_core::{SessionId, StorageError, ToolId};
use agentdock_session::SessionStateManager;

/// Filters and advances a step's ordered tool sequence.
///
/// Stateless: the session's `sequence_index` is passed in and read back out
/// by the caller (usually [`crate::OrchestrationManager`]), which owns
/// persisting it.
pub struct StepSequencer;

impl StepSequencer {
    /// The tools usable right now for a step with a non-empty `sequence`:
    /// exactly the single tool at `sequence_index`, intersected with
    /// `all_tool_ids`. An index past the end of the sequence means the step
    /// is exhausted and yields no tools.
    pub fn filter_tools_by_sequence(
        step: &Step,
        sequence_index: usize,
        all_tool_ids: &[ToolId],
    ) -> Vec<ToolId> {
        match step.sequence.get(sequence_index) {
            Some(tool) if all_tool_ids.contains(tool) => vec![tool.clone()],
            _ => Vec::new(),
        }
    }

    /// Advance `index` if `tool_id` equals `sequence[*index]`. No rewind: a
    /// mismatched tool leaves `index` untouched.
    pub fn advance_index(sequence: &[ToolId], index: &mut usize, tool_id: &ToolId) {
        if sequence.get(*index) == Some(tool_id) {
            *index += 1;
        }
    }

    /// Advance a session's sequence index for `step`, persisting the
    /// change through `sessions`. Provided for callers that react to tool
    /// use independently of [`crate::OrchestrationManager::on_tool_used`];
    /// the manager itself folds this logic into a single update alongside
    /// recording the tool use (spec §4.5 ordering guarantee).
    pub async fn advance(
        step: &Step,
        session_id: &SessionId,
        tool_id: &ToolId,
        sessions: &SessionStateManager,
    ) -> Result<(), StorageError> {
        let sequence = step.sequence.clone();
        let tool_id = tool_id.clone();
        sessions
            .update(session_id, move |s| {
                Self::advance_index(&sequence, &mut s.sequence_index, &tool_id);
            })
            .await?;
        Ok(())
    }
}
