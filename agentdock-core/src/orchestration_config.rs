//! Orchestration configuration — the read-only input describing a session's
//! state machine (spec §3 "Orchestration configuration").

use crate::id::ToolId;
use serde::{Deserialize, Serialize};

/// A condition that must hold for a step to activate.
///
/// `non_exhaustive` and tagged so that future variants don't break callers
/// matching on this type — the only variant the spec requires is
/// `ToolUsed`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Satisfied when `tool` appears in the session's recently-used tools.
    ToolUsed {
        /// The tool id that must have been used.
        tool: ToolId,
    },
}

/// Mutually-exclusive allow/deny lists restricting the tool catalog for a
/// step (spec §3, §4.5 "Tool filtering").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailableTools {
    /// If non-empty, only these tools are allowed.
    #[serde(default)]
    pub allowed: Vec<ToolId>,
    /// If non-empty (and `allowed` is empty), these tools are excluded.
    #[serde(default)]
    pub denied: Vec<ToolId>,
}

/// A named node in the orchestration state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique name; orchestration configuration validation rejects duplicates.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// At most one step in a configuration may set this.
    #[serde(default)]
    pub is_default: bool,
    /// Conditions that must all hold for this step to activate. A
    /// non-default step with no conditions never activates (spec §3
    /// invariant).
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Allow/deny tool restriction for this step.
    #[serde(default)]
    pub available_tools: Option<AvailableTools>,
    /// Ordered tool sequence. When present and non-empty, tool filtering
    /// delegates to the step sequencer instead of `available_tools`.
    #[serde(default)]
    pub sequence: Vec<ToolId>,
}

impl Step {
    /// Whether every condition on this step is satisfied, given the set of
    /// recently-used tools on the session.
    pub fn conditions_met(&self, recently_used: &[ToolId]) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        self.conditions.iter().all(|c| match c {
            Condition::ToolUsed { tool } => recently_used.contains(tool),
        })
    }
}

/// An ordered list of steps describing a session's orchestration state
/// machine. Read-only input, not stored in sessions (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Steps in declaration order. `resolveStep` iterates this order.
    pub steps: Vec<Step>,
}

impl OrchestrationConfig {
    /// Construct a configuration, validating the uniqueness-of-name and
    /// at-most-one-default invariants (spec §3).
    pub fn new(steps: Vec<Step>) -> Result<Self, crate::error::ValidationError> {
        let mut seen = std::collections::HashSet::new();
        let mut default_count = 0;
        for step in &steps {
            if !seen.insert(step.name.clone()) {
                return Err(crate::error::ValidationError::InvalidConfig(format!(
                    "duplicate step name: {}",
                    step.name
                )));
            }
            if step.is_default {
                default_count += 1;
            }
        }
        if default_count > 1 {
            return Err(crate::error::ValidationError::InvalidConfig(
                "at most one step may be marked default".into(),
            ));
        }
        Ok(Self { steps })
    }

    /// Find a step by name.
    pub fn find(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// The default step, if one is configured.
    pub fn default_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.is_default)
    }
}
