//! Access-change outcome types.
//!
//! Applying an access tier is an ordered list of independent sub-steps; each
//! yields its own status and the outcome aggregates them.

use std::fmt;

use crate::domain::AccessTier;

/// Sub-steps of an access change, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStep {
    /// Free / Advance taxonomy term
    Taxonomy,
    /// Tier-gating metadata
    TierGate,
    /// Custom-field mirror of the access type
    CustomField,
    /// Subscription-platform post visibility
    RemoteMirror,
}

impl fmt::Display for AccessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessStep::Taxonomy => "taxonomy",
            AccessStep::TierGate => "tier gate",
            AccessStep::CustomField => "custom field",
            AccessStep::RemoteMirror => "platform mirror",
        };
        f.write_str(name)
    }
}

/// Result of one sub-step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Applied(String),
    /// Not attempted (missing configuration or capability)
    Skipped(String),
    Failed(String),
}

impl StepStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, StepStatus::Applied(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            StepStatus::Applied(d) | StepStatus::Skipped(d) | StepStatus::Failed(d) => d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: AccessStep,
    pub status: StepStatus,
}

/// Aggregated result of `apply_access`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    pub episode_id: i64,
    pub access: AccessTier,
    /// Classification before the change
    pub previous: AccessTier,
    pub steps: Vec<StepReport>,
}

impl AccessOutcome {
    pub fn new(episode_id: i64, access: AccessTier, previous: AccessTier) -> Self {
        Self {
            episode_id,
            access,
            previous,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: AccessStep, status: StepStatus) {
        self.steps.push(StepReport { step, status });
    }

    pub fn step(&self, step: AccessStep) -> Option<&StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.status)
    }

    /// CMS taxonomy is authoritative: the change counts once the term is set.
    pub fn success(&self) -> bool {
        self.step(AccessStep::Taxonomy).is_some_and(StepStatus::is_applied)
    }

    /// Failed or skipped steps, for warnings
    pub fn problems(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|r| !r.status.is_applied())
    }
}
