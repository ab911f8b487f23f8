use crate::types::{ConditionId, ElementId, FandomId, RuleId};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Graph(#[from] GraphBuildError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Structural corruption found while indexing a fandom's entities.
///
/// Any of these makes the graph unusable, so construction stops at the first
/// one rather than validating against partial data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphBuildError {
    #[error("Duplicate {entity} id '{id}'")]
    DuplicateId { entity: &'static str, id: String },

    #[error("{entity} '{id}' belongs to fandom '{actual}', expected '{expected}'")]
    FandomMismatch {
        entity: &'static str,
        id: String,
        expected: FandomId,
        actual: FandomId,
    },

    #[error("{entity} '{id}' references itself in '{relation}'")]
    SelfReference {
        entity: &'static str,
        id: String,
        relation: &'static str,
    },

    #[error("{entity} '{id}' references unknown id '{target}' in '{relation}'")]
    DanglingReference {
        entity: &'static str,
        id: String,
        relation: &'static str,
        target: String,
    },

    #[error("Tag class '{class_id}' has inconsistent instance limits: {reason}")]
    InvalidInstanceLimits { class_id: String, reason: String },

    #[error("Condition '{condition_id}' belongs to unknown plot block '{plot_block_id}'")]
    UnknownPlotBlock {
        condition_id: ElementId,
        plot_block_id: ElementId,
    },
}

/// A single rule that cannot be evaluated. Isolated to that rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleEvaluationError {
    #[error("Rule '{rule_id}' references unknown condition '{condition_id}'")]
    UnknownCondition {
        rule_id: RuleId,
        condition_id: ConditionId,
    },

    #[error("Rule '{rule_id}' has a cyclic condition tree at '{condition_id}'")]
    CyclicCondition {
        rule_id: RuleId,
        condition_id: ConditionId,
    },

    #[error("Rule '{rule_id}' uses unregistered custom predicate '{predicate}'")]
    UnknownPredicate { rule_id: RuleId, predicate: String },

    #[error("Rule '{rule_id}' has an error message for unknown condition '{condition_id}'")]
    UnknownMessageCondition {
        rule_id: RuleId,
        condition_id: ConditionId,
    },

    #[error("Rule '{rule_id}' has a group condition '{condition_id}' with no children")]
    EmptyGroup {
        rule_id: RuleId,
        condition_id: ConditionId,
    },
}

impl RuleEvaluationError {
    /// The rule that failed.
    pub fn rule_id(&self) -> &str {
        match self {
            Self::UnknownCondition { rule_id, .. }
            | Self::CyclicCondition { rule_id, .. }
            | Self::UnknownPredicate { rule_id, .. }
            | Self::UnknownMessageCondition { rule_id, .. }
            | Self::EmptyGroup { rule_id, .. } => rule_id,
        }
    }
}
