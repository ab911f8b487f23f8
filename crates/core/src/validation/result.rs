//! Validation finding and report types.

use serde::{Deserialize, Serialize};

use crate::types::{ElementId, RuleId};

/// How serious a finding is. Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// The validator that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Selection,
    Conflicts,
    Dependencies,
    CircularReferences,
    TagClasses,
    Rules,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::Conflicts => "conflicts",
            Self::Dependencies => "dependencies",
            Self::CircularReferences => "circular_references",
            Self::TagClasses => "tag_classes",
            Self::Rules => "rules",
        }
    }
}

/// A single semantic finding about a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub stage: Stage,
    /// Machine-readable finding type, e.g. `mutual_exclusion`.
    pub rule_type: String,
    pub severity: Severity,
    pub message: String,
    pub affected_elements: Vec<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_class_id: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        stage: Stage,
        rule_type: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        affected_elements: Vec<ElementId>,
    ) -> Self {
        Self {
            stage,
            rule_type: rule_type.into(),
            severity,
            message: message.into(),
            affected_elements,
            rule_id: None,
            tag_class_id: None,
        }
    }
}

/// How strongly a suggested addition is needed. Declaration order is rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Required,
    Recommended,
    Enhancement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionAction {
    Add,
    Remove,
    Replace,
}

/// A corrective change the user could make to the selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub action: SuggestionAction,
    pub element_id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    pub reason: String,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTiming {
    pub rule_id: RuleId,
    pub duration_ms: f64,
}

/// Wall-clock measurements for one validation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_time_ms: f64,
    pub stages: Vec<StageTiming>,
    pub rules_evaluated: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slowest_rule: Option<RuleTiming>,
}

/// The merged report of one `validate` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True when no error-severity finding exists.
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    /// Warning and info findings, warnings first.
    pub warnings: Vec<ValidationIssue>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    pub performance: PerformanceMetrics,
}

impl ValidationResult {
    /// A valid result with no findings.
    pub fn empty() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    /// Merge findings: stable-sort by severity so stage order survives as
    /// the tiebreak, then split errors from everything else.
    pub fn from_issues(
        mut issues: Vec<ValidationIssue>,
        suggestions: Vec<Suggestion>,
        performance: PerformanceMetrics,
    ) -> Self {
        issues.sort_by_key(|issue| issue.severity);
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.severity == Severity::Error);

        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
            performance,
        }
    }

    /// Compare two results ignoring timings.
    pub fn same_findings(&self, other: &Self) -> bool {
        self.is_valid == other.is_valid
            && self.errors == other.errors
            && self.warnings == other.warnings
            && self.suggestions == other.suggestions
            && self.performance.rules_evaluated == other.performance.rules_evaluated
    }
}
