//! Conflict detection among selected elements.
//!
//! Four kinds of exclusion are checked: direct `conflicts_with` pairs
//! (symmetric), category exclusions, `max_instances` limits on a shared
//! ancestor, and conflicts involving plot block conditions.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::context::ValidationContext;
use super::orchestrator::ValidatorConfig;
use super::result::{Severity, Stage, Suggestion, SuggestionAction, ValidationIssue};
use crate::graph::ElementKind;
use crate::types::ElementId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Direct,
    Categorical,
    InstanceLimit,
    ConditionLevel,
}

impl ConflictKind {
    pub fn rule_type(&self) -> &'static str {
        match self {
            Self::Direct => "direct_conflict",
            Self::Categorical => "category_exclusion",
            Self::InstanceLimit => "instance_limit",
            Self::ConditionLevel => "condition_conflict",
        }
    }

    /// Hard exclusions are errors; category-level ones only warn.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Categorical => Severity::Warning,
            Self::Direct | Self::InstanceLimit | Self::ConditionLevel => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    Remove,
    Replace,
}

/// One way to resolve a conflict. Listed least disruptive first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub action: ResolutionAction,
    pub element_id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<ElementId>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    /// Involved elements: the sorted pair, or every selected element under a
    /// limited ancestor in selection order.
    pub elements: Vec<ElementId>,
    pub message: String,
    pub suggested_resolutions: Vec<Resolution>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictResult {
    pub conflicts: Vec<Conflict>,
}

impl ConflictResult {
    pub fn has_errors(&self) -> bool {
        self.conflicts.iter().any(|c| c.severity == Severity::Error)
    }

    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.conflicts
            .iter()
            .map(|c| {
                ValidationIssue::new(
                    Stage::Conflicts,
                    c.kind.rule_type(),
                    c.severity,
                    c.message.clone(),
                    c.elements.clone(),
                )
            })
            .collect()
    }

    /// The first-ranked resolution of each conflict.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.conflicts
            .iter()
            .filter_map(|c| c.suggested_resolutions.first().map(|r| (c, r)))
            .map(|(conflict, resolution)| Suggestion {
                action: match resolution.action {
                    ResolutionAction::Remove => SuggestionAction::Remove,
                    ResolutionAction::Replace => SuggestionAction::Replace,
                },
                element_id: resolution.element_id.clone(),
                replacement: resolution.replacement.clone(),
                impact: None,
                reason: conflict.message.clone(),
                stage: Stage::Conflicts,
                rule_id: None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Detect conflicts with the default configuration.
pub fn detect_conflicts(ctx: &ValidationContext<'_>) -> ConflictResult {
    detect_conflicts_with(ctx, &ValidatorConfig::default())
}

pub fn detect_conflicts_with(ctx: &ValidationContext<'_>, config: &ValidatorConfig) -> ConflictResult {
    let mut detector = Detector {
        ctx,
        config,
        seen: BTreeSet::new(),
        conflicts: Vec::new(),
    };
    detector.pairwise_exclusions();
    detector.category_exclusions();
    detector.instance_limits();

    ConflictResult {
        conflicts: detector.conflicts,
    }
}

struct Detector<'c, 'a> {
    ctx: &'c ValidationContext<'a>,
    config: &'c ValidatorConfig,
    seen: BTreeSet<(ConflictKind, String, String)>,
    conflicts: Vec<Conflict>,
}

impl<'c, 'a> Detector<'c, 'a> {
    /// Direct and condition-level conflicts. The relation index is
    /// symmetric, so a pair is found from either side and recorded once.
    fn pairwise_exclusions(&mut self) {
        let graph = self.ctx.graph;
        let entries: Vec<&str> = self.ctx.known_entries().map(|e| e.id).collect();

        for id in entries {
            for other in graph.conflicts_of(id) {
                if !self.ctx.is_selected(other) {
                    continue;
                }
                let involves_condition = [id, other.as_str()]
                    .iter()
                    .any(|e| graph.kind_of(e) == Some(ElementKind::Condition));
                let kind = if involves_condition {
                    ConflictKind::ConditionLevel
                } else {
                    ConflictKind::Direct
                };
                let (a, b) = ordered(id, other);
                if !self.seen.insert((kind, a.to_string(), b.to_string())) {
                    continue;
                }

                let declared_by = if graph.declares_conflict(a, b) { a } else { b };
                let target = if declared_by == a { b } else { a };
                let message = format!("'{declared_by}' cannot be combined with '{target}'");
                self.push_pair(kind, a, b, message);
            }
        }
    }

    fn category_exclusions(&mut self) {
        let graph = self.ctx.graph;
        let candidates: Vec<&str> = self
            .ctx
            .known_entries()
            .filter(|e| e.listed_as != ElementKind::Condition)
            .map(|e| e.id)
            .collect();

        for block_id in self.ctx.selected_plot_blocks().collect::<Vec<_>>() {
            let Some(block) = graph.plot_block(block_id) else {
                continue;
            };
            if block.excludes_categories.is_empty() {
                continue;
            }
            for &other in &candidates {
                if other == block_id {
                    continue;
                }
                let Some(category) = graph.category_of(other) else {
                    continue;
                };
                if !block.excludes_categories.iter().any(|c| c == category) {
                    continue;
                }
                let (a, b) = ordered(block_id, other);
                if !self
                    .seen
                    .insert((ConflictKind::Categorical, a.to_string(), b.to_string()))
                {
                    continue;
                }
                let message =
                    format!("'{block_id}' excludes the '{category}' category used by '{other}'");
                self.push_pair(ConflictKind::Categorical, a, b, message);
            }
        }
    }

    /// Count selected plot blocks beneath each `max_instances` ancestor.
    fn instance_limits(&mut self) {
        let graph = self.ctx.graph;

        for ancestor in graph.plot_blocks() {
            let Some(limit) = ancestor.max_instances else {
                continue;
            };
            let mut selected: Vec<&str> = graph
                .descendants(&ancestor.id)
                .into_iter()
                .map(String::as_str)
                .filter(|id| {
                    graph.kind_of(id) == Some(ElementKind::PlotBlock) && self.ctx.is_selected(id)
                })
                .collect();
            if selected.len() <= limit as usize {
                continue;
            }
            selected.sort_by_key(|id| (self.ctx.position(id), *id));

            let excess = selected.len() - limit as usize;
            let suggested_resolutions = self
                .removal_order(&selected)
                .into_iter()
                .take(excess)
                .map(|id| Resolution {
                    action: ResolutionAction::Remove,
                    element_id: id.to_string(),
                    replacement: None,
                    description: format!("Remove '{id}' to stay within the limit of '{}'", ancestor.id),
                })
                .collect();

            self.conflicts.push(Conflict {
                kind: ConflictKind::InstanceLimit,
                severity: ConflictKind::InstanceLimit.severity(),
                elements: selected.iter().map(|id| id.to_string()).collect(),
                message: format!(
                    "'{}' allows at most {limit} selected sub-block(s), found {}",
                    ancestor.id,
                    selected.len()
                ),
                suggested_resolutions,
            });
        }
    }

    fn push_pair(&mut self, kind: ConflictKind, a: &str, b: &str, message: String) {
        let suggested_resolutions = self.pair_resolutions(a, b);
        self.conflicts.push(Conflict {
            kind,
            severity: kind.severity(),
            elements: vec![a.to_string(), b.to_string()],
            message,
            suggested_resolutions,
        });
    }

    /// Most recently added first, ties broken by id.
    fn removal_order<'s>(&self, ids: &[&'s str]) -> Vec<&'s str> {
        let mut ranked = ids.to_vec();
        ranked.sort_by_key(|id| (Reverse(self.ctx.position(id)), *id));
        ranked
    }

    fn pair_resolutions(&self, a: &str, b: &str) -> Vec<Resolution> {
        let ranked = self.removal_order(&[a, b]);
        let (first, second) = (ranked[0], ranked[1]);

        let mut resolutions = vec![remove(first, second)];
        for sibling in self.substitutes(first, second) {
            resolutions.push(Resolution {
                action: ResolutionAction::Replace,
                element_id: first.to_string(),
                description: format!("Replace '{first}' with '{sibling}'"),
                replacement: Some(sibling),
            });
        }
        resolutions.push(remove(second, first));
        resolutions
    }

    /// Unselected sibling plot blocks of `dropped` that do not conflict with
    /// `kept`.
    fn substitutes(&self, dropped: &str, kept: &str) -> Vec<ElementId> {
        let graph = self.ctx.graph;
        if graph.kind_of(dropped) != Some(ElementKind::PlotBlock) {
            return Vec::new();
        }

        let siblings: BTreeSet<&ElementId> = graph
            .parents_of(dropped)
            .flat_map(|parent| graph.children_of(parent))
            .filter(|s| s.as_str() != dropped)
            .filter(|s| graph.kind_of(s) == Some(ElementKind::PlotBlock))
            .filter(|s| !self.ctx.is_selected(s))
            .filter(|s| !graph.conflicts_of(s).any(|c| c == kept))
            .collect();

        siblings
            .into_iter()
            .take(self.config.max_substitutions)
            .cloned()
            .collect()
    }
}

fn ordered<'s>(a: &'s str, b: &'s str) -> (&'s str, &'s str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn remove(id: &str, other: &str) -> Resolution {
    Resolution {
        action: ResolutionAction::Remove,
        element_id: id.to_string(),
        replacement: None,
        description: format!("Remove '{id}' to keep '{other}'"),
    }
}
