//! Dependency resolution: unmet requirements, leveled dependency chains and
//! suggested additions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::context::ValidationContext;
use super::orchestrator::ValidatorConfig;
use super::result::{Impact, Severity, Stage, Suggestion, SuggestionAction, ValidationIssue};
use crate::types::ElementId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStrength {
    /// `requires`: must be selected.
    Hard,
    /// `soft_requires` or a class-level `requires` hint.
    Soft,
    /// `enabled_by`: at least one of the listed elements should be selected.
    Enabler,
    /// `enhances`: would improve the pathway.
    Enhancement,
}

impl RequirementStrength {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Hard => Severity::Error,
            Self::Soft | Self::Enabler => Severity::Warning,
            Self::Enhancement => Severity::Info,
        }
    }

    pub fn impact(&self) -> Impact {
        match self {
            Self::Hard => Impact::Required,
            Self::Soft | Self::Enabler => Impact::Recommended,
            Self::Enhancement => Impact::Enhancement,
        }
    }

    pub fn rule_type(&self) -> &'static str {
        match self {
            Self::Hard => "missing_requirement",
            Self::Soft => "missing_soft_requirement",
            Self::Enabler => "missing_enabler",
            Self::Enhancement => "missing_enhancement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingRequirement {
    /// The selected element, or tag class, that declares the requirement.
    pub element_id: String,
    /// Elements that would satisfy it. Enablers list every alternative.
    pub required_ids: Vec<ElementId>,
    pub strength: RequirementStrength,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAddition {
    pub element_id: ElementId,
    pub impact: Impact,
    /// Elements or classes whose requirements this addition satisfies.
    pub requested_by: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyResult {
    pub missing: Vec<MissingRequirement>,
    /// Level N holds selected elements whose selected hard requirements all
    /// sit in levels below N. Ids within a level are sorted.
    pub dependency_chain: Vec<Vec<ElementId>>,
    /// Selected elements that could not be leveled because they sit on, or
    /// depend on, a requirement cycle.
    pub unresolved: Vec<ElementId>,
    /// Ordered required, then recommended, then enhancement.
    pub suggested_additions: Vec<SuggestedAddition>,
}

impl DependencyResult {
    pub fn has_errors(&self) -> bool {
        self.missing.iter().any(|m| m.severity == Severity::Error)
    }

    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.missing
            .iter()
            .map(|m| {
                let mut affected = vec![m.element_id.clone()];
                affected.extend(m.required_ids.iter().cloned());
                ValidationIssue::new(
                    Stage::Dependencies,
                    m.strength.rule_type(),
                    m.severity,
                    m.message.clone(),
                    affected,
                )
            })
            .collect()
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.suggested_additions
            .iter()
            .map(|addition| Suggestion {
                action: SuggestionAction::Add,
                element_id: addition.element_id.clone(),
                replacement: None,
                impact: Some(addition.impact),
                reason: format!("Needed by {}", addition.requested_by.join(", ")),
                stage: Stage::Dependencies,
                rule_id: None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

pub fn resolve_dependencies(ctx: &ValidationContext<'_>) -> DependencyResult {
    resolve_dependencies_with(ctx, &ValidatorConfig::default())
}

pub fn resolve_dependencies_with(
    ctx: &ValidationContext<'_>,
    config: &ValidatorConfig,
) -> DependencyResult {
    let graph = ctx.graph;
    let mut collector = Collector::default();

    for entry in ctx.known_entries() {
        let id = entry.id;
        for required in graph.hard_requirements(id) {
            if !ctx.is_selected(required) {
                collector.missing_one(id, required, RequirementStrength::Hard);
            }
        }
        for required in graph.soft_requirements(id) {
            if !ctx.is_selected(required) {
                collector.missing_one(id, required, RequirementStrength::Soft);
            }
        }
        let enablers = graph.enablers_of(id);
        if !enablers.is_empty() && !enablers.iter().any(|e| ctx.is_selected(e)) {
            collector.missing_enabler(id, enablers);
        }
        if config.include_enhancements {
            for enhancement in graph.enhancements(id) {
                if !ctx.is_selected(enhancement) {
                    collector.missing_one(id, enhancement, RequirementStrength::Enhancement);
                }
            }
        }
    }

    for class in graph.tag_classes() {
        let Some(hints) = &class.validation_rules.dependencies else {
            continue;
        };
        if ctx.selected_members(&class.id).is_empty() {
            continue;
        }
        for required in &hints.requires {
            if !ctx.is_selected(required) {
                collector.missing_one(&class.id, required, RequirementStrength::Soft);
            }
        }
        if config.include_enhancements {
            for enhancement in &hints.enhances {
                if !ctx.is_selected(enhancement) {
                    collector.missing_one(&class.id, enhancement, RequirementStrength::Enhancement);
                }
            }
        }
    }

    let (dependency_chain, unresolved) = level_chain(ctx);
    let suggested_additions = collector.ranked_additions();

    DependencyResult {
        missing: collector.missing,
        dependency_chain,
        unresolved,
        suggested_additions,
    }
}

#[derive(Default)]
struct Collector {
    missing: Vec<MissingRequirement>,
    additions: BTreeMap<ElementId, (Impact, BTreeSet<String>)>,
}

impl Collector {
    fn missing_one(&mut self, source: &str, required: &str, strength: RequirementStrength) {
        let message = match strength {
            RequirementStrength::Hard => format!("'{source}' requires '{required}'"),
            RequirementStrength::Soft => format!("'{source}' works best with '{required}'"),
            RequirementStrength::Enhancement => format!("'{required}' would enhance '{source}'"),
            RequirementStrength::Enabler => format!("'{source}' is enabled by '{required}'"),
        };
        self.push(source, vec![required.to_string()], strength, message);
    }

    fn missing_enabler(&mut self, source: &str, enablers: &[ElementId]) {
        let message = format!("'{source}' needs one of: {}", enablers.join(", "));
        self.push(source, enablers.to_vec(), RequirementStrength::Enabler, message);
    }

    fn push(&mut self, source: &str, required_ids: Vec<ElementId>, strength: RequirementStrength, message: String) {
        for required in &required_ids {
            let (impact, requested_by) = self
                .additions
                .entry(required.clone())
                .or_insert_with(|| (strength.impact(), BTreeSet::new()));
            *impact = (*impact).min(strength.impact());
            requested_by.insert(source.to_string());
        }
        self.missing.push(MissingRequirement {
            element_id: source.to_string(),
            required_ids,
            strength,
            severity: strength.severity(),
            message,
        });
    }

    fn ranked_additions(&self) -> Vec<SuggestedAddition> {
        let mut additions: Vec<SuggestedAddition> = self
            .additions
            .iter()
            .map(|(id, (impact, requested_by))| SuggestedAddition {
                element_id: id.clone(),
                impact: *impact,
                requested_by: requested_by.iter().cloned().collect(),
            })
            .collect();
        // Map iteration is already id-ordered; a stable sort keeps it as the tiebreak.
        additions.sort_by_key(|a| a.impact);
        additions
    }
}

/// Level selected elements by their selected hard requirements.
fn level_chain(ctx: &ValidationContext<'_>) -> (Vec<Vec<ElementId>>, Vec<ElementId>) {
    let graph = ctx.graph;
    let mut remaining: BTreeMap<&str, Vec<&str>> = ctx
        .known_entries()
        .map(|entry| {
            let deps = graph
                .hard_requirements(entry.id)
                .iter()
                .map(String::as_str)
                .filter(|dep| ctx.is_selected(dep))
                .collect();
            (entry.id, deps)
        })
        .collect();

    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut levels = Vec::new();
    loop {
        let level: Vec<&str> = remaining
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| placed.contains(d)))
            .map(|(id, _)| *id)
            .collect();
        if level.is_empty() {
            break;
        }
        for id in &level {
            remaining.remove(id);
            placed.insert(*id);
        }
        levels.push(level.into_iter().map(str::to_string).collect());
    }

    let unresolved = remaining.into_keys().map(str::to_string).collect();
    (levels, unresolved)
}
