//! Validation orchestrator: runs every stage in a fixed order and merges
//! their findings into one [`ValidationResult`].

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::circular::detect_circular_references;
use super::conflict::detect_conflicts_with;
use super::context::ValidationContext;
use super::dependency::resolve_dependencies_with;
use super::evaluator::evaluate_rules;
use super::result::{
    PerformanceMetrics, Stage, StageTiming, Suggestion, ValidationIssue, ValidationResult,
};
use super::selection::check_selection;
use super::tag_class::validate_tag_classes;

/// Tunables for one validator instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Upper bound on merged suggestions.
    pub max_suggestions: usize,
    /// Sibling substitutes offered per conflict resolution.
    pub max_substitutions: usize,
    /// Report `enhances` relations as info findings and suggestions.
    pub include_enhancements: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 20,
            max_substitutions: 3,
            include_enhancements: true,
        }
    }
}

/// Stateless runner. Safe to share across threads and calls.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run selection checks, conflicts, dependencies, cycles, tag classes
    /// and rules, in that order.
    pub fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        let started = Instant::now();
        if ctx.selection.is_empty() {
            tracing::debug!("Empty selection, nothing to validate");
            return ValidationResult::empty();
        }

        let mut run = StageRun::default();

        run.stage(Stage::Selection, || (check_selection(ctx), Vec::new()));

        let mut dependency_suggestions = Vec::new();
        let mut conflict_suggestions = Vec::new();
        run.stage(Stage::Conflicts, || {
            let result = detect_conflicts_with(ctx, &self.config);
            conflict_suggestions = result.suggestions();
            (result.issues(), Vec::new())
        });
        run.stage(Stage::Dependencies, || {
            let result = resolve_dependencies_with(ctx, &self.config);
            dependency_suggestions = result.suggestions();
            (result.issues(), Vec::new())
        });
        run.stage(Stage::CircularReferences, || {
            (detect_circular_references(ctx).issues(), Vec::new())
        });
        run.stage(Stage::TagClasses, || (validate_tag_classes(ctx).issues(), Vec::new()));

        let mut rules_evaluated = 0;
        let mut slowest_rule = None;
        run.stage(Stage::Rules, || {
            let evaluation = evaluate_rules(ctx);
            rules_evaluated = evaluation.rules_evaluated;
            slowest_rule = evaluation.slowest_rule().cloned();
            (evaluation.issues, evaluation.suggestions)
        });

        let mut suggestions = dependency_suggestions;
        suggestions.extend(conflict_suggestions);
        suggestions.extend(run.suggestions);
        let suggestions = merge_suggestions(suggestions, self.config.max_suggestions);

        let performance = PerformanceMetrics {
            total_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            stages: run.timings,
            rules_evaluated,
            slowest_rule,
        };
        let result = ValidationResult::from_issues(run.issues, suggestions, performance);
        tracing::debug!(
            is_valid = result.is_valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            total_ms = result.performance.total_time_ms,
            "Validation complete"
        );
        result
    }
}

/// Validate with the default configuration.
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    Validator::default().validate(ctx)
}

#[derive(Default)]
struct StageRun {
    issues: Vec<ValidationIssue>,
    suggestions: Vec<Suggestion>,
    timings: Vec<StageTiming>,
}

impl StageRun {
    fn stage<F>(&mut self, stage: Stage, run: F)
    where
        F: FnOnce() -> (Vec<ValidationIssue>, Vec<Suggestion>),
    {
        let started = Instant::now();
        let (issues, suggestions) = run();
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            stage = stage.as_str(),
            findings = issues.len(),
            elapsed_ms = duration_ms,
            "Stage finished"
        );
        self.issues.extend(issues);
        self.suggestions.extend(suggestions);
        self.timings.push(StageTiming { stage, duration_ms });
    }
}

/// Keep the first suggestion per (action, element) and cap the total.
fn merge_suggestions(suggestions: Vec<Suggestion>, limit: usize) -> Vec<Suggestion> {
    let mut seen = BTreeSet::new();
    suggestions
        .into_iter()
        .filter(|s| seen.insert((s.action, s.element_id.clone())))
        .take(limit)
        .collect()
}
