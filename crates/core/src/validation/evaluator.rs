//! Rule evaluator: runs each applicable rule's condition tree against the
//! selection and fires its actions.
//!
//! A malformed rule is skipped and reported as a warning; it never stops
//! the remaining rules.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use super::context::{PredicateInput, ValidationContext};
use super::result::{Impact, RuleTiming, Severity, Stage, Suggestion, SuggestionAction, ValidationIssue};
use super::rules::{ActionKind, ConditionKind, ConditionNode, ErrorMessage, LogicalOperator, ValidationRule};
use crate::error::RuleEvaluationError;
use crate::graph::ElementKind;

/// Output of one evaluator run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleEvaluation {
    pub issues: Vec<ValidationIssue>,
    pub suggestions: Vec<Suggestion>,
    /// Rules whose trees were evaluated, fired or not.
    pub rules_evaluated: usize,
    pub timings: Vec<RuleTiming>,
    pub rejected: Vec<RuleEvaluationError>,
}

impl RuleEvaluation {
    pub fn slowest_rule(&self) -> Option<&RuleTiming> {
        self.timings
            .iter()
            .max_by(|a, b| a.duration_ms.total_cmp(&b.duration_ms))
    }
}

/// Evaluate every rule in scope, ascending priority then id.
pub fn evaluate_rules(ctx: &ValidationContext<'_>) -> RuleEvaluation {
    let mut rules: Vec<&ValidationRule> = ctx.rules.iter().filter(|r| in_scope(r, ctx)).collect();
    rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

    let mut out = RuleEvaluation::default();
    for rule in rules {
        let started = Instant::now();
        let outcome = evaluate_rule(rule, ctx);
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(fired) => {
                out.rules_evaluated += 1;
                out.timings.push(RuleTiming {
                    rule_id: rule.id.clone(),
                    duration_ms,
                });
                out.issues.extend(fired.issues);
                out.suggestions.extend(fired.suggestions);
            }
            Err(err) => {
                tracing::warn!(rule_id = %rule.id, error = %err, "Skipping malformed rule");
                out.issues.push(ValidationIssue {
                    rule_id: Some(rule.id.clone()),
                    ..ValidationIssue::new(
                        Stage::Rules,
                        "rule_rejected",
                        Severity::Warning,
                        err.to_string(),
                        Vec::new(),
                    )
                });
                out.rejected.push(err);
            }
        }
    }
    out
}

/// Active, and scoped to this fandom and to a selected plot block category.
fn in_scope(rule: &ValidationRule, ctx: &ValidationContext<'_>) -> bool {
    if !rule.is_active {
        return false;
    }
    if rule.fandom_id.as_deref().is_some_and(|f| f != ctx.graph.fandom_id()) {
        return false;
    }
    match &rule.category {
        None => true,
        Some(category) => ctx
            .selected_plot_blocks()
            .any(|id| ctx.graph.plot_block(id).is_some_and(|b| &b.category == category)),
    }
}

#[derive(Default)]
struct Fired {
    issues: Vec<ValidationIssue>,
    suggestions: Vec<Suggestion>,
}

fn evaluate_rule(rule: &ValidationRule, ctx: &ValidationContext<'_>) -> Result<Fired, RuleEvaluationError> {
    let definition = &rule.definition;
    definition.check(&rule.id, ctx.predicates)?;

    let index = definition.index();
    let Some(&root) = index.get(definition.root.as_str()) else {
        return Err(RuleEvaluationError::UnknownCondition {
            rule_id: rule.id.clone(),
            condition_id: definition.root.clone(),
        });
    };

    let values = evaluate_tree(root, &index, ctx);
    let mut fired = Fired::default();
    if values.get(root.id.as_str()) != Some(&true) {
        return Ok(fired);
    }

    let trigger = triggering_message(root, &index, &values, &definition.error_messages);
    let rule_name = if rule.name.is_empty() { &rule.id } else { &rule.name };

    for action in &definition.actions {
        let applies = match &action.kind {
            ActionKind::Require { target } | ActionKind::Suggest { target } => !ctx.is_selected(target),
            ActionKind::Exclude { target } => ctx.is_selected(target),
            ActionKind::Warning { .. } => true,
        };
        if !applies {
            continue;
        }

        let target = action.kind.target();
        let template = trigger
            .map(|m| m.message.as_str())
            .or(action.message.as_deref())
            .or(rule.default_message.as_deref());
        let message = match template {
            Some(template) => render(template, target.unwrap_or_default(), rule_name),
            None => fallback_message(&action.kind, rule_name),
        };

        if let ActionKind::Suggest { target } = &action.kind {
            fired.suggestions.push(Suggestion {
                action: SuggestionAction::Add,
                element_id: target.clone(),
                replacement: None,
                impact: Some(Impact::Recommended),
                reason: message,
                stage: Stage::Rules,
                rule_id: Some(rule.id.clone()),
            });
            continue;
        }

        // A triggering message may raise the action's severity, never lower it.
        let base = action.kind.default_severity();
        let severity = trigger.map_or(base, |m| m.severity.min(base));
        fired.issues.push(ValidationIssue {
            rule_id: Some(rule.id.clone()),
            ..ValidationIssue::new(
                Stage::Rules,
                action.kind.rule_type(),
                severity,
                message,
                target.map(|t| vec![t.to_string()]).unwrap_or_default(),
            )
        });
    }

    Ok(fired)
}

/// Post-order evaluation of every node reachable from `root`. The tree has
/// already passed [`RuleDefinition::check`](super::rules::RuleDefinition::check),
/// so it is acyclic.
fn evaluate_tree<'r>(
    root: &'r ConditionNode,
    index: &BTreeMap<&str, &'r ConditionNode>,
    ctx: &ValidationContext<'_>,
) -> BTreeMap<&'r str, bool> {
    let mut values: BTreeMap<&'r str, bool> = BTreeMap::new();
    let mut stack: Vec<(&'r ConditionNode, bool)> = vec![(root, false)];

    while let Some((node, expanded)) = stack.pop() {
        if values.contains_key(node.id.as_str()) {
            continue;
        }
        if !expanded {
            stack.push((node, true));
            for child_id in node.children.iter().rev() {
                if let Some(&child) = index.get(child_id.as_str()) {
                    if !values.contains_key(child.id.as_str()) {
                        stack.push((child, false));
                    }
                }
            }
            continue;
        }

        let own = match &node.kind {
            ConditionKind::Group => None,
            leaf => Some(evaluate_leaf(leaf, ctx)),
        };
        let children = node
            .children
            .iter()
            .map(|c| values.get(c.as_str()).copied().unwrap_or(false));
        let mut operands = own.into_iter().chain(children);
        let value = match node.operator {
            LogicalOperator::And => operands.all(|v| v),
            LogicalOperator::Or => operands.any(|v| v),
            LogicalOperator::Not => !operands.all(|v| v),
        };
        values.insert(node.id.as_str(), value);
    }
    values
}

fn evaluate_leaf(kind: &ConditionKind, ctx: &ValidationContext<'_>) -> bool {
    let selected_as = |id: &str, kind: ElementKind| {
        ctx.is_selected(id) && ctx.entry(id).is_some_and(|e| e.listed_as == kind)
    };

    match kind {
        ConditionKind::Group => false,
        ConditionKind::TagPresent { tag_id } => selected_as(tag_id, ElementKind::Tag),
        ConditionKind::PlotBlockSelected { plot_block_id } => selected_as(plot_block_id, ElementKind::PlotBlock),
        ConditionKind::TagClassCount { tag_class_id, min, max } => {
            let count = ctx.selected_members(tag_class_id).len();
            let min = min.map_or(if max.is_none() { 1 } else { 0 }, |m| m as usize);
            count >= min && max.map_or(true, |m| count <= m as usize)
        }
        ConditionKind::Custom { predicate, params } => ctx
            .predicates
            .get(predicate)
            .is_some_and(|f| f(&PredicateInput { context: ctx, params })),
    }
}

/// The first condition in pre-order from the root that evaluated true and
/// has an error message attached.
fn triggering_message<'r>(
    root: &'r ConditionNode,
    index: &BTreeMap<&str, &'r ConditionNode>,
    values: &BTreeMap<&str, bool>,
    messages: &'r [ErrorMessage],
) -> Option<&'r ErrorMessage> {
    if messages.is_empty() {
        return None;
    }
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        if values.get(node.id.as_str()) == Some(&true) {
            if let Some(message) = messages.iter().find(|m| m.condition_id == node.id) {
                return Some(message);
            }
        }
        stack.extend(
            node.children
                .iter()
                .rev()
                .filter_map(|c| index.get(c.as_str()).copied()),
        );
    }
    None
}

fn render(template: &str, target: &str, rule: &str) -> String {
    template.replace("{target}", target).replace("{rule}", rule)
}

fn fallback_message(kind: &ActionKind, rule: &str) -> String {
    match kind {
        ActionKind::Require { target } => format!("Rule '{rule}' requires '{target}'"),
        ActionKind::Exclude { target } => format!("Rule '{rule}' excludes '{target}'"),
        ActionKind::Suggest { target } => format!("Rule '{rule}' suggests '{target}'"),
        ActionKind::Warning { .. } => format!("Rule '{rule}' triggered"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::*;
    use crate::graph::{EntityGraph, FandomData};
    use crate::validation::context::{PredicateRegistry, Selection};
    use crate::validation::rules::test_support::*;
    use crate::validation::rules::{Action, ConditionKind, ErrorMessage};

    fn fandom() -> EntityGraph {
        graph(FandomData {
            tags: vec![
                tag("dark-harry"),
                tag("redemption-arc"),
                member("drarry", "ships"),
                member("hinny", "ships"),
            ],
            tag_classes: vec![tag_class("ships")],
            plot_blocks: vec![block("horcrux-hunt", "adventure"), block("yule-ball", "romance")],
            ..Default::default()
        })
    }

    fn tags(ids: &[&str]) -> Selection {
        Selection {
            tag_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn redemption_rule() -> ValidationRule {
        rule(
            "dark-needs-redemption",
            "all",
            vec![
                group("all", LogicalOperator::And, &["dark", "no-arc"]),
                tag_present("dark", "dark-harry"),
                group("no-arc", LogicalOperator::Not, &["arc"]),
                tag_present("arc", "redemption-arc"),
            ],
            vec![action(
                ActionKind::Warning { target: None },
                Some("Consider redemption arc"),
            )],
        )
    }

    #[test]
    fn and_not_rule_fires_only_without_redemption() {
        let graph = fandom();
        let rules = vec![redemption_rule()];

        let only_dark = tags(&["dark-harry"]);
        let ctx = ValidationContext::new(&only_dark, &graph, &rules);
        let out = evaluate_rules(&ctx);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].severity, Severity::Warning);
        assert_eq!(out.issues[0].message, "Consider redemption arc");
        assert_eq!(out.issues[0].rule_id.as_deref(), Some("dark-needs-redemption"));

        let both = tags(&["dark-harry", "redemption-arc"]);
        let ctx = ValidationContext::new(&both, &graph, &rules);
        let out = evaluate_rules(&ctx);
        assert!(out.issues.is_empty());
        assert_eq!(out.rules_evaluated, 1);
    }

    #[test]
    fn require_exclude_and_suggest_depend_on_target_state() {
        let graph = fandom();
        let rules = vec![rule(
            "dark-rules",
            "dark",
            vec![tag_present("dark", "dark-harry")],
            vec![
                action(ActionKind::Require { target: "horcrux-hunt".into() }, Some("{rule} needs {target}")),
                action(ActionKind::Exclude { target: "yule-ball".into() }, None),
                action(ActionKind::Suggest { target: "redemption-arc".into() }, None),
            ],
        )];

        let selection = Selection {
            tag_ids: vec!["dark-harry".into()],
            plot_block_ids: vec!["yule-ball".into()],
            ..Default::default()
        };
        let ctx = ValidationContext::new(&selection, &graph, &rules);
        let out = evaluate_rules(&ctx);

        let types: Vec<&str> = out.issues.iter().map(|i| i.rule_type.as_str()).collect();
        assert_eq!(types, ["rule_require", "rule_exclude"]);
        assert_eq!(out.issues[0].message, "dark-rules needs horcrux-hunt");
        assert!(out.issues.iter().all(|i| i.severity == Severity::Error));
        assert_eq!(out.suggestions.len(), 1);
        assert_eq!(out.suggestions[0].element_id, "redemption-arc");

        let satisfied = Selection {
            tag_ids: vec!["dark-harry".into(), "redemption-arc".into()],
            plot_block_ids: vec!["horcrux-hunt".into()],
            ..Default::default()
        };
        let ctx = ValidationContext::new(&satisfied, &graph, &rules);
        let out = evaluate_rules(&ctx);
        assert!(out.issues.is_empty());
        assert!(out.suggestions.is_empty());
    }

    #[test]
    fn triggering_condition_message_raises_severity() {
        let graph = fandom();
        let mut rule = rule(
            "any-ship",
            "either",
            vec![
                group("either", LogicalOperator::Or, &["d", "h"]),
                tag_present("d", "drarry"),
                tag_present("h", "hinny"),
            ],
            vec![action(ActionKind::Warning { target: None }, Some("generic"))],
        );
        rule.definition.error_messages = vec![
            ErrorMessage {
                condition_id: "d".into(),
                message: "Drarry picked".into(),
                severity: Severity::Info,
            },
            ErrorMessage {
                condition_id: "h".into(),
                message: "Hinny picked".into(),
                severity: Severity::Error,
            },
        ];
        let rules = vec![rule];

        let selection = tags(&["hinny"]);
        let ctx = ValidationContext::new(&selection, &graph, &rules);
        let out = evaluate_rules(&ctx);

        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].message, "Hinny picked");
        assert_eq!(out.issues[0].severity, Severity::Error);
    }

    #[test]
    fn triggering_message_never_lowers_a_require() {
        let graph = fandom();
        let mut rule = rule(
            "hinny-needs-drarry",
            "h",
            vec![tag_present("h", "hinny")],
            vec![action(ActionKind::Require { target: "drarry".into() }, None)],
        );
        rule.definition.error_messages = vec![ErrorMessage {
            condition_id: "h".into(),
            message: "Add {target} as well".into(),
            severity: Severity::Info,
        }];
        let rules = vec![rule];

        let selection = tags(&["hinny"]);
        let ctx = ValidationContext::new(&selection, &graph, &rules);
        let out = evaluate_rules(&ctx);

        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].rule_type, "rule_require");
        assert_eq!(out.issues[0].message, "Add drarry as well");
        assert_eq!(out.issues[0].severity, Severity::Error);
    }

    #[test]
    fn tag_class_count_bounds() {
        let graph = fandom();
        let count_rule = |min: Option<u32>, max: Option<u32>| {
            rule(
                "count",
                "c",
                vec![leaf(
                    "c",
                    ConditionKind::TagClassCount {
                        tag_class_id: "ships".into(),
                        min,
                        max,
                    },
                )],
                vec![action(ActionKind::Warning { target: None }, None)],
            )
        };
        let selection = tags(&["drarry", "hinny"]);
        let fires = |rule: ValidationRule| {
            let rules = vec![rule];
            let ctx = ValidationContext::new(&selection, &graph, &rules);
            !evaluate_rules(&ctx).issues.is_empty()
        };

        assert!(fires(count_rule(None, None)));
        assert!(fires(count_rule(Some(2), None)));
        assert!(!fires(count_rule(Some(3), None)));
        assert!(!fires(count_rule(None, Some(1))));
    }

    #[test]
    fn malformed_rule_is_rejected_without_blocking_others() {
        let graph = fandom();
        let rules = vec![
            rule("broken", "root", vec![group("root", LogicalOperator::And, &["ghost"])], Vec::new()),
            redemption_rule(),
        ];
        let selection = tags(&["dark-harry"]);
        let ctx = ValidationContext::new(&selection, &graph, &rules);

        let out = evaluate_rules(&ctx);

        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].rule_id(), "broken");
        assert_eq!(out.rules_evaluated, 1);
        let types: Vec<&str> = out.issues.iter().map(|i| i.rule_type.as_str()).collect();
        assert_eq!(types, ["rule_rejected", "rule_warning"]);
        assert!(out.issues.iter().all(|i| i.severity == Severity::Warning));
    }

    #[test]
    fn rules_run_by_priority_then_id_and_respect_scope() {
        let graph = fandom();
        let warn = |id: &str, priority: i32| {
            let mut r = rule(
                id,
                "dark",
                vec![tag_present("dark", "dark-harry")],
                vec![action(ActionKind::Warning { target: None }, Some("{rule}"))],
            );
            r.priority = priority;
            r
        };
        let mut inactive = warn("inactive", 0);
        inactive.is_active = false;
        let mut foreign = warn("foreign", 0);
        foreign.fandom_id = Some("star-wars".into());
        let mut romance_only = warn("romance-only", 0);
        romance_only.category = Some("romance".into());

        let rules = vec![warn("b", 1), warn("a", 1), warn("z", 0), inactive, foreign, romance_only];
        let selection = tags(&["dark-harry"]);
        let ctx = ValidationContext::new(&selection, &graph, &rules);

        let out = evaluate_rules(&ctx);
        let order: Vec<&str> = out.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(order, ["z", "a", "b"]);
        assert_eq!(out.timings.len(), 3);
        assert!(out.slowest_rule().is_some());
    }

    #[test]
    fn custom_predicates_come_from_the_registry() {
        let graph = fandom();
        let custom = leaf(
            "long",
            ConditionKind::Custom {
                predicate: "has_metadata".into(),
                params: serde_json::json!({ "key": "word_count" }),
            },
        );
        let rules = vec![rule(
            "long-fic",
            "long",
            vec![custom],
            vec![Action {
                kind: ActionKind::Warning { target: None },
                message: Some("Long fic".into()),
            }],
        )];
        let mut registry = PredicateRegistry::new();
        registry.register("has_metadata", |input| {
            input.params["key"]
                .as_str()
                .is_some_and(|key| input.context.selection.metadata.contains_key(key))
        });

        let mut selection = tags(&["dark-harry"]);
        selection
            .metadata
            .insert("word_count".into(), serde_json::json!(120_000));
        let ctx = ValidationContext::new(&selection, &graph, &rules).with_predicates(&registry);

        let out = evaluate_rules(&ctx);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].message, "Long fic");
    }
}
