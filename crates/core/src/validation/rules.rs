//! Administrator-authored validation rules: a condition tree plus the
//! actions that fire when it holds.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::context::PredicateRegistry;
use super::result::Severity;
use crate::error::RuleEvaluationError;
use crate::types::{ConditionId, ElementId, FandomId, RuleId, TagClassId};

/// A rule from a fandom's rule corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: RuleId,
    /// Rules without a fandom apply to every fandom.
    #[serde(default)]
    pub fandom_id: Option<FandomId>,
    #[serde(default)]
    pub name: String,
    /// Restricts the rule to selections containing a plot block of this category.
    #[serde(default)]
    pub category: Option<String>,
    /// Lower runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub default_message: Option<String>,
    pub definition: RuleDefinition,
}

fn default_true() -> bool {
    true
}

/// A condition tree stored as a flat arena of nodes keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub root: ConditionId,
    pub conditions: Vec<ConditionNode>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub error_messages: Vec<ErrorMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionNode {
    pub id: ConditionId,
    #[serde(flatten)]
    pub kind: ConditionKind,
    /// How this node's own result and its children's results combine.
    #[serde(default)]
    pub operator: LogicalOperator,
    #[serde(default)]
    pub children: Vec<ConditionId>,
}

/// Typed leaf predicates. `Group` has no predicate of its own and only
/// combines its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters", rename_all = "camelCase")]
pub enum ConditionKind {
    Group,
    TagPresent {
        tag_id: ElementId,
    },
    PlotBlockSelected {
        plot_block_id: ElementId,
    },
    TagClassCount {
        tag_class_id: TagClassId,
        #[serde(default)]
        min: Option<u32>,
        #[serde(default)]
        max: Option<u32>,
    },
    /// Calls a predicate registered with the [`PredicateRegistry`].
    Custom {
        predicate: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
    /// Negated conjunction of the operands.
    #[serde(alias = "not")]
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Template; `{target}` and `{rule}` are substituted.
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Require { target: ElementId },
    Exclude { target: ElementId },
    Suggest { target: ElementId },
    Warning {
        #[serde(default)]
        target: Option<ElementId>,
    },
}

impl ActionKind {
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Require { target } | Self::Exclude { target } | Self::Suggest { target } => Some(target),
            Self::Warning { target } => target.as_deref(),
        }
    }

    pub fn rule_type(&self) -> &'static str {
        match self {
            Self::Require { .. } => "rule_require",
            Self::Exclude { .. } => "rule_exclude",
            Self::Suggest { .. } => "rule_suggest",
            Self::Warning { .. } => "rule_warning",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            Self::Require { .. } | Self::Exclude { .. } => Severity::Error,
            Self::Suggest { .. } => Severity::Info,
            Self::Warning { .. } => Severity::Warning,
        }
    }
}

/// Message and severity to use when a specific condition triggered the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub condition_id: ConditionId,
    pub message: String,
    pub severity: Severity,
}

// ---------------------------------------------------------------------------
// Structural checks
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

impl RuleDefinition {
    /// Nodes by id. The first node wins if an id repeats.
    pub fn index(&self) -> BTreeMap<&str, &ConditionNode> {
        let mut index = BTreeMap::new();
        for node in &self.conditions {
            index.entry(node.id.as_str()).or_insert(node);
        }
        index
    }

    /// Reject trees that cannot be evaluated: unknown or cyclic child
    /// references, empty groups, unregistered custom predicates and error
    /// messages for conditions outside the tree.
    pub fn check(&self, rule_id: &str, predicates: &PredicateRegistry) -> Result<(), RuleEvaluationError> {
        let index = self.index();
        let unknown = |condition_id: &str| RuleEvaluationError::UnknownCondition {
            rule_id: rule_id.to_string(),
            condition_id: condition_id.to_string(),
        };

        let root = *index.get(self.root.as_str()).ok_or_else(|| unknown(self.root.as_str()))?;
        check_node(rule_id, root, predicates)?;

        let mut marks: BTreeMap<&str, Mark> = BTreeMap::from([(root.id.as_str(), Mark::Open)]);
        let mut stack: Vec<(&ConditionNode, usize)> = vec![(root, 0)];
        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let Some(child_id) = node.children.get(next) else {
                marks.insert(node.id.as_str(), Mark::Done);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            let child = *index.get(child_id.as_str()).ok_or_else(|| unknown(child_id.as_str()))?;
            match marks.get(child.id.as_str()) {
                Some(Mark::Open) => {
                    return Err(RuleEvaluationError::CyclicCondition {
                        rule_id: rule_id.to_string(),
                        condition_id: child.id.clone(),
                    });
                }
                Some(Mark::Done) => {}
                None => {
                    check_node(rule_id, child, predicates)?;
                    marks.insert(child.id.as_str(), Mark::Open);
                    stack.push((child, 0));
                }
            }
        }

        let reachable: BTreeSet<&str> = marks.into_keys().collect();
        if let Some(message) = self
            .error_messages
            .iter()
            .find(|m| !reachable.contains(m.condition_id.as_str()))
        {
            return Err(RuleEvaluationError::UnknownMessageCondition {
                rule_id: rule_id.to_string(),
                condition_id: message.condition_id.clone(),
            });
        }
        Ok(())
    }
}

fn check_node(rule_id: &str, node: &ConditionNode, predicates: &PredicateRegistry) -> Result<(), RuleEvaluationError> {
    match &node.kind {
        ConditionKind::Group if node.children.is_empty() => Err(RuleEvaluationError::EmptyGroup {
            rule_id: rule_id.to_string(),
            condition_id: node.id.clone(),
        }),
        ConditionKind::Custom { predicate, .. } if !predicates.contains(predicate) => {
            Err(RuleEvaluationError::UnknownPredicate {
                rule_id: rule_id.to_string(),
                predicate: predicate.clone(),
            })
        }
        _ => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::test_support::*;
    use super::*;

    #[test]
    fn deserializes_authored_json() {
        let rule: ValidationRule = serde_json::from_value(json!({
            "id": "dark-without-redemption",
            "priority": 5,
            "definition": {
                "root": "all",
                "conditions": [
                    { "id": "all", "type": "group", "operator": "AND", "children": ["dark", "no-arc"] },
                    { "id": "dark", "type": "tagPresent", "parameters": { "tag_id": "dark-harry" } },
                    { "id": "no-arc", "type": "group", "operator": "NOT", "children": ["arc"] },
                    { "id": "arc", "type": "tagPresent", "parameters": { "tag_id": "redemption-arc" } },
                    { "id": "ships", "type": "tagClassCount", "parameters": { "tag_class_id": "ships", "max": 1 } }
                ],
                "actions": [
                    { "type": "warning", "message": "Consider redemption arc" },
                    { "type": "suggest", "target": "redemption-arc" }
                ]
            }
        }))
        .unwrap();

        assert!(rule.is_active);
        assert_eq!(rule.priority, 5);
        let index = rule.definition.index();
        assert_eq!(index["no-arc"].operator, LogicalOperator::Not);
        assert_matches!(
            &index["ships"].kind,
            ConditionKind::TagClassCount { max: Some(1), min: None, .. }
        );
        assert_matches!(rule.definition.actions[0].kind, ActionKind::Warning { target: None });
        assert_eq!(rule.definition.actions[1].kind.target(), Some("redemption-arc"));
    }

    #[test]
    fn accepts_well_formed_tree() {
        let rule = rule(
            "r",
            "root",
            vec![
                group("root", LogicalOperator::Or, &["a", "b"]),
                tag_present("a", "x"),
                tag_present("b", "y"),
            ],
            Vec::new(),
        );
        assert!(rule.definition.check("r", &PredicateRegistry::new()).is_ok());
    }

    #[test]
    fn rejects_unknown_child() {
        let rule = rule("r", "root", vec![group("root", LogicalOperator::And, &["ghost"])], Vec::new());
        assert_matches!(
            rule.definition.check("r", &PredicateRegistry::new()),
            Err(RuleEvaluationError::UnknownCondition { condition_id, .. }) if condition_id == "ghost"
        );
    }

    #[test]
    fn rejects_unknown_root() {
        let rule = rule("r", "missing", vec![tag_present("a", "x")], Vec::new());
        assert_matches!(
            rule.definition.check("r", &PredicateRegistry::new()),
            Err(RuleEvaluationError::UnknownCondition { .. })
        );
    }

    #[test]
    fn rejects_cyclic_tree() {
        let rule = rule(
            "r",
            "a",
            vec![
                group("a", LogicalOperator::And, &["b"]),
                group("b", LogicalOperator::And, &["a"]),
            ],
            Vec::new(),
        );
        assert_matches!(
            rule.definition.check("r", &PredicateRegistry::new()),
            Err(RuleEvaluationError::CyclicCondition { condition_id, .. }) if condition_id == "a"
        );
    }

    #[test]
    fn shared_subtree_is_not_a_cycle() {
        let rule = rule(
            "r",
            "root",
            vec![
                group("root", LogicalOperator::Or, &["left", "right"]),
                group("left", LogicalOperator::And, &["shared"]),
                group("right", LogicalOperator::Not, &["shared"]),
                tag_present("shared", "x"),
            ],
            Vec::new(),
        );
        assert!(rule.definition.check("r", &PredicateRegistry::new()).is_ok());
    }

    #[test]
    fn rejects_empty_group_and_unregistered_predicate() {
        let empty = rule("r", "root", vec![group("root", LogicalOperator::And, &[])], Vec::new());
        assert_matches!(
            empty.definition.check("r", &PredicateRegistry::new()),
            Err(RuleEvaluationError::EmptyGroup { .. })
        );

        let custom = leaf(
            "root",
            ConditionKind::Custom {
                predicate: "is_long_fic".into(),
                params: serde_json::Value::Null,
            },
        );
        let rule = rule("r", "root", vec![custom], Vec::new());
        assert_matches!(
            rule.definition.check("r", &PredicateRegistry::new()),
            Err(RuleEvaluationError::UnknownPredicate { predicate, .. }) if predicate == "is_long_fic"
        );

        let mut registry = PredicateRegistry::new();
        registry.register("is_long_fic", |_| true);
        assert!(rule.definition.check("r", &registry).is_ok());
    }

    #[test]
    fn rejects_message_for_condition_outside_tree() {
        let mut rule = rule("r", "a", vec![tag_present("a", "x"), tag_present("orphan", "y")], Vec::new());
        rule.definition.error_messages.push(ErrorMessage {
            condition_id: "orphan".into(),
            message: "nope".into(),
            severity: Severity::Warning,
        });
        assert_matches!(
            rule.definition.check("r", &PredicateRegistry::new()),
            Err(RuleEvaluationError::UnknownMessageCondition { condition_id, .. }) if condition_id == "orphan"
        );
    }
}
