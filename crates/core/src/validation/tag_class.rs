//! Class-scoped constraints: mutual exclusion, required context, instance
//! limits and category restrictions.

use serde::{Deserialize, Serialize};

use super::context::ValidationContext;
use super::result::{Severity, Stage, ValidationIssue};
use crate::graph::{CategoryRestrictions, InstanceLimits, MutualExclusion, RequiredContext, TagClass};
use crate::types::{ElementId, TagClassId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagClassRuleType {
    MutualExclusion,
    RequiredContext,
    InstanceLimit,
    CategoryRestriction,
}

impl TagClassRuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MutualExclusion => "mutual_exclusion",
            Self::RequiredContext => "required_context",
            Self::InstanceLimit => "instance_limit",
            Self::CategoryRestriction => "category_restriction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagClassViolation {
    pub class_id: TagClassId,
    pub rule_type: TagClassRuleType,
    pub severity: Severity,
    pub message: String,
    /// Member tags involved, followed by any other ids the rule names.
    pub affected_elements: Vec<ElementId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagClassResult {
    pub violations: Vec<TagClassViolation>,
}

impl TagClassResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::Error)
    }

    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.violations
            .iter()
            .map(|v| ValidationIssue {
                tag_class_id: Some(v.class_id.clone()),
                ..ValidationIssue::new(
                    Stage::TagClasses,
                    v.rule_type.as_str(),
                    v.severity,
                    v.message.clone(),
                    v.affected_elements.clone(),
                )
            })
            .collect()
    }
}

/// Check every tag class that has at least one selected member.
pub fn validate_tag_classes(ctx: &ValidationContext<'_>) -> TagClassResult {
    let mut violations = Vec::new();

    for class in ctx.graph.tag_classes() {
        let members = ctx.selected_members(&class.id);
        if members.is_empty() {
            continue;
        }
        let mut check = ClassCheck {
            ctx,
            class,
            members: &members,
            violations: &mut violations,
        };
        let rules = &class.validation_rules;
        if let Some(exclusion) = &rules.mutual_exclusion {
            check.mutual_exclusion(exclusion);
        }
        if let Some(context) = &rules.required_context {
            check.required_context(context);
        }
        if let Some(limits) = rules.instance_limits {
            check.instance_limits(limits);
        }
        if let Some(restrictions) = &rules.category_restrictions {
            check.category_restrictions(restrictions);
        }
    }

    TagClassResult { violations }
}

struct ClassCheck<'c, 'a> {
    ctx: &'c ValidationContext<'a>,
    class: &'a TagClass,
    members: &'c [&'a str],
    violations: &'c mut Vec<TagClassViolation>,
}

impl ClassCheck<'_, '_> {
    fn push(&mut self, rule_type: TagClassRuleType, severity: Severity, message: String, extra: Vec<ElementId>) {
        let mut affected: Vec<ElementId> = self.members.iter().map(|m| m.to_string()).collect();
        affected.extend(extra);
        self.violations.push(TagClassViolation {
            class_id: self.class.id.clone(),
            rule_type,
            severity,
            message,
            affected_elements: affected,
        });
    }

    fn mutual_exclusion(&mut self, exclusion: &MutualExclusion) {
        let class = self.class;
        let name = &class.name;
        if exclusion.within_class && self.members.len() > 1 {
            self.push(
                TagClassRuleType::MutualExclusion,
                Severity::Error,
                format!("Only one '{name}' tag may be selected, found {}", self.members.len()),
                Vec::new(),
            );
        }

        let mut external: Vec<ElementId> = exclusion
            .conflicting_tags
            .iter()
            .filter(|t| self.ctx.is_selected(t))
            .cloned()
            .collect();
        for other in &exclusion.conflicting_classes {
            external.extend(self.ctx.selected_members(other).into_iter().map(str::to_string));
        }
        if !external.is_empty() {
            self.push(
                TagClassRuleType::MutualExclusion,
                Severity::Error,
                format!("'{name}' tags cannot be combined with {}", external.join(", ")),
                external,
            );
        }
    }

    fn required_context(&mut self, context: &RequiredContext) {
        let mut missing: Vec<String> = context
            .required_tags
            .iter()
            .filter(|t| !self.ctx.is_selected(t))
            .cloned()
            .collect();
        missing.extend(
            context
                .required_classes
                .iter()
                .filter(|c| self.ctx.selected_members(c).is_empty())
                .cloned(),
        );
        let missing_metadata: Vec<&str> = context
            .required_metadata
            .iter()
            .filter(|key| !self.ctx.selection.metadata.contains_key(key.as_str()))
            .map(String::as_str)
            .collect();

        if missing.is_empty() && missing_metadata.is_empty() {
            return;
        }
        let mut needs: Vec<&str> = missing.iter().map(String::as_str).collect();
        needs.extend(missing_metadata.iter().copied());
        let message = format!("'{}' tags need: {}", self.class.name, needs.join(", "));
        self.push(TagClassRuleType::RequiredContext, Severity::Error, message, missing);
    }

    fn instance_limits(&mut self, limits: InstanceLimits) {
        let count = self.members.len();
        let class = self.class;
        let name = &class.name;
        let message = match limits {
            InstanceLimits {
                exact_instances: Some(exact),
                ..
            } if count != exact as usize => {
                format!("Exactly {exact} '{name}' tags required, found {count}")
            }
            InstanceLimits {
                min_instances: Some(min),
                ..
            } if count < min as usize => format!("At least {min} '{name}' tags required, found {count}"),
            InstanceLimits {
                max_instances: Some(max),
                ..
            } if count > max as usize => format!("At most {max} '{name}' tags allowed, found {count}"),
            _ => return,
        };
        self.push(TagClassRuleType::InstanceLimit, Severity::Error, message, Vec::new());
    }

    fn category_restrictions(&mut self, restrictions: &CategoryRestrictions) {
        let class = self.class;
        let name = &class.name;
        if !restrictions.applicable_categories.is_empty() {
            let graph = self.ctx.graph;
            let outside: Vec<ElementId> = self
                .members
                .iter()
                .filter(|m| {
                    graph
                        .category_of(m)
                        .is_some_and(|c| !restrictions.applicable_categories.iter().any(|a| a == c))
                })
                .map(|m| m.to_string())
                .collect();
            if !outside.is_empty() {
                let message = format!(
                    "'{name}' tags are limited to categories {}; not: {}",
                    restrictions.applicable_categories.join(", "),
                    outside.join(", ")
                );
                self.violations.push(TagClassViolation {
                    class_id: class.id.clone(),
                    rule_type: TagClassRuleType::CategoryRestriction,
                    severity: Severity::Warning,
                    message,
                    affected_elements: outside,
                });
            }
        }

        let missing: Vec<ElementId> = restrictions
            .required_plot_blocks
            .iter()
            .filter(|b| !self.ctx.is_selected(b))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let message = format!("'{name}' tags need plot blocks: {}", missing.join(", "));
            self.push(TagClassRuleType::CategoryRestriction, Severity::Error, message, missing);
        }
    }
}
