//! Selection integrity checks run before the validators.

use super::context::ValidationContext;
use super::result::{Severity, Stage, ValidationIssue};
use crate::graph::ElementKind;

/// Report ids that do not resolve, inactive tags, and conditions whose plot
/// block is not part of the selection.
pub fn check_selection(ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
    let graph = ctx.graph;
    let mut issues = Vec::new();

    for entry in ctx.entries() {
        match graph.kind_of(entry.id) {
            None => issues.push(ValidationIssue::new(
                Stage::Selection,
                "unknown_element",
                Severity::Error,
                format!("Unknown {} '{}'", entry.listed_as.as_str(), entry.id),
                vec![entry.id.to_string()],
            )),
            Some(kind) if kind != entry.listed_as => issues.push(ValidationIssue::new(
                Stage::Selection,
                "unknown_element",
                Severity::Error,
                format!(
                    "'{}' is a {}, not a {}",
                    entry.id,
                    kind.as_str(),
                    entry.listed_as.as_str()
                ),
                vec![entry.id.to_string()],
            )),
            Some(ElementKind::Tag) => {
                if graph.tag(entry.id).is_some_and(|t| !t.is_active) {
                    issues.push(ValidationIssue::new(
                        Stage::Selection,
                        "inactive_element",
                        Severity::Warning,
                        format!("Tag '{}' is inactive", entry.id),
                        vec![entry.id.to_string()],
                    ));
                }
            }
            Some(ElementKind::Condition) => {
                let Some(condition) = graph.condition(entry.id) else {
                    continue;
                };
                if !ctx.is_selected(&condition.plot_block_id) {
                    issues.push(ValidationIssue::new(
                        Stage::Selection,
                        "orphan_condition",
                        Severity::Warning,
                        format!(
                            "Condition '{}' belongs to plot block '{}', which is not selected",
                            entry.id, condition.plot_block_id
                        ),
                        vec![entry.id.to_string(), condition.plot_block_id.clone()],
                    ));
                }
            }
            Some(ElementKind::PlotBlock) => {}
        }
    }

    issues
}
