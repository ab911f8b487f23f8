//! Custom rule predicates the service makes available to `custom` conditions.
//!
//! | Name                     | Parameters                                   |
//! |--------------------------|----------------------------------------------|
//! | `metadata_equals`        | `key`, `value`                               |
//! | `min_selected`           | `count`, optional `kind` (`tag`, `plot_block`, `condition`) |
//! | `plot_block_in_category` | `category`                                   |
//!
//! Missing or mistyped parameters make the predicate evaluate to `false`.

use pathway_core::graph::ElementKind;
use pathway_core::validation::context::PredicateInput;
use pathway_core::PredicateRegistry;

/// Registry with every predicate the service ships.
pub fn service_predicates() -> PredicateRegistry {
    let mut registry = PredicateRegistry::new();
    registry
        .register("metadata_equals", metadata_equals)
        .register("min_selected", min_selected)
        .register("plot_block_in_category", plot_block_in_category);
    registry
}

fn metadata_equals(input: &PredicateInput<'_>) -> bool {
    let Some(key) = input.params.get("key").and_then(|k| k.as_str()) else {
        return false;
    };
    let Some(expected) = input.params.get("value") else {
        return false;
    };
    input.context.selection.metadata.get(key) == Some(expected)
}

fn min_selected(input: &PredicateInput<'_>) -> bool {
    let Some(count) = input.params.get("count").and_then(|c| c.as_u64()) else {
        return false;
    };
    let ctx = input.context;
    let selected = match input.params.get("kind").and_then(|k| k.as_str()) {
        None => ctx.known_entries().count(),
        Some("tag") => ctx.selected_of_kind(ElementKind::Tag).count(),
        Some("plot_block") => ctx.selected_of_kind(ElementKind::PlotBlock).count(),
        Some("condition") => ctx.selected_of_kind(ElementKind::Condition).count(),
        Some(_) => return false,
    };
    selected as u64 >= count
}

fn plot_block_in_category(input: &PredicateInput<'_>) -> bool {
    let Some(category) = input.params.get("category").and_then(|c| c.as_str()) else {
        return false;
    };
    let ctx = input.context;
    ctx.selected_plot_blocks()
        .any(|id| ctx.graph.plot_block(id).is_some_and(|b| b.category == category))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathway_core::graph::FandomData;
    use pathway_core::{EntityGraph, Selection, ValidationContext};
    use serde_json::json;

    fn graph() -> EntityGraph {
        let data: FandomData = serde_json::from_value(json!({
            "tags": [{ "id": "angst", "fandom_id": "hp" }],
            "plot_blocks": [
                { "id": "quest", "fandom_id": "hp", "category": "adventure" },
                { "id": "ball", "fandom_id": "hp", "category": "romance" }
            ]
        }))
        .unwrap();
        EntityGraph::build("hp", data).unwrap()
    }

    fn check(name: &str, selection: &Selection, params: serde_json::Value) -> bool {
        let graph = graph();
        let registry = service_predicates();
        let ctx = ValidationContext::new(selection, &graph, &[]).with_predicates(&registry);
        let predicate = registry.get(name).unwrap();
        predicate(&PredicateInput {
            context: &ctx,
            params: &params,
        })
    }

    fn selection() -> Selection {
        Selection {
            tag_ids: vec!["angst".into(), "unknown".into()],
            plot_block_ids: vec!["quest".into()],
            metadata: [("rating".to_string(), json!("M"))].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn registers_all_service_predicates() {
        let names: Vec<_> = service_predicates().names().map(str::to_string).collect();
        assert_eq!(names, ["metadata_equals", "min_selected", "plot_block_in_category"]);
    }

    #[test]
    fn metadata_equals_compares_json_values() {
        let s = selection();
        assert!(check("metadata_equals", &s, json!({ "key": "rating", "value": "M" })));
        assert!(!check("metadata_equals", &s, json!({ "key": "rating", "value": "T" })));
        assert!(!check("metadata_equals", &s, json!({ "key": "rating" })));
    }

    #[test]
    fn min_selected_counts_known_entries() {
        let s = selection();
        assert!(check("min_selected", &s, json!({ "count": 2 })));
        assert!(!check("min_selected", &s, json!({ "count": 3 })));
        assert!(check("min_selected", &s, json!({ "count": 1, "kind": "tag" })));
        assert!(!check("min_selected", &s, json!({ "count": 1, "kind": "condition" })));
        assert!(!check("min_selected", &s, json!({ "count": 1, "kind": "ship" })));
    }

    #[test]
    fn plot_block_in_category_looks_at_selected_blocks() {
        let s = selection();
        assert!(check("plot_block_in_category", &s, json!({ "category": "adventure" })));
        assert!(!check("plot_block_in_category", &s, json!({ "category": "romance" })));
    }
}
