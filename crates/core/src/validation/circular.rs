//! Cycle detection over the requires, enables and parent/child relations
//! around the selection.
//!
//! Each relation view is walked independently: a cycle through `requires`
//! edges says nothing about `enables` edges. Only the selected elements and
//! their direct neighbours in a view take part, so cost follows selection
//! size rather than fandom size.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::context::ValidationContext;
use super::result::{Severity, Stage, ValidationIssue};
use crate::graph::{EntityGraph, RelationView};
use crate::types::ElementId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CycleEdge {
    pub from: ElementId,
    pub to: ElementId,
}

/// One cycle, found through one back edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircularChain {
    /// Cycle members in traversal order, starting at the back edge target.
    pub path: Vec<ElementId>,
    pub relationship_type: RelationView,
    pub severity: Severity,
    /// The back edge that closed the cycle, from the last path element to the first.
    pub closing_edge: CycleEdge,
    /// True when `closing_edge` occurs exactly once across all reported
    /// cycles, so removing it touches no other cycle.
    pub can_break_cycle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleElement {
    pub element_id: ElementId,
    pub cycle_count: usize,
    /// True when every cycle through this element can be broken by an edge.
    pub can_break_cycle: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircularResult {
    pub circular_chains: Vec<CircularChain>,
    /// Sorted by id.
    pub elements: Vec<CycleElement>,
}

impl CircularResult {
    pub fn has_cycles(&self) -> bool {
        !self.circular_chains.is_empty()
    }

    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.circular_chains
            .iter()
            .map(|chain| {
                let mut rendered: Vec<&str> = chain.path.iter().map(String::as_str).collect();
                if let Some(first) = chain.path.first() {
                    rendered.push(first);
                }
                let message = format!(
                    "Circular {} chain: {}",
                    chain.relationship_type.as_str(),
                    rendered.join(" \u{2192} ")
                );
                ValidationIssue::new(
                    Stage::CircularReferences,
                    "circular_reference",
                    chain.severity,
                    message,
                    chain.path.clone(),
                )
            })
            .collect()
    }
}

fn view_severity(view: RelationView) -> Severity {
    match view {
        RelationView::Requires | RelationView::Hierarchy => Severity::Error,
        RelationView::Enables => Severity::Warning,
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

pub fn detect_circular_references(ctx: &ValidationContext<'_>) -> CircularResult {
    let selected: Vec<&str> = ctx.known_entries().map(|e| e.id).collect();
    let mut chains = Vec::new();
    for view in RelationView::ALL {
        chains.extend(detect_in_view(ctx.graph, &selected, view));
    }
    mark_breakable(&mut chains);

    let mut membership: BTreeMap<&str, (usize, bool)> = BTreeMap::new();
    for chain in &chains {
        for id in &chain.path {
            let entry = membership.entry(id.as_str()).or_insert((0, true));
            entry.0 += 1;
            entry.1 &= chain.can_break_cycle;
        }
    }
    let elements = membership
        .into_iter()
        .map(|(id, (cycle_count, can_break_cycle))| CycleElement {
            element_id: id.to_string(),
            cycle_count,
            can_break_cycle,
        })
        .collect();

    CircularResult {
        circular_chains: chains,
        elements,
    }
}

/// Selected ids plus their direct neighbours in `view`, with the edges
/// between them.
fn induced_subgraph<'g>(
    graph: &'g EntityGraph,
    selected: &[&'g str],
    view: RelationView,
) -> BTreeMap<&'g str, Vec<&'g str>> {
    let mut nodes: BTreeSet<&'g str> = selected.iter().copied().collect();
    for id in selected {
        nodes.extend(graph.outgoing(id, view).into_iter().map(String::as_str));
        nodes.extend(graph.incoming(id, view).into_iter().map(String::as_str));
    }

    nodes
        .iter()
        .map(|&node| {
            let targets = graph
                .outgoing(node, view)
                .into_iter()
                .map(String::as_str)
                .filter(|t| nodes.contains(t))
                .collect();
            (node, targets)
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

/// White/gray/black DFS with an explicit frame stack. Every back edge
/// yields one chain.
fn detect_in_view<'g>(
    graph: &'g EntityGraph,
    selected: &[&'g str],
    view: RelationView,
) -> Vec<CircularChain> {
    let adjacency = induced_subgraph(graph, selected, view);
    let mut color: BTreeMap<&str, Color> = BTreeMap::new();
    let mut found: Vec<(Vec<&str>, CycleEdge)> = Vec::new();

    for &start in adjacency.keys() {
        if color.contains_key(start) {
            continue;
        }
        let mut path: Vec<&str> = vec![start];
        let mut frames: Vec<(&str, usize)> = vec![(start, 0)];
        color.insert(start, Color::Gray);

        while let Some(frame) = frames.last_mut() {
            let (node, next) = *frame;
            let targets = adjacency.get(node).map_or(&[][..], Vec::as_slice);
            let Some(&target) = targets.get(next) else {
                color.insert(node, Color::Black);
                frames.pop();
                path.pop();
                continue;
            };
            frame.1 += 1;

            match color.get(target) {
                None => {
                    color.insert(target, Color::Gray);
                    path.push(target);
                    frames.push((target, 0));
                }
                Some(Color::Gray) => {
                    if let Some(cycle_start) = path.iter().position(|&p| p == target) {
                        let edge = CycleEdge {
                            from: node.to_string(),
                            to: target.to_string(),
                        };
                        found.push((path[cycle_start..].to_vec(), edge));
                    }
                }
                Some(Color::Black) => {}
            }
        }
    }

    found
        .into_iter()
        .map(|(cycle, closing_edge)| CircularChain {
            path: cycle.into_iter().map(str::to_string).collect(),
            relationship_type: view,
            severity: view_severity(view),
            closing_edge,
            can_break_cycle: false,
        })
        .collect()
}

/// A closing edge breaks its cycle alone when it occurs exactly once across
/// every reported cycle, whatever the view.
fn mark_breakable(chains: &mut [CircularChain]) {
    let mut occurrences: BTreeMap<(String, String), usize> = BTreeMap::new();
    for chain in chains.iter() {
        let path: Vec<&str> = chain.path.iter().map(String::as_str).collect();
        for (from, to) in cycle_edges(&path) {
            *occurrences
                .entry((from.to_string(), to.to_string()))
                .or_default() += 1;
        }
    }

    for chain in chains.iter_mut() {
        let key = (chain.closing_edge.from.clone(), chain.closing_edge.to.clone());
        chain.can_break_cycle = occurrences.get(&key) == Some(&1);
    }
}

/// Consecutive pairs of a cycle path, including the wrap-around edge from
/// the last member back to the first.
fn cycle_edges<'g>(cycle: &[&'g str]) -> Vec<(&'g str, &'g str)> {
    cycle
        .iter()
        .zip(cycle.iter().cycle().skip(1))
        .map(|(&from, &to)| (from, to))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::*;
    use crate::graph::FandomData;
    use crate::validation::context::Selection;

    fn requiring(id: &str, requires: &[&str]) -> crate::graph::PlotBlock {
        let mut b = block(id, "arc");
        b.requires = requires.iter().map(|s| s.to_string()).collect();
        b
    }

    fn blocks_selection(ids: &[&str]) -> Selection {
        Selection {
            plot_block_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn reports_three_cycle_over_requires() {
        let graph = graph(FandomData {
            plot_blocks: vec![
                requiring("A", &["B"]),
                requiring("B", &["C"]),
                requiring("C", &["A"]),
            ],
            ..Default::default()
        });
        let selection = blocks_selection(&["A", "B", "C"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        let result = detect_circular_references(&ctx);

        assert_eq!(result.circular_chains.len(), 1);
        let chain = &result.circular_chains[0];
        assert_eq!(chain.relationship_type, RelationView::Requires);
        assert_eq!(chain.relationship_type.as_str(), "requires");
        let members: BTreeSet<&str> = chain.path.iter().map(String::as_str).collect();
        assert_eq!(members, BTreeSet::from(["A", "B", "C"]));
        assert_eq!(chain.path, ["A", "B", "C"]);
        assert_eq!(chain.closing_edge, CycleEdge { from: "C".into(), to: "A".into() });
        assert!(chain.can_break_cycle);
        assert_eq!(result.elements.len(), 3);
        assert!(result.issues().iter().all(|i| i.severity == Severity::Error));
    }

    #[test]
    fn cycle_reachable_from_one_selected_element_is_found_through_neighbours() {
        let graph = graph(FandomData {
            plot_blocks: vec![requiring("A", &["B"]), requiring("B", &["A"])],
            ..Default::default()
        });
        let selection = blocks_selection(&["A"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        let result = detect_circular_references(&ctx);
        assert_eq!(result.circular_chains.len(), 1);
        assert_eq!(result.circular_chains[0].path, ["A", "B"]);
    }

    #[test]
    fn acyclic_selection_has_no_chains() {
        let graph = graph(FandomData {
            plot_blocks: vec![requiring("A", &["B"]), requiring("B", &["C"]), block("C", "arc")],
            ..Default::default()
        });
        let selection = blocks_selection(&["A", "B", "C"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        let result = detect_circular_references(&ctx);
        assert!(!result.has_cycles());
        assert!(result.elements.is_empty());
    }

    #[test]
    fn relation_views_are_independent() {
        // A requires B and B enables A. Merged these would form a cycle.
        let mut a = requiring("A", &["B"]);
        a.enabled_by = vec!["B".into()];
        let graph = graph(FandomData {
            plot_blocks: vec![a, block("B", "arc")],
            ..Default::default()
        });
        let selection = blocks_selection(&["A", "B"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        assert!(!detect_circular_references(&ctx).has_cycles());
    }

    #[test]
    fn enables_cycles_are_warnings() {
        let mut a = block("A", "arc");
        a.enabled_by = vec!["B".into()];
        let mut b = block("B", "arc");
        b.enabled_by = vec!["A".into()];
        let graph = graph(FandomData {
            plot_blocks: vec![a, b],
            ..Default::default()
        });
        let selection = blocks_selection(&["A", "B"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        let result = detect_circular_references(&ctx);
        assert_eq!(result.circular_chains.len(), 1);
        assert_eq!(result.circular_chains[0].relationship_type, RelationView::Enables);
        assert_eq!(result.circular_chains[0].severity, Severity::Warning);
    }

    #[test]
    fn hierarchy_cycle_is_an_error() {
        let mut a = block("A", "arc");
        a.parent_id = Some("B".into());
        let mut b = block("B", "arc");
        b.parent_id = Some("A".into());
        let graph = graph(FandomData {
            plot_blocks: vec![a, b],
            ..Default::default()
        });
        let selection = blocks_selection(&["A"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        let result = detect_circular_references(&ctx);
        assert_eq!(result.circular_chains.len(), 1);
        let chain = &result.circular_chains[0];
        assert_eq!(chain.relationship_type, RelationView::Hierarchy);
        assert_eq!(chain.severity, Severity::Error);
    }

    #[test]
    fn finished_nodes_do_not_yield_duplicate_chains() {
        let graph = graph(FandomData {
            plot_blocks: vec![
                requiring("A", &["B", "C"]),
                requiring("B", &["A"]),
                requiring("C", &["B"]),
            ],
            ..Default::default()
        });
        let selection = blocks_selection(&["A", "B", "C"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        let result = detect_circular_references(&ctx);

        assert_eq!(result.circular_chains.len(), 1);
        let chain = &result.circular_chains[0];
        assert_eq!(chain.path, ["A", "B"]);
        assert!(chain.can_break_cycle);
    }

    #[test]
    fn closing_edge_in_one_cycle_can_break() {
        // Back edges C -> A and C -> B each close exactly one reported cycle.
        let graph = graph(FandomData {
            plot_blocks: vec![
                requiring("A", &["B"]),
                requiring("B", &["C"]),
                requiring("C", &["A", "B"]),
            ],
            ..Default::default()
        });
        let selection = blocks_selection(&["A", "B", "C"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        let result = detect_circular_references(&ctx);

        assert_eq!(result.circular_chains.len(), 2);
        let first = &result.circular_chains[0];
        assert_eq!(first.path, ["A", "B", "C"]);
        assert!(first.can_break_cycle);
        let second = &result.circular_chains[1];
        assert_eq!(second.path, ["B", "C"]);
        assert_eq!(second.closing_edge, CycleEdge { from: "C".into(), to: "B".into() });
        assert!(second.can_break_cycle);

        let b = result.elements.iter().find(|e| e.element_id == "B").unwrap();
        assert_eq!(b.cycle_count, 2);
        assert!(b.can_break_cycle);
    }

    #[test]
    fn closing_edge_shared_across_views_cannot_break_alone() {
        // B -> A closes a requires cycle and a hierarchy cycle (A parent of
        // B, B parent of A), so it occurs twice.
        let mut a = requiring("A", &["B"]);
        a.children = vec!["B".into()];
        let mut b = requiring("B", &["A"]);
        b.children = vec!["A".into()];
        let graph = graph(FandomData {
            plot_blocks: vec![a, b],
            ..Default::default()
        });
        let selection = blocks_selection(&["A", "B"]);
        let ctx = ValidationContext::new(&selection, &graph, &[]);

        let result = detect_circular_references(&ctx);

        assert_eq!(result.circular_chains.len(), 2);
        for chain in &result.circular_chains {
            assert_eq!(chain.closing_edge, CycleEdge { from: "B".into(), to: "A".into() });
            assert!(!chain.can_break_cycle);
        }
        let a = result.elements.iter().find(|e| e.element_id == "A").unwrap();
        assert_eq!(a.cycle_count, 2);
        assert!(!a.can_break_cycle);
    }

    #[test]
    fn cycle_edges_wrap_around() {
        assert_eq!(cycle_edges(&["A", "B", "C"]), [("A", "B"), ("B", "C"), ("C", "A")]);
    }
}
