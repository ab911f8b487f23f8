//! The per-call snapshot every validator borrows.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::rules::ValidationRule;
use crate::graph::{ElementKind, EntityGraph};
use crate::types::ElementId;

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// The tags, plot blocks and conditions a user has chosen for a pathway.
///
/// List order is recency: later entries were added more recently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub tag_ids: Vec<ElementId>,
    #[serde(default)]
    pub plot_block_ids: Vec<ElementId>,
    #[serde(default)]
    pub condition_ids: Vec<ElementId>,
    /// Free-form pathway metadata checked by required-context rules.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.tag_ids.is_empty() && self.plot_block_ids.is_empty() && self.condition_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tag_ids.len() + self.plot_block_ids.len() + self.condition_ids.len()
    }
}

/// One deduplicated selection entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedEntry<'a> {
    pub id: &'a str,
    /// The list the id was selected through.
    pub listed_as: ElementKind,
    /// Index within that list; larger is more recent.
    pub position: usize,
}

// ---------------------------------------------------------------------------
// Custom predicates
// ---------------------------------------------------------------------------

/// What a custom rule predicate gets to look at.
pub struct PredicateInput<'a> {
    pub context: &'a ValidationContext<'a>,
    /// The condition's `parameters` object.
    pub params: &'a serde_json::Value,
}

pub type CustomPredicate = Arc<dyn Fn(&PredicateInput<'_>) -> bool + Send + Sync>;

/// Named predicate functions that `custom` rule conditions may call.
///
/// The core ships none; the embedding service registers its own.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: BTreeMap<String, CustomPredicate>,
}

static NO_PREDICATES: PredicateRegistry = PredicateRegistry {
    predicates: BTreeMap::new(),
};

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&PredicateInput<'_>) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(predicate));
        self
    }

    pub fn get(&self, name: &str) -> Option<&CustomPredicate> {
        self.predicates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.predicates.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Immutable inputs for one validation call: the selection, the fandom's
/// entity graph and its rule corpus. No validator mutates any of it.
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    pub selection: &'a Selection,
    pub graph: &'a EntityGraph,
    pub rules: &'a [ValidationRule],
    pub predicates: &'a PredicateRegistry,
    entries: Vec<SelectedEntry<'a>>,
    lookup: HashMap<&'a str, usize>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(selection: &'a Selection, graph: &'a EntityGraph, rules: &'a [ValidationRule]) -> Self {
        let lists = [
            (ElementKind::Tag, &selection.tag_ids),
            (ElementKind::PlotBlock, &selection.plot_block_ids),
            (ElementKind::Condition, &selection.condition_ids),
        ];

        let mut entries = Vec::with_capacity(selection.len());
        let mut lookup = HashMap::with_capacity(selection.len());
        for (kind, ids) in lists {
            for (position, id) in ids.iter().enumerate() {
                if lookup.contains_key(id.as_str()) {
                    continue;
                }
                lookup.insert(id.as_str(), entries.len());
                entries.push(SelectedEntry {
                    id: id.as_str(),
                    listed_as: kind,
                    position,
                });
            }
        }

        Self {
            selection,
            graph,
            rules,
            predicates: &NO_PREDICATES,
            entries,
            lookup,
        }
    }

    pub fn with_predicates(mut self, predicates: &'a PredicateRegistry) -> Self {
        self.predicates = predicates;
        self
    }

    /// Every distinct selected id, tags first, then plot blocks, then
    /// conditions, each in selection order.
    pub fn entries(&self) -> &[SelectedEntry<'a>] {
        &self.entries
    }

    /// Entries that exist in the graph under the kind they were listed as.
    pub fn known_entries(&self) -> impl Iterator<Item = &SelectedEntry<'a>> + '_ {
        self.entries
            .iter()
            .filter(|e| self.graph.kind_of(e.id) == Some(e.listed_as))
    }

    pub fn entry(&self, id: &str) -> Option<&SelectedEntry<'a>> {
        self.lookup.get(id).map(|&i| &self.entries[i])
    }

    /// Whether `id` is selected and resolves to an entity of the listed kind.
    pub fn is_selected(&self, id: &str) -> bool {
        self.entry(id)
            .is_some_and(|e| self.graph.kind_of(e.id) == Some(e.listed_as))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.entry(id).map(|e| e.position)
    }

    pub fn selected_of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &'a str> + '_ {
        self.known_entries()
            .filter(move |e| e.listed_as == kind)
            .map(|e| e.id)
    }

    pub fn selected_tags(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.selected_of_kind(ElementKind::Tag)
    }

    pub fn selected_plot_blocks(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.selected_of_kind(ElementKind::PlotBlock)
    }

    pub fn selected_conditions(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.selected_of_kind(ElementKind::Condition)
    }

    /// Selected member tags of a class, in selection order.
    pub fn selected_members(&self, class_id: &str) -> Vec<&'a str> {
        self.selected_tags()
            .filter(|id| {
                self.graph
                    .tag(id)
                    .is_some_and(|t| t.tag_class_id.as_deref() == Some(class_id))
            })
            .collect()
    }
}
