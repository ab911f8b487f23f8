//! Id-keyed arena over a fandom's entities plus reverse-lookup indices.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::entities::{ElementKind, FandomData, PlotBlock, PlotBlockCondition, Tag, TagClass};
use crate::error::GraphBuildError;
use crate::types::{ElementId, FandomId, TagClassId};

/// The relation kinds that cycle detection walks independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationView {
    #[serde(rename = "requires")]
    Requires,
    #[serde(rename = "enables")]
    Enables,
    #[serde(rename = "parent_child")]
    Hierarchy,
}

impl RelationView {
    pub const ALL: [RelationView; 3] = [Self::Requires, Self::Enables, Self::Hierarchy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "requires",
            Self::Enables => "enables",
            Self::Hierarchy => "parent_child",
        }
    }
}

type Adjacency = BTreeMap<ElementId, BTreeSet<ElementId>>;

/// Read-only index over one fandom's tags, tag classes, plot blocks and
/// conditions.
///
/// Built once per fandom and safe to share across threads; validators only
/// ever borrow it.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    fandom_id: FandomId,
    tags: BTreeMap<ElementId, Tag>,
    tag_classes: BTreeMap<TagClassId, TagClass>,
    plot_blocks: BTreeMap<ElementId, PlotBlock>,
    conditions: BTreeMap<ElementId, PlotBlockCondition>,
    kinds: BTreeMap<ElementId, ElementKind>,
    class_members: BTreeMap<TagClassId, Vec<ElementId>>,
    block_conditions: BTreeMap<ElementId, Vec<ElementId>>,
    /// Symmetric closure of every `conflicts_with` list.
    conflicts: Adjacency,
    required_by: Adjacency,
    enables: Adjacency,
    enabled_from: Adjacency,
    children: Adjacency,
    parents: Adjacency,
}

impl EntityGraph {
    /// Index `data` for `fandom_id`, rejecting any structural corruption.
    pub fn build(fandom_id: impl Into<FandomId>, data: FandomData) -> Result<Self, GraphBuildError> {
        let mut graph = EntityGraph {
            fandom_id: fandom_id.into(),
            ..Default::default()
        };

        for tag in data.tags {
            graph.check_fandom("Tag", &tag.id, &tag.fandom_id)?;
            graph.register_element("Tag", &tag.id, ElementKind::Tag)?;
            graph.tags.insert(tag.id.clone(), tag);
        }
        for block in data.plot_blocks {
            graph.check_fandom("PlotBlock", &block.id, &block.fandom_id)?;
            graph.register_element("PlotBlock", &block.id, ElementKind::PlotBlock)?;
            graph.plot_blocks.insert(block.id.clone(), block);
        }
        for condition in data.conditions {
            graph.register_element("PlotBlockCondition", &condition.id, ElementKind::Condition)?;
            graph.conditions.insert(condition.id.clone(), condition);
        }
        for class in data.tag_classes {
            graph.check_fandom("TagClass", &class.id, &class.fandom_id)?;
            if graph.tag_classes.contains_key(&class.id) {
                return Err(GraphBuildError::DuplicateId {
                    entity: "TagClass",
                    id: class.id,
                });
            }
            graph.tag_classes.insert(class.id.clone(), class);
        }

        graph.check_tags()?;
        graph.check_tag_classes()?;
        graph.check_plot_blocks()?;
        graph.check_conditions()?;
        graph.index_relations();

        Ok(graph)
    }

    fn check_fandom(&self, entity: &'static str, id: &str, fandom_id: &str) -> Result<(), GraphBuildError> {
        if fandom_id != self.fandom_id {
            return Err(GraphBuildError::FandomMismatch {
                entity,
                id: id.to_string(),
                expected: self.fandom_id.clone(),
                actual: fandom_id.to_string(),
            });
        }
        Ok(())
    }

    fn register_element(
        &mut self,
        entity: &'static str,
        id: &str,
        kind: ElementKind,
    ) -> Result<(), GraphBuildError> {
        if self.kinds.insert(id.to_string(), kind).is_some() {
            return Err(GraphBuildError::DuplicateId {
                entity,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn check_tags(&self) -> Result<(), GraphBuildError> {
        for tag in self.tags.values() {
            if let Some(class_id) = &tag.tag_class_id {
                if !self.tag_classes.contains_key(class_id) {
                    return Err(dangling("Tag", &tag.id, "tag_class_id", class_id));
                }
            }
            let is_tag_or_block =
                |id: &str| matches!(self.kind_of(id), Some(ElementKind::Tag | ElementKind::PlotBlock));
            check_list("Tag", &tag.id, "requires", &tag.requires, is_tag_or_block)?;
            check_list("Tag", &tag.id, "enhances", &tag.enhances, is_tag_or_block)?;
        }
        Ok(())
    }

    fn check_tag_classes(&self) -> Result<(), GraphBuildError> {
        let is_tag = |id: &str| self.tags.contains_key(id);
        let is_class = |id: &str| self.tag_classes.contains_key(id);
        let is_block = |id: &str| self.plot_blocks.contains_key(id);
        let is_element = |id: &str| self.kinds.contains_key(id);

        for class in self.tag_classes.values() {
            let rules = &class.validation_rules;
            let id = class.id.as_str();
            if let Some(exclusion) = &rules.mutual_exclusion {
                check_list("TagClass", id, "conflicting_tags", &exclusion.conflicting_tags, is_tag)?;
                check_list("TagClass", id, "conflicting_classes", &exclusion.conflicting_classes, is_class)?;
            }
            if let Some(context) = &rules.required_context {
                check_list("TagClass", id, "required_tags", &context.required_tags, is_tag)?;
                check_list("TagClass", id, "required_classes", &context.required_classes, is_class)?;
            }
            if let Some(restrictions) = &rules.category_restrictions {
                check_list(
                    "TagClass",
                    id,
                    "required_plot_blocks",
                    &restrictions.required_plot_blocks,
                    is_block,
                )?;
            }
            if let Some(hints) = &rules.dependencies {
                check_list("TagClass", id, "dependencies.requires", &hints.requires, is_element)?;
                check_list("TagClass", id, "dependencies.enhances", &hints.enhances, is_element)?;
                check_list("TagClass", id, "dependencies.enables", &hints.enables, is_element)?;
            }
            if let Some(limits) = &rules.instance_limits {
                check_limits(id, limits.min_instances, limits.max_instances, limits.exact_instances)?;
            }
        }
        Ok(())
    }

    fn check_plot_blocks(&self) -> Result<(), GraphBuildError> {
        let is_element = |id: &str| self.kinds.contains_key(id);
        let is_block = |id: &str| self.plot_blocks.contains_key(id);

        for block in self.plot_blocks.values() {
            let id = block.id.as_str();
            check_list("PlotBlock", id, "conflicts_with", &block.conflicts_with, is_element)?;
            check_list("PlotBlock", id, "requires", &block.requires, is_element)?;
            check_list("PlotBlock", id, "soft_requires", &block.soft_requires, is_element)?;
            check_list("PlotBlock", id, "enhances", &block.enhances, is_element)?;
            check_list("PlotBlock", id, "enabled_by", &block.enabled_by, is_element)?;
            check_list("PlotBlock", id, "children", &block.children, is_block)?;
            if let Some(parent) = &block.parent_id {
                check_list("PlotBlock", id, "parent_id", std::slice::from_ref(parent), is_block)?;
            }
        }
        Ok(())
    }

    fn check_conditions(&self) -> Result<(), GraphBuildError> {
        let is_element = |id: &str| self.kinds.contains_key(id);
        let is_condition = |id: &str| self.conditions.contains_key(id);

        for condition in self.conditions.values() {
            if !self.plot_blocks.contains_key(&condition.plot_block_id) {
                return Err(GraphBuildError::UnknownPlotBlock {
                    condition_id: condition.id.clone(),
                    plot_block_id: condition.plot_block_id.clone(),
                });
            }
            let id = condition.id.as_str();
            let entity = "PlotBlockCondition";
            check_list(entity, id, "conflicts_with", &condition.conflicts_with, is_element)?;
            check_list(entity, id, "requires", &condition.requires, is_element)?;
            check_list(entity, id, "enables", &condition.enables, is_element)?;
            check_list(entity, id, "children", &condition.children, is_condition)?;
        }
        Ok(())
    }

    fn index_relations(&mut self) {
        fn link(map: &mut Adjacency, from: &str, to: &str) {
            map.entry(from.to_string()).or_default().insert(to.to_string());
        }

        for tag in self.tags.values() {
            if let Some(class_id) = &tag.tag_class_id {
                self.class_members
                    .entry(class_id.clone())
                    .or_default()
                    .push(tag.id.clone());
            }
            for target in &tag.requires {
                link(&mut self.required_by, target, &tag.id);
            }
        }

        for block in self.plot_blocks.values() {
            for target in &block.conflicts_with {
                link(&mut self.conflicts, &block.id, target);
                link(&mut self.conflicts, target, &block.id);
            }
            for target in &block.requires {
                link(&mut self.required_by, target, &block.id);
            }
            for enabler in &block.enabled_by {
                link(&mut self.enables, enabler, &block.id);
                link(&mut self.enabled_from, &block.id, enabler);
            }
            for child in &block.children {
                link(&mut self.children, &block.id, child);
                link(&mut self.parents, child, &block.id);
            }
            if let Some(parent) = &block.parent_id {
                link(&mut self.children, parent, &block.id);
                link(&mut self.parents, &block.id, parent);
            }
        }

        let mut ordered: Vec<&PlotBlockCondition> = self.conditions.values().collect();
        ordered.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        for condition in ordered {
            self.block_conditions
                .entry(condition.plot_block_id.clone())
                .or_default()
                .push(condition.id.clone());
            for target in &condition.conflicts_with {
                link(&mut self.conflicts, &condition.id, target);
                link(&mut self.conflicts, target, &condition.id);
            }
            for target in &condition.requires {
                link(&mut self.required_by, target, &condition.id);
            }
            for target in &condition.enables {
                link(&mut self.enables, &condition.id, target);
                link(&mut self.enabled_from, target, &condition.id);
            }
            for child in &condition.children {
                link(&mut self.children, &condition.id, child);
                link(&mut self.parents, child, &condition.id);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Entity access
    // -----------------------------------------------------------------------

    pub fn fandom_id(&self) -> &str {
        &self.fandom_id
    }

    pub fn kind_of(&self, id: &str) -> Option<ElementKind> {
        self.kinds.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.kinds.contains_key(id)
    }

    pub fn tag(&self, id: &str) -> Option<&Tag> {
        self.tags.get(id)
    }

    pub fn tag_class(&self, id: &str) -> Option<&TagClass> {
        self.tag_classes.get(id)
    }

    pub fn plot_block(&self, id: &str) -> Option<&PlotBlock> {
        self.plot_blocks.get(id)
    }

    pub fn condition(&self, id: &str) -> Option<&PlotBlockCondition> {
        self.conditions.get(id)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn tag_classes(&self) -> impl Iterator<Item = &TagClass> {
        self.tag_classes.values()
    }

    pub fn plot_blocks(&self) -> impl Iterator<Item = &PlotBlock> {
        self.plot_blocks.values()
    }

    pub fn conditions(&self) -> impl Iterator<Item = &PlotBlockCondition> {
        self.conditions.values()
    }

    /// Number of tags, plot blocks and conditions.
    pub fn element_count(&self) -> usize {
        self.kinds.len()
    }

    /// Member tag ids of a class, in id order.
    pub fn members_of(&self, class_id: &str) -> &[ElementId] {
        self.class_members.get(class_id).map_or(&[], Vec::as_slice)
    }

    /// Condition ids of a plot block, ordered by their `order` field.
    pub fn conditions_of(&self, plot_block_id: &str) -> &[ElementId] {
        self.block_conditions.get(plot_block_id).map_or(&[], Vec::as_slice)
    }

    /// Category of a tag or plot block. Conditions inherit their block's.
    pub fn category_of(&self, id: &str) -> Option<&str> {
        match self.kind_of(id)? {
            ElementKind::Tag => self.tags.get(id)?.category.as_deref(),
            ElementKind::PlotBlock => Some(self.plot_blocks.get(id)?.category.as_str()),
            ElementKind::Condition => {
                let block_id = &self.conditions.get(id)?.plot_block_id;
                Some(self.plot_blocks.get(block_id)?.category.as_str())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Relations
    // -----------------------------------------------------------------------

    /// Hard requirements declared by an element.
    pub fn hard_requirements(&self, id: &str) -> &[ElementId] {
        match self.kind_of(id) {
            Some(ElementKind::Tag) => self.tags.get(id).map_or(&[], |t| t.requires.as_slice()),
            Some(ElementKind::PlotBlock) => {
                self.plot_blocks.get(id).map_or(&[], |b| b.requires.as_slice())
            }
            Some(ElementKind::Condition) => {
                self.conditions.get(id).map_or(&[], |c| c.requires.as_slice())
            }
            None => &[],
        }
    }

    pub fn soft_requirements(&self, id: &str) -> &[ElementId] {
        self.plot_blocks
            .get(id)
            .map_or(&[], |b| b.soft_requires.as_slice())
    }

    pub fn enhancements(&self, id: &str) -> &[ElementId] {
        match self.kind_of(id) {
            Some(ElementKind::Tag) => self.tags.get(id).map_or(&[], |t| t.enhances.as_slice()),
            Some(ElementKind::PlotBlock) => {
                self.plot_blocks.get(id).map_or(&[], |b| b.enhances.as_slice())
            }
            _ => &[],
        }
    }

    /// Elements a plot block declares as its enablers.
    pub fn enablers_of(&self, id: &str) -> &[ElementId] {
        self.plot_blocks.get(id).map_or(&[], |b| b.enabled_by.as_slice())
    }

    /// Whether `from` itself lists `to` in `conflicts_with`.
    pub fn declares_conflict(&self, from: &str, to: &str) -> bool {
        match self.kind_of(from) {
            Some(ElementKind::PlotBlock) => self
                .plot_blocks
                .get(from)
                .is_some_and(|b| b.conflicts_with.iter().any(|c| c == to)),
            Some(ElementKind::Condition) => self
                .conditions
                .get(from)
                .is_some_and(|c| c.conflicts_with.iter().any(|t| t == to)),
            _ => false,
        }
    }

    /// Everything in conflict with `id`, whichever side declared it.
    pub fn conflicts_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a ElementId> + 'a {
        neighbours(&self.conflicts, id)
    }

    pub fn required_by<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a ElementId> + 'a {
        neighbours(&self.required_by, id)
    }

    pub fn children_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a ElementId> + 'a {
        neighbours(&self.children, id)
    }

    pub fn parents_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a ElementId> + 'a {
        neighbours(&self.parents, id)
    }

    /// Outgoing edges of `id` in one relation view, in id order.
    pub fn outgoing(&self, id: &str, view: RelationView) -> Vec<&ElementId> {
        match view {
            RelationView::Requires => {
                let mut targets: Vec<&ElementId> = self.hard_requirements(id).iter().collect();
                targets.sort();
                targets.dedup();
                targets
            }
            RelationView::Enables => neighbours(&self.enables, id).collect(),
            RelationView::Hierarchy => neighbours(&self.children, id).collect(),
        }
    }

    /// Incoming edges of `id` in one relation view, in id order.
    pub fn incoming(&self, id: &str, view: RelationView) -> Vec<&ElementId> {
        match view {
            RelationView::Requires => neighbours(&self.required_by, id).collect(),
            RelationView::Enables => neighbours(&self.enabled_from, id).collect(),
            RelationView::Hierarchy => neighbours(&self.parents, id).collect(),
        }
    }

    /// All plot blocks and conditions below `id` in the hierarchy, excluding
    /// `id` itself. Terminates on cyclic hierarchies.
    pub fn descendants(&self, id: &str) -> BTreeSet<&ElementId> {
        walk(&self.children, id)
    }

    /// All ancestors of `id`, excluding `id` itself.
    pub fn ancestors(&self, id: &str) -> BTreeSet<&ElementId> {
        walk(&self.parents, id)
    }
}

fn neighbours<'a>(map: &'a Adjacency, id: &str) -> impl Iterator<Item = &'a ElementId> + 'a {
    map.get(id).into_iter().flatten()
}

/// Iterative reachability over an adjacency map.
fn walk<'a>(map: &'a Adjacency, start: &str) -> BTreeSet<&'a ElementId> {
    let mut seen: BTreeSet<&ElementId> = BTreeSet::new();
    let mut stack: Vec<&ElementId> = neighbours(map, start).collect();
    while let Some(next) = stack.pop() {
        if next == start || !seen.insert(next) {
            continue;
        }
        stack.extend(neighbours(map, next));
    }
    seen
}

fn dangling(entity: &'static str, id: &str, relation: &'static str, target: &str) -> GraphBuildError {
    GraphBuildError::DanglingReference {
        entity,
        id: id.to_string(),
        relation,
        target: target.to_string(),
    }
}

fn check_list(
    entity: &'static str,
    id: &str,
    relation: &'static str,
    targets: &[ElementId],
    exists: impl Fn(&str) -> bool,
) -> Result<(), GraphBuildError> {
    for target in targets {
        if target == id {
            return Err(GraphBuildError::SelfReference {
                entity,
                id: id.to_string(),
                relation,
            });
        }
        if !exists(target) {
            return Err(dangling(entity, id, relation, target));
        }
    }
    Ok(())
}

fn check_limits(
    class_id: &str,
    min: Option<u32>,
    max: Option<u32>,
    exact: Option<u32>,
) -> Result<(), GraphBuildError> {
    let invalid = |reason: String| GraphBuildError::InvalidInstanceLimits {
        class_id: class_id.to_string(),
        reason,
    };
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(invalid(format!("min {min} exceeds max {max}")));
        }
    }
    if let Some(exact) = exact {
        if min.is_some_and(|min| exact < min) || max.is_some_and(|max| exact > max) {
            return Err(invalid(format!("exact {exact} lies outside min/max")));
        }
    }
    Ok(())
}
