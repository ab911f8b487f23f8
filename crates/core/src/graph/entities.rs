//! Entity records supplied by the content-management side.
//!
//! These are plain data. Relationships are stored as id lists; the
//! [`EntityGraph`](super::EntityGraph) turns them into lookup indices.

use serde::{Deserialize, Serialize};

use crate::types::{ElementId, FandomId, TagClassId};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// A classification tag a user can add to a pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: ElementId,
    pub fandom_id: FandomId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag_class_id: Option<TagClassId>,
    /// Category used by tag-class category restrictions.
    #[serde(default)]
    pub category: Option<String>,
    /// Tags or plot blocks that must also be selected.
    #[serde(default)]
    pub requires: Vec<ElementId>,
    /// Tags or plot blocks this tag works well with.
    #[serde(default)]
    pub enhances: Vec<ElementId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Tag classes
// ---------------------------------------------------------------------------

/// A named grouping of tags that share validation constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagClass {
    pub id: TagClassId,
    pub fandom_id: FandomId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub validation_rules: ValidationRules,
}

/// Optional constraint groups attached to a tag class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub mutual_exclusion: Option<MutualExclusion>,
    #[serde(default)]
    pub required_context: Option<RequiredContext>,
    #[serde(default)]
    pub instance_limits: Option<InstanceLimits>,
    #[serde(default)]
    pub category_restrictions: Option<CategoryRestrictions>,
    #[serde(default)]
    pub dependencies: Option<DependencyHints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutualExclusion {
    /// At most one member of the class may be selected.
    #[serde(default)]
    pub within_class: bool,
    #[serde(default)]
    pub conflicting_tags: Vec<ElementId>,
    #[serde(default)]
    pub conflicting_classes: Vec<TagClassId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredContext {
    #[serde(default)]
    pub required_tags: Vec<ElementId>,
    #[serde(default)]
    pub required_classes: Vec<TagClassId>,
    /// Selection metadata keys that must be present.
    #[serde(default)]
    pub required_metadata: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceLimits {
    #[serde(default)]
    pub min_instances: Option<u32>,
    #[serde(default)]
    pub max_instances: Option<u32>,
    #[serde(default)]
    pub exact_instances: Option<u32>,
}

/// Category restrictions, in a single flat shape: the categories member tags
/// may carry, plus plot blocks that must be selected alongside the class.
///
/// `applicable_categories` only constrains members that have a category;
/// uncategorised members pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryRestrictions {
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default)]
    pub required_plot_blocks: Vec<ElementId>,
}

/// Class-level dependency hints, applied when any member is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyHints {
    #[serde(default)]
    pub requires: Vec<ElementId>,
    #[serde(default)]
    pub enhances: Vec<ElementId>,
    #[serde(default)]
    pub enables: Vec<ElementId>,
}

// ---------------------------------------------------------------------------
// Plot blocks
// ---------------------------------------------------------------------------

/// A hierarchical narrative element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotBlock {
    pub id: ElementId,
    pub fandom_id: FandomId,
    #[serde(default)]
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub conflicts_with: Vec<ElementId>,
    #[serde(default)]
    pub requires: Vec<ElementId>,
    #[serde(default)]
    pub soft_requires: Vec<ElementId>,
    #[serde(default)]
    pub enhances: Vec<ElementId>,
    /// The block is only meaningful once one of these is selected.
    #[serde(default)]
    pub enabled_by: Vec<ElementId>,
    #[serde(default)]
    pub excludes_categories: Vec<String>,
    /// Maximum number of selected descendants under this block.
    #[serde(default)]
    pub max_instances: Option<u32>,
    #[serde(default)]
    pub parent_id: Option<ElementId>,
    #[serde(default)]
    pub children: Vec<ElementId>,
}

/// A branching sub-choice owned by a plot block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotBlockCondition {
    pub id: ElementId,
    pub plot_block_id: ElementId,
    #[serde(default)]
    pub name: String,
    /// Position among the plot block's conditions.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub conflicts_with: Vec<ElementId>,
    #[serde(default)]
    pub requires: Vec<ElementId>,
    #[serde(default)]
    pub enables: Vec<ElementId>,
    #[serde(default)]
    pub children: Vec<ElementId>,
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

/// Raw entity records for one fandom, as loaded by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FandomData {
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub tag_classes: Vec<TagClass>,
    #[serde(default)]
    pub plot_blocks: Vec<PlotBlock>,
    #[serde(default)]
    pub conditions: Vec<PlotBlockCondition>,
}

/// Which entity table an element id resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Tag,
    PlotBlock,
    Condition,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::PlotBlock => "plot_block",
            Self::Condition => "condition",
        }
    }
}

fn default_true() -> bool {
    true
}
