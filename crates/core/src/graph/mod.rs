//! Entity graph model: the tags, tag classes, plot blocks and conditions of
//! one fandom, indexed for the validators.

pub mod entities;
pub mod index;

pub use entities::{
    CategoryRestrictions, DependencyHints, ElementKind, FandomData, InstanceLimits,
    MutualExclusion, PlotBlock, PlotBlockCondition, RequiredContext, Tag, TagClass,
    ValidationRules,
};
pub use index::{EntityGraph, RelationView};
