//! Pathway validation: the per-call context, the individual validators and
//! the orchestrator that runs them.

pub mod circular;
pub mod conflict;
pub mod context;
pub mod dependency;
pub mod evaluator;
pub mod orchestrator;
pub mod result;
pub mod rules;
pub mod selection;
pub mod tag_class;
