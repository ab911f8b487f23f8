//! Pathway validation engine.
//!
//! Pure logic with no I/O: the caller hands in a fandom's entity graph, its
//! rule corpus and a user's selection, and gets back a [`ValidationResult`].
//! Building the graph is the only fallible step; every semantic finding is
//! reported as data.

pub mod error;
pub mod graph;
pub mod types;
pub mod validation;

pub use error::{CoreError, GraphBuildError, RuleEvaluationError};
pub use graph::EntityGraph;
pub use validation::circular::detect_circular_references;
pub use validation::conflict::detect_conflicts;
pub use validation::context::{PredicateRegistry, Selection, ValidationContext};
pub use validation::dependency::resolve_dependencies;
pub use validation::evaluator::evaluate_rules;
pub use validation::orchestrator::{validate, Validator, ValidatorConfig};
pub use validation::result::ValidationResult;
pub use validation::tag_class::validate_tag_classes;
