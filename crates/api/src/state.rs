use std::sync::Arc;

use pathway_core::{PredicateRegistry, Validator};

use crate::config::ServerConfig;
use crate::corpus::CorpusStore;
use crate::predicates::service_predicates;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Cached fandom corpora.
    pub corpora: Arc<CorpusStore>,
    /// Custom predicates available to rule conditions.
    pub predicates: Arc<PredicateRegistry>,
    /// Validation engine configured from `config.validator`.
    pub validator: Arc<Validator>,
}

impl AppState {
    /// Fresh state with an empty corpus cache and the service predicates.
    pub fn new(config: ServerConfig) -> Self {
        let validator = Validator::new(config.validator.clone());
        Self {
            config: Arc::new(config),
            corpora: Arc::new(CorpusStore::new()),
            predicates: Arc::new(service_predicates()),
            validator: Arc::new(validator),
        }
    }
}
