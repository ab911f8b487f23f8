//! In-memory cache of fandom corpora.
//!
//! A corpus is a built [`EntityGraph`] plus the rules that passed structural
//! checks. Corpora are immutable once built; an upload replaces the whole
//! entry, so in-flight validations keep the `Arc` they started with.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pathway_core::graph::FandomData;
use pathway_core::types::FandomId;
use pathway_core::validation::rules::ValidationRule;
use pathway_core::{EntityGraph, GraphBuildError, PredicateRegistry};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Request body for `PUT /fandoms/{fandom_id}/corpus`.
#[derive(Debug, Deserialize)]
pub struct CorpusUpload {
    #[serde(flatten)]
    pub data: FandomData,
    /// Kept as raw JSON so one undecodable rule does not fail the upload.
    #[serde(default)]
    pub rules: Vec<serde_json::Value>,
}

/// A rule dropped at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRule {
    /// Position in the uploaded `rules` array.
    pub index: usize,
    pub rule_id: Option<String>,
    pub reason: String,
}

#[derive(Debug)]
pub struct FandomCorpus {
    pub graph: EntityGraph,
    pub rules: Vec<ValidationRule>,
    pub rejected_rules: Vec<RejectedRule>,
    pub version: Uuid,
    pub loaded_at: DateTime<Utc>,
}

impl FandomCorpus {
    /// Build the graph and sort the uploaded rules into kept and rejected.
    ///
    /// Only a broken graph fails the upload.
    pub fn build(
        fandom_id: &str,
        upload: CorpusUpload,
        predicates: &PredicateRegistry,
    ) -> Result<Self, GraphBuildError> {
        let graph = EntityGraph::build(fandom_id, upload.data)?;

        let mut rules = Vec::with_capacity(upload.rules.len());
        let mut rejected_rules = Vec::new();
        for (index, raw) in upload.rules.into_iter().enumerate() {
            let rule_id = raw.get("id").and_then(|v| v.as_str()).map(str::to_string);
            let parsed = serde_json::from_value::<ValidationRule>(raw)
                .map_err(|e| e.to_string())
                .and_then(|rule| match rule.definition.check(&rule.id, predicates) {
                    Ok(()) => Ok(rule),
                    Err(e) => Err(e.to_string()),
                });

            match parsed {
                Ok(rule) => rules.push(rule),
                Err(reason) => {
                    tracing::warn!(fandom_id, index, rule_id = ?rule_id, %reason, "Rejected rule");
                    rejected_rules.push(RejectedRule {
                        index,
                        rule_id,
                        reason,
                    });
                }
            }
        }

        Ok(Self {
            graph,
            rules,
            rejected_rules,
            version: Uuid::new_v4(),
            loaded_at: Utc::now(),
        })
    }

    pub fn summary(&self) -> CorpusSummary {
        CorpusSummary {
            fandom_id: self.graph.fandom_id().to_string(),
            version: self.version,
            loaded_at: self.loaded_at,
            tag_count: self.graph.tags().count(),
            tag_class_count: self.graph.tag_classes().count(),
            plot_block_count: self.graph.plot_blocks().count(),
            condition_count: self.graph.conditions().count(),
            rule_count: self.rules.len(),
            rejected_rules: self.rejected_rules.clone(),
        }
    }
}

/// What a corpus endpoint returns about a cached corpus.
#[derive(Debug, Serialize)]
pub struct CorpusSummary {
    pub fandom_id: FandomId,
    pub version: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub tag_count: usize,
    pub tag_class_count: usize,
    pub plot_block_count: usize,
    pub condition_count: usize,
    pub rule_count: usize,
    pub rejected_rules: Vec<RejectedRule>,
}

/// Corpora keyed by fandom id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared through `AppState`.
#[derive(Debug, Default)]
pub struct CorpusStore {
    corpora: RwLock<HashMap<FandomId, Arc<FandomCorpus>>>,
}

impl CorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a corpus, returning the one it replaced.
    pub async fn insert(&self, corpus: FandomCorpus) -> Option<Arc<FandomCorpus>> {
        let fandom_id = corpus.graph.fandom_id().to_string();
        self.corpora.write().await.insert(fandom_id, Arc::new(corpus))
    }

    pub async fn get(&self, fandom_id: &str) -> Option<Arc<FandomCorpus>> {
        self.corpora.read().await.get(fandom_id).cloned()
    }

    pub async fn remove(&self, fandom_id: &str) -> Option<Arc<FandomCorpus>> {
        self.corpora.write().await.remove(fandom_id)
    }

    pub async fn len(&self) -> usize {
        self.corpora.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.corpora.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn upload(body: serde_json::Value) -> CorpusUpload {
        serde_json::from_value(body).unwrap()
    }

    fn rule(id: &str, root: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": id,
            "definition": {
                "root": root,
                "conditions": [
                    { "id": "has-angst", "type": "tagPresent", "parameters": { "tag_id": "angst" } }
                ],
                "actions": [{ "type": "warning", "message": "Heavy" }]
            }
        })
    }

    #[test]
    fn keeps_good_rules_and_lists_rejected_ones() {
        let body = json!({
            "tags": [{ "id": "angst", "fandom_id": "hp" }],
            "rules": [rule("ok", "has-angst"), rule("dangling", "missing"), { "name": "no id" }]
        });

        let corpus = FandomCorpus::build("hp", upload(body), &PredicateRegistry::new()).unwrap();

        assert_eq!(corpus.rules.len(), 1);
        assert_eq!(corpus.rules[0].id, "ok");
        let rejected: Vec<_> = corpus
            .rejected_rules
            .iter()
            .map(|r| (r.index, r.rule_id.as_deref()))
            .collect();
        assert_eq!(rejected, [(1, Some("dangling")), (2, None)]);
    }

    #[test]
    fn broken_graph_fails_the_upload() {
        let body = json!({
            "tags": [
                { "id": "angst", "fandom_id": "hp" },
                { "id": "angst", "fandom_id": "hp" }
            ]
        });

        let err = FandomCorpus::build("hp", upload(body), &PredicateRegistry::new()).unwrap_err();
        assert_matches!(err, GraphBuildError::DuplicateId { .. });
    }

    #[tokio::test]
    async fn store_replaces_and_evicts() {
        let store = CorpusStore::new();
        let build = || FandomCorpus::build("hp", upload(json!({})), &PredicateRegistry::new()).unwrap();

        assert!(store.insert(build()).await.is_none());
        let first = store.get("hp").await.unwrap().version;
        let replaced = store.insert(build()).await.unwrap();
        assert_eq!(replaced.version, first);
        assert_ne!(store.get("hp").await.unwrap().version, first);

        assert!(store.remove("hp").await.is_some());
        assert!(store.is_empty().await);
    }
}
