//! Handlers for the `/fandoms/{fandom_id}/pathways` resource.
//!
//! `validate` runs the whole pipeline on the blocking pool under the
//! configured budget. The single-validator endpoints are cheap enough to run
//! inline and back the editor's per-keystroke checks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use pathway_core::validation::circular::CircularResult;
use pathway_core::validation::conflict::{detect_conflicts_with, ConflictResult};
use pathway_core::validation::dependency::{resolve_dependencies_with, DependencyResult};
use pathway_core::validation::tag_class::TagClassResult;
use pathway_core::{
    detect_circular_references, validate_tag_classes, Selection, ValidationContext,
    ValidationResult, Validator, ValidatorConfig,
};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::corpus::FandomCorpus;
use crate::error::{AppError, AppResult};
use crate::handlers::corpus::corpus_not_found;
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest id accepted in a selection.
const MAX_ID_LEN: usize = 256;

/// Request body shared by every pathway endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct PathwayRequest {
    #[serde(default)]
    #[validate(custom(function = "validate_ids"))]
    pub tag_ids: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_ids"))]
    pub plot_block_ids: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_ids"))]
    pub condition_ids: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[allow(clippy::ptr_arg)]
fn validate_ids(ids: &Vec<String>) -> Result<(), ValidationError> {
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ValidationError::new("blank_id").with_message("ids must not be blank".into()));
    }
    if ids.iter().any(|id| id.len() > MAX_ID_LEN) {
        return Err(ValidationError::new("id_too_long")
            .with_message(format!("ids must be at most {MAX_ID_LEN} characters").into()));
    }
    Ok(())
}

impl PathwayRequest {
    /// Check the request and turn it into a core [`Selection`].
    ///
    /// Each id list is capped at `max_selection_size`.
    pub fn into_selection(self, max_selection_size: usize) -> AppResult<Selection> {
        self.validate()?;

        let lists = [
            ("tag_ids", self.tag_ids.len()),
            ("plot_block_ids", self.plot_block_ids.len()),
            ("condition_ids", self.condition_ids.len()),
        ];
        if let Some((field, len)) = lists.iter().find(|(_, len)| *len > max_selection_size) {
            return Err(AppError::BadRequest(format!(
                "{field} has {len} entries; at most {max_selection_size} allowed"
            )));
        }

        Ok(Selection {
            tag_ids: self.tag_ids,
            plot_block_ids: self.plot_block_ids,
            condition_ids: self.condition_ids,
            metadata: self.metadata,
        })
    }
}

/// Resolve the cached corpus and the request's selection.
async fn prepare(
    state: &AppState,
    fandom_id: String,
    request: PathwayRequest,
) -> AppResult<(Arc<FandomCorpus>, Selection)> {
    let selection = request.into_selection(state.config.max_selection_size)?;
    let corpus = state
        .corpora
        .get(&fandom_id)
        .await
        .ok_or_else(|| corpus_not_found(fandom_id))?;
    Ok((corpus, selection))
}

/// Run one validator inline against a fresh context.
async fn run_inline<T>(
    state: &AppState,
    fandom_id: String,
    request: PathwayRequest,
    run: impl FnOnce(&ValidationContext<'_>, &ValidatorConfig) -> T,
) -> AppResult<Json<DataResponse<T>>>
where
    T: serde::Serialize,
{
    let (corpus, selection) = prepare(state, fandom_id, request).await?;
    let ctx = ValidationContext::new(&selection, &corpus.graph, &corpus.rules)
        .with_predicates(&state.predicates);
    let data = run(&ctx, state.validator.config());
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/fandoms/{fandom_id}/pathways/validate
///
/// Full validation. Returns 503 `VALIDATION_TIMEOUT` if the run exceeds
/// `VALIDATION_BUDGET_MS`; the caller is expected to retry.
pub async fn validate_pathway(
    State(state): State<AppState>,
    Path(fandom_id): Path<String>,
    Json(request): Json<PathwayRequest>,
) -> AppResult<Json<DataResponse<ValidationResult>>> {
    let (corpus, selection) = prepare(&state, fandom_id, request).await?;
    let budget_ms = state.config.validation_budget_ms;

    let engine = Arc::clone(&state.validator);
    let predicates = Arc::clone(&state.predicates);
    let task = tokio::task::spawn_blocking(move || {
        let ctx = ValidationContext::new(&selection, &corpus.graph, &corpus.rules)
            .with_predicates(&predicates);
        Validator::validate(&engine, &ctx)
    });

    let result = tokio::time::timeout(Duration::from_millis(budget_ms), task)
        .await
        .map_err(|_| AppError::Timeout { budget_ms })?
        .map_err(|e| AppError::InternalError(format!("Validation task failed: {e}")))?;

    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/fandoms/{fandom_id}/pathways/conflicts
pub async fn check_conflicts(
    State(state): State<AppState>,
    Path(fandom_id): Path<String>,
    Json(request): Json<PathwayRequest>,
) -> AppResult<Json<DataResponse<ConflictResult>>> {
    run_inline(&state, fandom_id, request, detect_conflicts_with).await
}

/// POST /api/v1/fandoms/{fandom_id}/pathways/dependencies
pub async fn check_dependencies(
    State(state): State<AppState>,
    Path(fandom_id): Path<String>,
    Json(request): Json<PathwayRequest>,
) -> AppResult<Json<DataResponse<DependencyResult>>> {
    run_inline(&state, fandom_id, request, resolve_dependencies_with).await
}

/// POST /api/v1/fandoms/{fandom_id}/pathways/cycles
pub async fn check_cycles(
    State(state): State<AppState>,
    Path(fandom_id): Path<String>,
    Json(request): Json<PathwayRequest>,
) -> AppResult<Json<DataResponse<CircularResult>>> {
    run_inline(&state, fandom_id, request, |ctx, _| {
        detect_circular_references(ctx)
    })
    .await
}

/// POST /api/v1/fandoms/{fandom_id}/pathways/tag-classes
pub async fn check_tag_classes(
    State(state): State<AppState>,
    Path(fandom_id): Path<String>,
    Json(request): Json<PathwayRequest>,
) -> AppResult<Json<DataResponse<TagClassResult>>> {
    run_inline(&state, fandom_id, request, |ctx, _| validate_tag_classes(ctx)).await
}
