//! Handlers for the `/fandoms/{fandom_id}/corpus` resource.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use pathway_core::error::CoreError;

use crate::corpus::{CorpusSummary, CorpusUpload, FandomCorpus};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// PUT /api/v1/fandoms/{fandom_id}/corpus
///
/// Build the fandom's entity graph and rule set and cache it, replacing any
/// previous corpus. Returns 201 for a new fandom, 200 for a replacement and
/// 422 when the graph is structurally broken. Malformed rules do not fail
/// the upload; they are listed under `rejected_rules`.
pub async fn put_corpus(
    State(state): State<AppState>,
    Path(fandom_id): Path<String>,
    Json(upload): Json<CorpusUpload>,
) -> AppResult<(StatusCode, Json<DataResponse<CorpusSummary>>)> {
    let predicates = Arc::clone(&state.predicates);
    let build_id = fandom_id.clone();
    let corpus = tokio::task::spawn_blocking(move || {
        FandomCorpus::build(&build_id, upload, &predicates)
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Corpus build task failed: {e}")))?
    .map_err(CoreError::from)?;

    let summary = corpus.summary();
    let replaced = state.corpora.insert(corpus).await;

    tracing::info!(
        fandom_id = %fandom_id,
        version = %summary.version,
        elements = summary.tag_count + summary.plot_block_count + summary.condition_count,
        rules = summary.rule_count,
        rejected = summary.rejected_rules.len(),
        replaced = replaced.is_some(),
        "Corpus loaded"
    );

    let status = if replaced.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(DataResponse { data: summary })))
}

/// GET /api/v1/fandoms/{fandom_id}/corpus
pub async fn get_corpus(
    State(state): State<AppState>,
    Path(fandom_id): Path<String>,
) -> AppResult<Json<DataResponse<CorpusSummary>>> {
    let corpus = state
        .corpora
        .get(&fandom_id)
        .await
        .ok_or_else(|| corpus_not_found(fandom_id))?;
    Ok(Json(DataResponse {
        data: corpus.summary(),
    }))
}

/// DELETE /api/v1/fandoms/{fandom_id}/corpus
///
/// Evict the cached corpus. Returns 204, or 404 if nothing was cached.
pub async fn delete_corpus(
    State(state): State<AppState>,
    Path(fandom_id): Path<String>,
) -> AppResult<StatusCode> {
    match state.corpora.remove(&fandom_id).await {
        Some(_) => {
            tracing::info!(fandom_id = %fandom_id, "Corpus evicted");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(corpus_not_found(fandom_id).into()),
    }
}

pub(crate) fn corpus_not_found(fandom_id: String) -> CoreError {
    CoreError::NotFound {
        entity: "Corpus",
        id: fandom_id,
    }
}
