//! Route definitions for the per-fandom corpus and pathway resources.

use axum::routing::{post, put};
use axum::Router;

use crate::handlers::{corpus, pathways};
use crate::state::AppState;

/// Routes mounted at `/fandoms/{fandom_id}`.
///
/// ```text
/// PUT    /corpus                  -> put_corpus
/// GET    /corpus                  -> get_corpus
/// DELETE /corpus                  -> delete_corpus
/// POST   /pathways/validate       -> validate_pathway
/// POST   /pathways/conflicts      -> check_conflicts
/// POST   /pathways/dependencies   -> check_dependencies
/// POST   /pathways/cycles         -> check_cycles
/// POST   /pathways/tag-classes    -> check_tag_classes
/// ```
pub fn fandom_router() -> Router<AppState> {
    Router::new()
        .route(
            "/corpus",
            put(corpus::put_corpus)
                .get(corpus::get_corpus)
                .delete(corpus::delete_corpus),
        )
        .route("/pathways/validate", post(pathways::validate_pathway))
        .route("/pathways/conflicts", post(pathways::check_conflicts))
        .route("/pathways/dependencies", post(pathways::check_dependencies))
        .route("/pathways/cycles", post(pathways::check_cycles))
        .route("/pathways/tag-classes", post(pathways::check_tag_classes))
}
