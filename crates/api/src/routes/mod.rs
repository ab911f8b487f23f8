pub mod health;
pub mod pathways;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /fandoms/{fandom_id}/corpus                         upload, get, evict
/// /fandoms/{fandom_id}/pathways/validate              full validation (POST)
/// /fandoms/{fandom_id}/pathways/conflicts             conflict detection (POST)
/// /fandoms/{fandom_id}/pathways/dependencies          dependency resolution (POST)
/// /fandoms/{fandom_id}/pathways/cycles                circular references (POST)
/// /fandoms/{fandom_id}/pathways/tag-classes           tag class constraints (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/fandoms/{fandom_id}", pathways::fandom_router())
}
