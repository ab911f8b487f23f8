#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pathway_api::config::ServerConfig;
use pathway_api::router::build_app_router;
use pathway_api::state::AppState;
use pathway_core::ValidatorConfig;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a generous validation budget and a small selection cap so size limits
/// are easy to hit.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        validation_budget_ms: 10_000,
        max_selection_size: 8,
        validator: ValidatorConfig::default(),
    }
}

/// Build the full application router with all middleware layers and an
/// empty corpus cache.
pub fn build_test_app() -> Router {
    let config = test_config();
    build_app_router(AppState::new(config.clone()), &config)
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A small Harry Potter corpus: a Time-Turner plot needing the time-travel
/// tag, mutually exclusive ships, a conflicting plot pair and one rule.
/// The second rule is malformed and should be rejected at upload.
pub fn hp_corpus() -> Value {
    json!({
        "tags": [
            { "id": "time-travel", "fandom_id": "hp" },
            { "id": "dark-harry", "fandom_id": "hp" },
            { "id": "redemption-arc", "fandom_id": "hp" },
            { "id": "harry/hermione", "fandom_id": "hp", "tag_class_id": "ships" },
            { "id": "harry/ginny", "fandom_id": "hp", "tag_class_id": "ships" }
        ],
        "tag_classes": [
            {
                "id": "ships",
                "fandom_id": "hp",
                "name": "Ships",
                "validation_rules": { "mutual_exclusion": { "within_class": true } }
            }
        ],
        "plot_blocks": [
            { "id": "time-turner-plot", "fandom_id": "hp", "category": "adventure", "requires": ["time-travel"] },
            { "id": "duel", "fandom_id": "hp", "category": "action", "conflicts_with": ["truce"] },
            { "id": "truce", "fandom_id": "hp", "category": "drama" }
        ],
        "rules": [
            {
                "id": "dark-needs-redemption",
                "name": "Dark Harry needs a redemption arc",
                "definition": {
                    "root": "all",
                    "conditions": [
                        { "id": "all", "type": "group", "operator": "AND", "children": ["dark", "no-arc"] },
                        { "id": "dark", "type": "tagPresent", "parameters": { "tag_id": "dark-harry" } },
                        { "id": "no-arc", "type": "group", "operator": "NOT", "children": ["arc"] },
                        { "id": "arc", "type": "tagPresent", "parameters": { "tag_id": "redemption-arc" } }
                    ],
                    "actions": [
                        { "type": "warning", "message": "Consider redemption arc" },
                        { "type": "suggest", "target": "redemption-arc" }
                    ]
                }
            },
            {
                "id": "uses-missing-predicate",
                "definition": {
                    "root": "check",
                    "conditions": [
                        { "id": "check", "type": "custom", "parameters": { "predicate": "no_such_predicate", "params": {} } }
                    ]
                }
            }
        ]
    })
}

/// Upload [`hp_corpus`] and return the app for further requests.
pub async fn app_with_hp_corpus() -> Router {
    let app = build_test_app();
    let response = put_json(app.clone(), "/api/v1/fandoms/hp/corpus", hp_corpus()).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    app
}
