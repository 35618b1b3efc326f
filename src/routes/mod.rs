//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (one wizard session per connection)
/// - Catalog, one-shot generation and session API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // Catalog + stateless API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/subjects", get(http::http_get_subjects))
        .route("/api/v1/subjects/:id/topics", get(http::http_get_topics))
        .route("/api/v1/keys/validate", post(http::http_post_validate_key))
        .route("/api/v1/lesson", post(http::http_post_lesson))
        .route("/api/v1/quiz", post(http::http_post_quiz))
        .route("/api/v1/quiz/score", post(http::http_post_score))
        // Wizard sessions
        .route("/api/v1/sessions", post(http::http_post_session))
        .route("/api/v1/sessions/:id", get(http::http_get_session).delete(http::http_delete_session))
        .route("/api/v1/sessions/:id/messages", post(http::http_post_session_message))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(Arc::new(AppState::from_config(AppConfig::default())))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, v)
    }

    #[tokio::test]
    async fn health_and_catalog() {
        let app = app();
        let (s, v) = call(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["ok"], true);

        let (_, v) = call(&app, Method::GET, "/api/v1/subjects", None).await;
        assert_eq!(v.as_array().unwrap().len(), 7);

        let (s, v) = call(&app, Method::GET, "/api/v1/subjects/math/topics", None).await;
        assert_eq!(s, StatusCode::OK);
        assert!(v.as_array().unwrap().iter().all(|t| t["subjectId"] == "math"));

        let (s, v) = call(&app, Method::GET, "/api/v1/subjects/cooking/topics", None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert!(v["error"].as_str().unwrap().contains("cooking"));
    }

    #[tokio::test]
    async fn blank_key_validates_false() {
        let (s, v) = call(&app(), Method::POST, "/api/v1/keys/validate", Some(json!({"provider": "gemini", "apiKey": ""}))).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["valid"], false);
    }

    #[tokio::test]
    async fn score_endpoint_uses_strict_equality() {
        let q = |id: &str, answer: Value| json!({
            "id": id, "type": "true-false", "question": "?", "options": ["True", "False"],
            "correctAnswer": answer, "explanation": "."
        });
        let body = json!({
            "questions": [q("1", json!("True")), q("2", json!("False"))],
            "answers": ["True", null]
        });
        let (s, v) = call(&app(), Method::POST, "/api/v1/quiz/score", Some(body)).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["correctAnswers"], 1);
        assert_eq!(v["score"], 50.0);
    }

    #[tokio::test]
    async fn lesson_without_key_reports_error_field() {
        let body = json!({
            "provider": "openai",
            "student": {"name": "Ada", "age": 10, "grade": 5, "interests": ["robots"]},
            "subjectId": "math",
            "topicId": "fractions"
        });
        let (s, v) = call(&app(), Method::POST, "/api/v1/lesson", Some(body)).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["error"], "API key is required");

        let bad = json!({
            "provider": "openai",
            "student": {"name": "Ada", "age": 10, "grade": 5, "interests": ["robots"]},
            "subjectId": "math",
            "topicId": "nope"
        });
        let (s, _) = call(&app(), Method::POST, "/api/v1/quiz", Some(bad)).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let app = app();
        let (s, v) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        assert_eq!(s, StatusCode::CREATED);
        assert_eq!(v["state"]["step"], "onboarding");
        let id = v["sessionId"].as_str().unwrap().to_string();

        let profile = json!({"type": "set_profile", "student": {"name": "Ada", "age": 10, "grade": 5, "interests": ["robots"]}});
        let (s, v) = call(&app, Method::POST, &format!("/api/v1/sessions/{id}/messages"), Some(profile)).await;
        assert_eq!(s, StatusCode::OK);
        let types: Vec<&str> = v.as_array().unwrap().iter().map(|m| m["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["achievement_unlocked", "state"]);

        let (_, v) = call(&app, Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(v["state"]["step"], "subject");

        let (s, _) = call(&app, Method::DELETE, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(s, StatusCode::NO_CONTENT);
        let (s, _) = call(&app, Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        let (s, _) = call(&app, Method::POST, &format!("/api/v1/sessions/{id}/messages"), Some(json!({"type": "ping"}))).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
    }
}
