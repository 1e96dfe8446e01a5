//! HTTP API server.
//!
//! Exposes retrieval-grounded answers and the coaching dialogue as JSON
//! endpoints. Degraded answers are still `200 OK`; the body carries the
//! fallback text.

use super::{coach_completer, openai_responder};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::coach::{CapturedData, CoachingSession};
use crate::completion::{ChatMessage, Completer};
use crate::config::Settings;
use crate::rag::{Responder, StatsSnapshot};
use axum::{
    extract::State,
    http::HeaderValue,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

const RESET_RESPONSE: &str = "Session reset. Say hello to begin again.";

/// Shared application state.
pub struct AppState {
    pub responder: Responder,
    pub coach: Arc<dyn Completer>,
    pub selectors: Vec<String>,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Query) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let state = Arc::new(AppState {
        responder: openai_responder(&settings)?,
        coach: Arc::new(coach_completer(&settings)?),
        selectors: settings.selectors(),
    });
    let app = build_router(state, &settings.server.allowed_origins);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Coachloop API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Answer", "POST /generate_response");
    Output::kv("Coach", "POST /chat");
    Output::kv("Reset", "POST /reset");
    Output::kv("Stats", "GET  /stats");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    info!("Serving selectors: {}", settings.selectors().join(", "));
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with CORS restricted to `allowed_origins` (any origin when empty or `*`).
pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate_response", post(generate_response))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .route("/stats", get(stats))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct GenerateRequest {
    /// Selector naming the agent.
    role: String,
    query: String,
}

#[derive(Serialize, Deserialize)]
struct GenerateResponse {
    response: String,
}

fn first_step() -> usize {
    1
}

#[derive(Deserialize)]
struct ChatRequest {
    user_input: String,
    #[serde(default)]
    conversation_history: Vec<ChatMessage>,
    #[serde(default = "first_step")]
    current_step: usize,
    #[serde(default)]
    captured: CapturedData,
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    response: String,
    conversation_history: Vec<ChatMessage>,
    current_step: usize,
    captured: CapturedData,
}

impl ChatResponse {
    fn from_session(response: String, session: CoachingSession) -> Self {
        let (conversation_history, current_step, captured) = session.into_parts();
        Self {
            response,
            conversation_history,
            current_step,
            captured,
        }
    }
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "selectors": state.selectors }))
}

async fn generate_response(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> impl IntoResponse {
    let response = state.responder.respond(&req.role, &req.query).await;
    Json(GenerateResponse { response })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let mut session =
        CoachingSession::from_state(req.conversation_history, req.current_step, req.captured);
    let response = session.respond(state.coach.as_ref(), &req.user_input).await;
    Json(ChatResponse::from_session(response, session))
}

async fn reset() -> impl IntoResponse {
    Json(ChatResponse::from_session(
        RESET_RESPONSE.to_string(),
        CoachingSession::new(),
    ))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsSnapshot> {
    Json(state.responder.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::UNAVAILABLE_RESPONSE;
    use crate::testing::{ScriptedCompleter, ScriptedEmbedder};
    use crate::vector_store::{save_pair, FlatIndex, MetadataRecord};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> Router {
        let settings =
            Settings::default().with_derived_agents(&dir.to_string_lossy(), &["behavior"]);
        let responder = Responder::new(
            &settings,
            Arc::new(ScriptedEmbedder::new(4)),
            Arc::new(ScriptedCompleter::replying("grounded answer")),
        );
        let state = Arc::new(AppState {
            responder,
            coach: Arc::new(ScriptedCompleter::replying("Tell me more.")),
            selectors: settings.selectors(),
        });
        build_router(state, &settings.server.allowed_origins)
    }

    async fn post_json<T: DeserializeOwned>(
        app: Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, T) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["selectors"][0], "behavior");
    }

    #[tokio::test]
    async fn test_missing_index_is_ok_with_fallback_text() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body): (_, GenerateResponse) = post_json(
            app(dir.path()),
            "/generate_response",
            serde_json::json!({ "role": "behavior", "query": "How do I start?" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.response, UNAVAILABLE_RESPONSE);
    }

    fn write_single_chunk(settings: &Settings, selector: &str, text: &str) {
        let paths = settings.agent_paths(selector).unwrap();
        let index = FlatIndex::from_vectors(4, vec![vec![1.0, 0.0, 0.0, 0.0]]).unwrap();
        let metadata = [MetadataRecord {
            filename: "doc.txt".to_string(),
            text: text.to_string(),
        }];
        save_pair(&paths.index, &paths.metadata, &index, &metadata, "m").unwrap();
    }

    #[tokio::test]
    async fn test_rebuilt_index_is_served_without_restart() {
        let dir = tempfile::tempdir().unwrap();
        let settings =
            Settings::default().with_derived_agents(&dir.path().to_string_lossy(), &["behavior"]);
        write_single_chunk(&settings, "behavior", "Build A: pause before replying.");

        let completer = Arc::new(ScriptedCompleter::replying("grounded answer"));
        let state = Arc::new(AppState {
            responder: Responder::new(
                &settings,
                Arc::new(ScriptedEmbedder::new(4)),
                completer.clone(),
            ),
            coach: Arc::new(ScriptedCompleter::replying("unused")),
            selectors: settings.selectors(),
        });
        let router = build_router(state, &settings.server.allowed_origins);
        let request = serde_json::json!({ "role": "behavior", "query": "How should I reply?" });

        let (status, _): (_, GenerateResponse) =
            post_json(router.clone(), "/generate_response", request.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let prompt = completer.last_request().unwrap()[1].content.clone();
        assert!(prompt.contains("Build A"));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        write_single_chunk(&settings, "behavior", "Build B: ask a question first.");

        let (status, _): (_, GenerateResponse) =
            post_json(router, "/generate_response", request).await;
        assert_eq!(status, StatusCode::OK);
        let prompt = completer.last_request().unwrap()[1].content.clone();
        assert!(prompt.contains("Build B"));
        assert!(!prompt.contains("Build A"));
    }

    #[tokio::test]
    async fn test_chat_round_trip_carries_state() {
        let dir = tempfile::tempdir().unwrap();
        let (status, first): (_, ChatResponse) = post_json(
            app(dir.path()),
            "/chat",
            serde_json::json!({ "user_input": "hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first.current_step, 2);
        assert_eq!(first.conversation_history.len(), 2);

        let (_, second): (_, ChatResponse) = post_json(
            app(dir.path()),
            "/chat",
            serde_json::json!({
                "user_input": "I avoid difficult conversations",
                "conversation_history": first.conversation_history,
                "current_step": first.current_step,
            }),
        )
        .await;
        assert_eq!(second.response, "Tell me more.");
        assert_eq!(second.current_step, 3);
        assert_eq!(second.conversation_history.len(), 4);
    }

    #[tokio::test]
    async fn test_reset() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body): (_, ChatResponse) =
            post_json(app(dir.path()), "/reset", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.current_step, 1);
        assert!(body.conversation_history.is_empty());
        assert_eq!(body.response, RESET_RESPONSE);
    }

    #[test]
    fn test_cors_accepts_wildcard_and_lists() {
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "not a header\n".to_string()]);
    }
}
