//! REST API Server for the Scheme Finder
//!
//! Exposes the scheme assistant via HTTP endpoints
//! for the web frontend

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::agent::SchemeAssistant;
use crate::error::SchemeError;
use crate::models::{ChatAction, SchemeDetail, UserProfile};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub profile: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub response: String,
    pub action: ChatAction,
    pub details: Option<SchemeDetail>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn status_for(e: &SchemeError) -> StatusCode {
    match e {
        SchemeError::Validation { .. } => StatusCode::BAD_REQUEST,
        SchemeError::NotFound(_) => StatusCode::NOT_FOUND,
        _ if e.is_external() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<SchemeAssistant>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Profile Submission
/// =============================

async fn submit_profile(
    State(state): State<ApiState>,
    Json(req): Json<ProfileRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(session_id = ?req.session_id, "Received profile submission");

    match state
        .assistant
        .submit_profile(req.session_id.as_deref(), req.profile)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "session_id": outcome.session_id,
                "schemes": outcome.schemes,
                "message": outcome.message,
            }))),
        ),
        Err(e) => {
            error!("Profile submission failed: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.assistant.chat(req.session_id.as_deref(), &req.message).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(ChatResponse {
                session_id: outcome.session_id,
                response: outcome.reply.response,
                action: outcome.reply.action,
                details: outcome.reply.details,
            })),
        ),
        Err(e) => {
            error!("Chat turn failed: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

async fn session_schemes(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.assistant.schemes(&session_id).await {
        Some(schemes) => (StatusCode::OK, Json(ApiResponse::success(schemes))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Unknown session '{}'", session_id))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(assistant: Arc<SchemeAssistant>) -> Router {
    let state = ApiState { assistant };

    Router::new()
        .route("/health", get(health))
        .route("/api/profile", post(submit_profile))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions/:id/schemes", get(session_schemes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    assistant: Arc<SchemeAssistant>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(assistant);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AssistantSettings;
    use crate::catalog::InMemoryDetailStore;
    use crate::embedding::StaticEmbedder;
    use crate::llm::ScriptedModel;
    use crate::vector::InMemoryIndex;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router(model: ScriptedModel, root: &std::path::Path) -> Router {
        let mut index = InMemoryIndex::new();
        index.insert(
            "MH-1",
            vec![1.0, 0.0],
            json!({"scheme_id": "MH-1", "scheme_name": "Mahatma Phule Jan Arogya", "state": "Maharashtra"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let assistant = SchemeAssistant::new(
            Arc::new(model),
            Arc::new(StaticEmbedder::new(vec![1.0, 0.0])),
            Arc::new(index),
            Arc::new(InMemoryDetailStore::new()),
            AssistantSettings {
                artifact_root: root.to_path_buf(),
                ..Default::default()
            },
        );
        create_router(Arc::new(assistant))
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn profile_body() -> Value {
        json!({
            "session_id": "web-42",
            "name": "Asha",
            "state": "Maharashtra",
            "gender": "Female",
            "caste": "OBC",
            "occupation": "Tailor",
            "category": "OBC",
            "income": "120000"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = send(router(ScriptedModel::failing(), tmp.path()), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_profile_missing_fields_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let mut body = profile_body();
        body["income"] = json!("");
        let (status, body) = send(router(ScriptedModel::failing(), tmp.path()), "POST", "/api/profile", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("income"));
    }

    #[tokio::test]
    async fn test_profile_then_schemes_and_chat() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(ScriptedModel::new(["tailor query", "[75]"]), tmp.path());

        let (status, body) = send(app.clone(), "POST", "/api/profile", Some(profile_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["session_id"], "web-42");
        assert_eq!(body["data"]["schemes"][0]["scheme_id"], "MH-1");
        assert_eq!(body["data"]["schemes"][0]["llm_score"], 75);

        let (status, body) = send(app.clone(), "GET", "/api/sessions/web-42/schemes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/chat",
            Some(json!({"session_id": "web-42", "message": "show schemes"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["action"], "show_schemes");
        assert!(body["data"]["response"].as_str().unwrap().contains("1. Mahatma Phule Jan Arogya"));

        let (status, body) = send(app, "GET", "/api/sessions/nobody/schemes", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_chat_empty_message() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = send(
            router(ScriptedModel::failing(), tmp.path()),
            "POST",
            "/api/chat",
            Some(json!({"message": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["response"], "Please provide a message.");
        assert_eq!(body["data"]["action"], "none");
        assert!(!body["data"]["session_id"].as_str().unwrap().is_empty());
    }
}
