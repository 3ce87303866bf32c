//! HTTP API server for integration with other systems.
//!
//! Exposes the tool catalog and the ask operation as REST endpoints.

use crate::agent::VisionAgent;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SkueError;
use crate::media::MediaRef;
use crate::workflow::{RunControl, Trace};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
struct AppState {
    agent: VisionAgent,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings.lmm) {
        Output::error(&format!("{}", e));
        Output::info("Run 'skue doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let state = Arc::new(AppState {
        agent: VisionAgent::from_settings(&settings)?,
    });

    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Skue API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Tools", "GET  /tools");
    Output::kv("Ask", "POST /ask");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/ask", post(ask))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AskRequest {
    query: String,
    /// Path to an image or video readable by the server.
    #[serde(default)]
    media: Option<String>,
    /// Include the workflow trace in the response.
    #[serde(default)]
    workflow: bool,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow: Option<Trace>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    /// Steps that ran before a workflow failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow: Option<Trace>,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools: Vec<_> = state
        .agent
        .registry()
        .describe_all()
        .iter()
        .map(|d| d.as_ref().clone())
        .collect();
    Json(serde_json::json!({ "tools": tools, "total": tools.len() }))
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    let media = match req.media.as_deref().map(MediaRef::from_path).transpose() {
        Ok(media) => media,
        Err(e) => return error_response(e),
    };

    match state
        .agent
        .run(&req.query, media.as_ref(), &[], &RunControl::new())
        .await
    {
        Ok(reply) => Json(AskResponse {
            answer: reply.answer,
            workflow: req.workflow.then_some(reply.outcome.trace),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(error: SkueError) -> axum::response::Response {
    let status = match &error {
        SkueError::InvalidInput(_) | SkueError::Media(_) => StatusCode::BAD_REQUEST,
        SkueError::Workflow(_) | SkueError::NoEvidence => StatusCode::UNPROCESSABLE_ENTITY,
        SkueError::CompletionUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            workflow: error.trace().cloned(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentOptions;
    use crate::config::Prompts;
    use crate::testing::{counter_registry, FakeLmm};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(plans: Vec<&str>) -> Arc<AppState> {
        let agent = VisionAgent::new(
            Arc::new(FakeLmm::routed(plans, "There are 7 red apples.")),
            Arc::new(counter_registry()),
            Prompts::default(),
            AgentOptions::default(),
        );
        Arc::new(AppState { agent })
    }

    #[test]
    fn test_error_status_codes() {
        let response = error_response(SkueError::InvalidInput("empty".to_string()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(SkueError::NoEvidence);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_tools_endpoint() {
        let response = router(state(vec![]))
            .oneshot(Request::get("/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
