use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-id";
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Deserialize)]
struct RunRequest {
    #[serde(default)]
    command: String,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    result: String,
}

fn session_id(headers: &HeaderMap) -> &str {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_SESSION)
}

// always 200, failures come back in the result text
async fn run_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RunRequest>,
) -> Json<RunResponse> {
    let id = session_id(&headers);
    let session = state.browser_session(id).await;
    let mut session = session.lock().await;
    tracing::info!(session = id, "running browser command");
    let result = session.run_command(&request.command).await;
    Json(RunResponse { result })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/agent/run", post(run_handler))
        .with_state(state)
}
