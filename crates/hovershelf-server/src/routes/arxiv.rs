use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use hovershelf::arxiv::{MemoryListing, Paper, EMPTY_QUERY_WARNING};
use hovershelf::credentials::{Credentials, MEM0_KEY, MULTION_KEY, OPENAI_KEY};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct ApiKeys {
    #[serde(default)]
    openai_api_key: Option<String>,
    #[serde(default)]
    multion_api_key: Option<String>,
    /// Only needed when the server has no memory key of its own
    #[serde(default)]
    mem0_api_key: Option<String>,
}

impl ApiKeys {
    fn credentials(&self) -> Credentials {
        [
            (OPENAI_KEY, self.openai_api_key.clone()),
            (MULTION_KEY, self.multion_api_key.clone()),
            (MEM0_KEY, self.mem0_api_key.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(flatten)]
    keys: ApiKeys,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    query: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    markdown: String,
    well_formed: bool,
    papers: Option<Vec<Paper>>,
}

#[derive(Debug, Deserialize)]
struct MemoriesRequest {
    #[serde(flatten)]
    keys: ApiKeys,
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Serialize)]
struct MemoriesResponse {
    markdown: String,
    memories: MemoryListing,
}

/// Any failure past the gate, carried as text
fn failure(err: anyhow::Error) -> Response {
    tracing::error!(error = %err, "arXiv request failed");
    (StatusCode::BAD_GATEWAY, format!("Error: {:#}", err)).into_response()
}

/// Checks the credentials, answering 412 with the setup instructions when any is missing
fn gate(state: &AppState, credentials: &Credentials) -> Result<(), Response> {
    let gate = state.gate();
    if gate.check(credentials).is_ready() {
        Ok(())
    } else {
        Err((StatusCode::PRECONDITION_FAILED, gate.instructions()).into_response())
    }
}

async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    let credentials = request.keys.credentials();
    if let Err(response) = gate(&state, &credentials) {
        return response;
    }
    if request.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": EMPTY_QUERY_WARNING })),
        )
            .into_response();
    }

    let researcher = match state.researcher(&credentials) {
        Ok(researcher) => researcher,
        Err(e) => return failure(e),
    };
    match researcher.search(&request.query, &request.user_id).await {
        Ok(outcome) => Json(SearchResponse {
            markdown: outcome.render(),
            well_formed: outcome.is_well_formed(),
            papers: outcome.papers,
        })
        .into_response(),
        Err(e) => failure(e),
    }
}

async fn memories_handler(
    State(state): State<AppState>,
    Json(request): Json<MemoriesRequest>,
) -> Response {
    let credentials = request.keys.credentials();
    if let Err(response) = gate(&state, &credentials) {
        return response;
    }

    let researcher = match state.researcher(&credentials) {
        Ok(researcher) => researcher,
        Err(e) => return failure(e),
    };
    match researcher.list_memories(&request.user_id).await {
        Ok(memories) => Json(MemoriesResponse {
            markdown: memories.to_string(),
            memories,
        })
        .into_response(),
        Err(e) => failure(e),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/arxiv/search", post(search_handler))
        .route("/arxiv/memories", post(memories_handler))
        .with_state(state)
}
