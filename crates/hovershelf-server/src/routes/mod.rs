pub mod agent;
pub mod arxiv;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(arxiv::routes(state.clone()))
        .merge(agent::routes(state))
}
