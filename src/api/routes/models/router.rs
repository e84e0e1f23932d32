//! Router for the model catalog API

use std::sync::{Arc, RwLock};

use axum::{Router, extract::State, routing::get};

use super::public;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// List the cached models a chat can select
async fn models_list(State(state): State<SharedState>) -> axum::Json<public::ModelsResponse> {
    let shared_state = state.read().expect("Unable to read shared state");
    axum::Json(public::ModelsResponse {
        models: shared_state.catalog.models.clone(),
        selected_default: shared_state.default_model(),
        problem: shared_state.catalog.problem.as_ref().map(|p| p.to_string()),
    })
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(models_list))
}
