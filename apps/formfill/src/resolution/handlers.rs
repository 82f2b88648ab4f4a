use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::resolution::pipeline::{BatchQuestion, ResolutionRequest, ResolutionResult};
use crate::resolution::profile_match::ProfileData;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BatchResolveRequest {
    pub questions: Vec<BatchQuestion>,
    #[serde(default)]
    pub profile_data: ProfileData,
    #[serde(default)]
    pub memory_threshold: Option<f64>,
}

#[derive(Serialize)]
pub struct BatchResolveResponse {
    /// Keyed by the question's index in the request.
    pub results: BTreeMap<usize, ResolutionResult>,
}

/// POST /api/v1/resolve
pub async fn handle_resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolutionRequest>,
) -> Result<Json<ResolutionResult>, AppError> {
    if req.question_text.trim().is_empty() {
        return Err(AppError::Validation("question_text must not be empty".to_string()));
    }
    Ok(Json(state.resolver.resolve(&req).await))
}

/// POST /api/v1/resolve/batch
pub async fn handle_resolve_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchResolveRequest>,
) -> Json<BatchResolveResponse> {
    let results = state
        .resolver
        .resolve_batch(&req.questions, &req.profile_data, req.memory_threshold)
        .await;
    Json(BatchResolveResponse { results })
}
