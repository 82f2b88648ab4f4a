use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::form::models::FieldType;
use crate::memory::store::{Feedback, MemoryRecord, MemoryStats, Suggestion};
use crate::state::AppState;

#[derive(Serialize)]
pub struct MemoryListResponse {
    pub records: Vec<MemoryRecord>,
    pub stats: MemoryStats,
}

#[derive(Deserialize)]
pub struct CaptureRequest {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub field_type: Option<FieldType>,
}

#[derive(Serialize)]
pub struct CaptureResponse {
    /// `null` when the question or answer was empty and nothing was stored.
    pub hash: Option<String>,
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    pub question: String,
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Feedback,
}

#[derive(Deserialize)]
pub struct SetAnswerRequest {
    pub answer: String,
}

/// GET /api/v1/memory
pub async fn handle_list_memory(State(state): State<AppState>) -> Json<MemoryListResponse> {
    let memory = state.memory.lock().await;
    Json(MemoryListResponse {
        records: memory.list(),
        stats: memory.stats(),
    })
}

/// DELETE /api/v1/memory
pub async fn handle_clear_memory(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.memory.lock().await.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/memory/capture
pub async fn handle_capture(
    State(state): State<AppState>,
    Json(req): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>, AppError> {
    let hash = state
        .memory
        .lock()
        .await
        .capture(&req.question, &req.answer, req.field_type)
        .await?;
    Ok(Json(CaptureResponse { hash }))
}

/// POST /api/v1/memory/suggest
pub async fn handle_suggest(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> Json<Option<Suggestion>> {
    let memory = state.memory.lock().await;
    Json(memory.suggest(&req.question))
}

/// POST /api/v1/memory/:hash/feedback
pub async fn handle_feedback(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Json(req): Json<FeedbackRequest>,
) -> Result<StatusCode, AppError> {
    let found = state
        .memory
        .lock()
        .await
        .record_feedback(&hash, req.feedback)
        .await?;
    if !found {
        return Err(AppError::NotFound(format!("Memory record {hash} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/memory/:hash
pub async fn handle_set_answer(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Json(req): Json<SetAnswerRequest>,
) -> Result<StatusCode, AppError> {
    if req.answer.trim().is_empty() {
        return Err(AppError::Validation("answer must not be empty".to_string()));
    }
    let found = state.memory.lock().await.set_answer(&hash, &req.answer).await?;
    if !found {
        return Err(AppError::NotFound(format!("Memory record {hash} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
