use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version, AI tier availability
/// and the number of remembered answers.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let memory_records = state.resolver.memory().lock().await.len();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "formfill",
        "ai_enabled": state.resolver.ai_enabled(),
        "memory_records": memory_records
    }))
}
