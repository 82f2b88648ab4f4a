pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{fill, form, matching, memory, resolution};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Field classification and matching (stateless)
        .route(
            "/api/v1/fields/classify",
            post(form::handlers::handle_classify),
        )
        .route("/api/v1/match", post(matching::handlers::handle_match))
        .route(
            "/api/v1/dates/parse",
            post(matching::handlers::handle_parse_date),
        )
        // Answer resolution
        .route(
            "/api/v1/resolve",
            post(resolution::handlers::handle_resolve),
        )
        .route(
            "/api/v1/resolve/batch",
            post(resolution::handlers::handle_resolve_batch),
        )
        // Memory store
        .route(
            "/api/v1/memory",
            get(memory::handlers::handle_list_memory).delete(memory::handlers::handle_clear_memory),
        )
        .route(
            "/api/v1/memory/capture",
            post(memory::handlers::handle_capture),
        )
        .route(
            "/api/v1/memory/suggest",
            post(memory::handlers::handle_suggest),
        )
        .route(
            "/api/v1/memory/:hash/feedback",
            post(memory::handlers::handle_feedback),
        )
        .route(
            "/api/v1/memory/:hash",
            axum::routing::put(memory::handlers::handle_set_answer),
        )
        // Dry-run fill over a declarative page
        .route("/api/v1/fill/simulate", post(fill::handlers::handle_simulate))
        .with_state(state)
}
