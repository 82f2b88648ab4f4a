use std::time::Duration;

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::fill::orchestrator::{FillOptions, FillOrchestrator, MAX_SETTLE_DELAY};
use crate::fill::page::LogReportSink;
use crate::fill::session::CompletionReport;
use crate::fill::snapshot::{PageSnapshot, SnapshotPage};
use crate::resolution::profile_match::ProfileData;
use crate::state::AppState;

/// Per-request overrides of the configured fill options.
#[derive(Debug, Default, Deserialize)]
pub struct SimulateOptions {
    pub learning: Option<bool>,
    pub memory_threshold: Option<f64>,
    /// Capped at `MAX_SETTLE_DELAY`.
    pub settle_ms: Option<u64>,
    pub max_depth: Option<usize>,
    pub today: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct SimulateRequest {
    pub page: PageSnapshot,
    #[serde(default)]
    pub profile_data: ProfileData,
    #[serde(default)]
    pub options: SimulateOptions,
}

#[derive(Serialize)]
pub struct SimulateResponse {
    pub report: CompletionReport,
    /// The page after filling, values included.
    pub page: PageSnapshot,
}

/// POST /api/v1/fill/simulate
pub async fn handle_simulate(
    State(state): State<AppState>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<SimulateResponse>, AppError> {
    if req.page.fields.is_empty() {
        return Err(AppError::Validation("page has no fields".to_string()));
    }

    let config = &state.config;
    let options = FillOptions {
        learning: req.options.learning.unwrap_or(config.learning_enabled),
        memory_threshold: req.options.memory_threshold,
        settle_delay: Duration::from_millis(req.options.settle_ms.unwrap_or(config.fill_settle_ms))
            .min(MAX_SETTLE_DELAY),
        max_depth: req.options.max_depth.unwrap_or(config.fill_max_depth),
        today: req.options.today,
    };

    let page = SnapshotPage::new(req.page);
    let report = FillOrchestrator::new(state.resolver.clone(), options)
        .run(&page, &page, &req.profile_data, &LogReportSink)
        .await?;

    Ok(Json(SimulateResponse {
        report,
        page: page.snapshot().await,
    }))
}
