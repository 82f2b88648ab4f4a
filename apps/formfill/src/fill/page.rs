//! Collaborator seams between the orchestrator and the page it fills.
//!
//! The host owns the DOM. Everything the orchestrator needs from it goes
//! through these traits, so the fill loop runs unchanged against a live
//! browser bridge or the declarative `SnapshotPage`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::fill::session::CompletionReport;
use crate::form::models::FieldMetadata;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Field {0} not found on the page")]
    FieldNotFound(String),

    #[error("Page unavailable: {0}")]
    Unavailable(String),
}

/// A value ready to be written into one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    /// One option, verbatim from the field's option list.
    Choice(String),
    /// Several options for a multi-select widget.
    Choices(Vec<String>),
    Checked(bool),
}

impl FieldValue {
    /// How the value reads once it sits in the field.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => s.clone(),
            FieldValue::Choices(items) => items.join(", "),
            FieldValue::Checked(checked) => checked.to_string(),
        }
    }
}

#[async_trait]
pub trait FormPage: Send + Sync {
    /// Every field currently in the form, visible or not, with its current value.
    async fn enumerate_fields(&self) -> Result<Vec<FieldMetadata>, PageError>;

    /// Opens a lazy widget and returns the options it loaded.
    async fn load_options(&self, field_id: &str) -> Result<Vec<String>, PageError>;

    /// Returns `Ok(false)` when the page refused the value.
    async fn write_value(&self, field_id: &str, value: &FieldValue) -> Result<bool, PageError>;
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// The question a field asks. `None` means the field is skipped.
    async fn question_text(&self, field: &FieldMetadata) -> Option<String>;
}

/// Receives the completion report at the end of a session. Fire-and-forget.
pub trait ReportSink: Send + Sync {
    fn report(&self, report: &CompletionReport);
}

pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn report(&self, report: &CompletionReport) {
        info!(
            session_id = %report.session_id,
            filled = report.filled_count,
            total = report.total_count,
            missing = report.missing_fields.len(),
            elapsed_ms = report.elapsed_ms,
            "Fill session complete"
        );
    }
}
