//! SnapshotPage: a declarative in-memory form.
//!
//! Describes fields (metadata, label, lazily loaded options) and reveal rules
//! ("when field X receives a value, fields Y become visible"). Used by the
//! dry-run fill endpoint and by the orchestrator tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::fill::page::{FieldValue, FormPage, PageError, QuestionSource};
use crate::form::models::FieldMetadata;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotField {
    #[serde(flatten)]
    pub meta: FieldMetadata,
    /// Visible label text; falls back to placeholder, then name.
    #[serde(default)]
    pub label: Option<String>,
    /// Options that appear only once the widget is opened.
    #[serde(default)]
    pub lazy_options: Vec<String>,
    /// Simulates a widget that swallows writes.
    #[serde(default)]
    pub reject_writes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealRule {
    pub when_field: String,
    /// Only this value (case-insensitive) triggers the rule; any value when absent.
    #[serde(default)]
    pub equals: Option<String>,
    pub reveal: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub fields: Vec<SnapshotField>,
    #[serde(default)]
    pub reveal_rules: Vec<RevealRule>,
}

pub struct SnapshotPage {
    state: Mutex<PageSnapshot>,
}

impl SnapshotPage {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    /// Current state, values included.
    pub async fn snapshot(&self) -> PageSnapshot {
        self.state.lock().await.clone()
    }

    pub async fn value_of(&self, field_id: &str) -> Option<String> {
        let state = self.state.lock().await;
        state
            .fields
            .iter()
            .find(|f| f.meta.id == field_id)
            .and_then(|f| f.meta.value.clone())
    }
}

#[async_trait]
impl FormPage for SnapshotPage {
    async fn enumerate_fields(&self) -> Result<Vec<FieldMetadata>, PageError> {
        let state = self.state.lock().await;
        Ok(state.fields.iter().map(|f| f.meta.clone()).collect())
    }

    async fn load_options(&self, field_id: &str) -> Result<Vec<String>, PageError> {
        let mut state = self.state.lock().await;
        let field = state
            .fields
            .iter_mut()
            .find(|f| f.meta.id == field_id)
            .ok_or_else(|| PageError::FieldNotFound(field_id.to_string()))?;
        if !field.lazy_options.is_empty() {
            field.meta.options = std::mem::take(&mut field.lazy_options);
        }
        Ok(field.meta.options.clone())
    }

    async fn write_value(&self, field_id: &str, value: &FieldValue) -> Result<bool, PageError> {
        let mut state = self.state.lock().await;
        let field = state
            .fields
            .iter_mut()
            .find(|f| f.meta.id == field_id)
            .ok_or_else(|| PageError::FieldNotFound(field_id.to_string()))?;

        if field.reject_writes || field.meta.disabled || !field.meta.visible {
            return Ok(false);
        }
        let accepted = match value {
            FieldValue::Choice(choice) => {
                field.meta.options.is_empty() || field.meta.options.contains(choice)
            }
            FieldValue::Choices(choices) => choices.iter().all(|c| field.meta.options.contains(c)),
            FieldValue::Text(_) | FieldValue::Checked(_) => true,
        };
        if !accepted {
            return Ok(false);
        }

        let written = value.display();
        field.meta.value = Some(written.clone());

        let revealed: Vec<String> = state
            .reveal_rules
            .iter()
            .filter(|r| r.when_field == field_id)
            .filter(|r| {
                r.equals
                    .as_deref()
                    .map_or(true, |e| e.eq_ignore_ascii_case(&written))
            })
            .flat_map(|r| r.reveal.iter().cloned())
            .collect();
        for field in state.fields.iter_mut() {
            if revealed.contains(&field.meta.id) && !field.meta.visible {
                debug!(field_id = %field.meta.id, "Field revealed");
                field.meta.visible = true;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl QuestionSource for SnapshotPage {
    async fn question_text(&self, field: &FieldMetadata) -> Option<String> {
        let state = self.state.lock().await;
        let snapshot = state.fields.iter().find(|f| f.meta.id == field.id)?;
        snapshot
            .label
            .clone()
            .or_else(|| snapshot.meta.placeholder.clone())
            .or_else(|| snapshot.meta.name.clone())
            .filter(|q| !q.trim().is_empty())
    }
}
