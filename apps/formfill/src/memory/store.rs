//! Memory Store: remembers answers per normalized question with a confidence
//! score that moves on repeat captures and on user feedback.
//!
//! Confidence rules:
//! - new record: 0.5
//! - repeat capture, same answer: +0.05 (max 1.0)
//! - repeat capture, changed answer: -0.1 (never pushed below 0.3 by this rule)
//! - positive feedback: +0.1 (max 1.0), negative feedback: -0.15 (min 0.1)
//! - explicit user correction: 1.0
//!
//! Every mutation is staged on a copy and committed only after the backend
//! write succeeds, so a failed write leaves the in-memory view unchanged.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::form::models::FieldType;
use crate::memory::backend::{KeyValueStore, StoreError};
use crate::memory::normalize::{jaccard, normalize_question, question_hash, word_set};

/// Key of the serialized store in the backend.
pub const STORE_KEY: &str = "formfill:memory:v1";

const INITIAL_CONFIDENCE: f64 = 0.5;
const REPEAT_BOOST: f64 = 0.05;
const CHANGE_PENALTY: f64 = 0.1;
const CHANGE_FLOOR: f64 = 0.3;
const FEEDBACK_BOOST: f64 = 0.1;
const FEEDBACK_PENALTY: f64 = 0.15;
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 1.0;

/// Exact-hash hits above this are returned as `learned`.
const EXACT_TRUST: f64 = 0.7;
/// Paraphrase hits need a Jaccard similarity above this.
const SIMILARITY_MIN: f64 = 0.5;
/// Confidence multiplier applied to paraphrase hits.
const SIMILAR_DISCOUNT: f64 = 0.8;

/// Eviction starts when the document exceeds this share of the byte cap.
const EVICTION_TRIGGER: f64 = 0.9;
/// Share of records dropped per eviction round, lowest frequency first.
const EVICTION_FRACTION: f64 = 0.3;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Failed to persist memory store: {0}")]
    StoreWrite(#[from] StoreError),

    #[error("Failed to serialize memory store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Memory record {0} does not fit under the store size cap")]
    Evicted(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub question_hash: String,
    pub question_text: String,
    pub variations: BTreeSet<String>,
    pub answer: String,
    pub frequency: u32,
    pub confidence: f64,
    pub feedback_positive: u32,
    pub feedback_negative: u32,
    pub last_used: DateTime<Utc>,
    pub field_type: Option<FieldType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Learned,
    Similar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub answer: String,
    pub confidence: f64,
    pub source: SuggestionSource,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_records: usize,
    pub average_confidence: f64,
    pub high_confidence: usize,
    pub total_feedback_positive: u32,
    pub total_feedback_negative: u32,
}

pub struct MemoryStore {
    records: HashMap<String, MemoryRecord>,
    backend: Arc<dyn KeyValueStore>,
    max_bytes: usize,
}

impl MemoryStore {
    /// Empty store over `backend`. Nothing is read until `load`.
    pub fn new(backend: Arc<dyn KeyValueStore>, max_bytes: usize) -> Self {
        Self {
            records: HashMap::new(),
            backend,
            max_bytes,
        }
    }

    /// Restores the store from `backend`. A missing or corrupt document yields an empty store.
    pub async fn load(backend: Arc<dyn KeyValueStore>, max_bytes: usize) -> Result<Self, StoreError> {
        let mut store = Self::new(backend, max_bytes);
        if let Some(doc) = store.backend.get(STORE_KEY).await? {
            match serde_json::from_str::<HashMap<String, MemoryRecord>>(&doc) {
                Ok(records) => store.records = records,
                Err(e) => warn!("Discarding unreadable memory document ({} bytes): {e}", doc.len()),
            }
        }
        info!("Memory store loaded with {} records", store.records.len());
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, hash: &str) -> Option<&MemoryRecord> {
        self.records.get(hash)
    }

    /// Remembers `answer` for `question`. Returns the question hash, or `None`
    /// (and writes nothing) when either side is blank.
    pub async fn capture(
        &mut self,
        question: &str,
        answer: &str,
        field_type: Option<FieldType>,
    ) -> Result<Option<String>, MemoryError> {
        let normalized = normalize_question(question);
        let answer = answer.trim();
        if normalized.is_empty() || answer.is_empty() {
            return Ok(None);
        }
        let hash = question_hash(&normalized);
        let now = Utc::now();

        let mut next = self.records.clone();
        match next.get_mut(&hash) {
            Some(record) => {
                record.frequency = record.frequency.saturating_add(1);
                if record.answer == answer {
                    record.confidence = clamp(record.confidence + REPEAT_BOOST);
                } else {
                    let floor = CHANGE_FLOOR.min(record.confidence);
                    record.confidence = clamp((record.confidence - CHANGE_PENALTY).max(floor));
                    record.answer = answer.to_string();
                }
                record.variations.insert(normalized);
                record.last_used = now;
                if field_type.is_some() {
                    record.field_type = field_type;
                }
                debug!(
                    "Updated memory {hash}: frequency={}, confidence={:.2}",
                    record.frequency, record.confidence
                );
            }
            None => {
                next.insert(
                    hash.clone(),
                    MemoryRecord {
                        question_hash: hash.clone(),
                        question_text: question.trim().to_string(),
                        variations: BTreeSet::from([normalized]),
                        answer: answer.to_string(),
                        frequency: 1,
                        confidence: INITIAL_CONFIDENCE,
                        feedback_positive: 0,
                        feedback_negative: 0,
                        last_used: now,
                        field_type,
                    },
                );
                debug!("Created memory {hash}");
            }
        }

        self.commit(next, Some(&hash)).await?;
        Ok(Some(hash))
    }

    /// Best remembered answer for `question`: an exact hit above 0.7 confidence,
    /// else the most similar paraphrase (Jaccard > 0.5) at a discounted confidence.
    pub fn suggest(&self, question: &str) -> Option<Suggestion> {
        let normalized = normalize_question(question);
        if normalized.is_empty() {
            return None;
        }

        let hash = question_hash(&normalized);
        if let Some(record) = self.records.get(&hash) {
            if record.confidence > EXACT_TRUST {
                return Some(Suggestion {
                    answer: record.answer.clone(),
                    confidence: record.confidence,
                    source: SuggestionSource::Learned,
                    hash,
                });
            }
        }

        let query = word_set(&normalized);
        if query.is_empty() {
            return None;
        }

        let (record, similarity) = self
            .records
            .values()
            .map(|r| (r, best_similarity(&query, r)))
            .max_by(|(a, sa), (b, sb)| {
                sa.partial_cmp(sb)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.question_hash.cmp(&a.question_hash))
            })?;

        if similarity <= SIMILARITY_MIN {
            return None;
        }
        debug!(
            "Similar memory {} for '{question}' (similarity {similarity:.2})",
            record.question_hash
        );
        Some(Suggestion {
            answer: record.answer.clone(),
            confidence: record.confidence * SIMILAR_DISCOUNT,
            source: SuggestionSource::Similar,
            hash: record.question_hash.clone(),
        })
    }

    /// Applies user feedback. Returns `false` (and writes nothing) for an unknown hash.
    pub async fn record_feedback(&mut self, hash: &str, feedback: Feedback) -> Result<bool, MemoryError> {
        let mut next = self.records.clone();
        let Some(record) = next.get_mut(hash) else {
            return Ok(false);
        };
        match feedback {
            Feedback::Positive => {
                record.confidence = clamp(record.confidence + FEEDBACK_BOOST);
                record.feedback_positive = record.feedback_positive.saturating_add(1);
            }
            Feedback::Negative => {
                record.confidence = clamp(record.confidence - FEEDBACK_PENALTY);
                record.feedback_negative = record.feedback_negative.saturating_add(1);
            }
        }
        record.last_used = Utc::now();
        self.commit(next, Some(hash)).await?;
        Ok(true)
    }

    /// Explicit user correction: overwrites the answer at full confidence.
    pub async fn set_answer(&mut self, hash: &str, answer: &str) -> Result<bool, MemoryError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(false);
        }
        let mut next = self.records.clone();
        let Some(record) = next.get_mut(hash) else {
            return Ok(false);
        };
        record.answer = answer.to_string();
        record.confidence = MAX_CONFIDENCE;
        record.feedback_positive = record.feedback_positive.saturating_add(1);
        record.last_used = Utc::now();
        self.commit(next, Some(hash)).await?;
        Ok(true)
    }

    /// Records `question` as another phrasing answered by record `hash`.
    pub async fn add_variation(&mut self, hash: &str, question: &str) -> Result<bool, MemoryError> {
        let normalized = normalize_question(question);
        if normalized.is_empty() {
            return Ok(false);
        }
        let mut next = self.records.clone();
        let Some(record) = next.get_mut(hash) else {
            return Ok(false);
        };
        if !record.variations.insert(normalized) {
            return Ok(true);
        }
        record.last_used = Utc::now();
        self.commit(next, Some(hash)).await?;
        Ok(true)
    }

    /// User-triggered bulk clear.
    pub async fn clear(&mut self) -> Result<(), MemoryError> {
        let count = self.records.len();
        self.commit(HashMap::new(), None).await?;
        info!("Cleared {count} memory records");
        Ok(())
    }

    /// All records, most frequently used first.
    pub fn list(&self) -> Vec<MemoryRecord> {
        let mut records: Vec<MemoryRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| b.last_used.cmp(&a.last_used))
        });
        records
    }

    pub fn stats(&self) -> MemoryStats {
        let total_records = self.records.len();
        let average_confidence = if total_records == 0 {
            0.0
        } else {
            self.records.values().map(|r| r.confidence).sum::<f64>() / total_records as f64
        };
        MemoryStats {
            total_records,
            average_confidence,
            high_confidence: self
                .records
                .values()
                .filter(|r| r.confidence > EXACT_TRUST)
                .count(),
            total_feedback_positive: self.records.values().map(|r| r.feedback_positive).sum(),
            total_feedback_negative: self.records.values().map(|r| r.feedback_negative).sum(),
        }
    }

    /// Evicts if needed, writes the document, then swaps `next` in.
    /// Fails without writing when eviction dropped the `written` record.
    async fn commit(
        &mut self,
        mut next: HashMap<String, MemoryRecord>,
        written: Option<&str>,
    ) -> Result<(), MemoryError> {
        let doc = fit_under_cap(&mut next, self.max_bytes)?;
        if let Some(hash) = written {
            if !next.contains_key(hash) {
                warn!("Memory record {hash} was evicted by its own write");
                return Err(MemoryError::Evicted(hash.to_string()));
            }
        }
        self.backend.set(STORE_KEY, &doc).await?;
        self.records = next;
        Ok(())
    }
}

fn clamp(confidence: f64) -> f64 {
    confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

fn best_similarity(query: &std::collections::HashSet<String>, record: &MemoryRecord) -> f64 {
    std::iter::once(record.question_text.as_str())
        .chain(record.variations.iter().map(String::as_str))
        .map(|text| jaccard(query, &word_set(text)))
        .fold(0.0, f64::max)
}

/// Serializes `records`, dropping the lowest-frequency 30% per round while the
/// document is above the eviction trigger.
fn fit_under_cap(
    records: &mut HashMap<String, MemoryRecord>,
    max_bytes: usize,
) -> Result<String, serde_json::Error> {
    let trigger = (max_bytes as f64 * EVICTION_TRIGGER) as usize;
    let mut doc = serde_json::to_string(records)?;

    while doc.len() > trigger && !records.is_empty() {
        let mut ranked: Vec<(String, u32, DateTime<Utc>)> = records
            .values()
            .map(|r| (r.question_hash.clone(), r.frequency, r.last_used))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.cmp(&b.2)));

        let drop_count = ((ranked.len() as f64 * EVICTION_FRACTION).ceil() as usize).max(1);
        for (hash, _, _) in ranked.into_iter().take(drop_count) {
            records.remove(&hash);
        }
        warn!(
            "Memory store over {trigger} bytes ({} bytes); evicted {drop_count} low-frequency records",
            doc.len()
        );
        doc = serde_json::to_string(records)?;
    }
    Ok(doc)
}
