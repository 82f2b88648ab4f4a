use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// Every resolution tier came back empty.
    NoAnswer,
    /// An answer exists but fits none of the field's options.
    NoMatchingOption,
    UnparseableDate,
    /// The page refused the value.
    WriteRejected,
    /// The page errored while loading options or writing.
    PageError,
    /// Revealed after the depth bound was reached.
    DepthLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingField {
    pub field_id: String,
    pub question: String,
    pub reason: MissingReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub filled_count: usize,
    pub total_count: usize,
    pub missing_fields: Vec<MissingField>,
    pub elapsed_ms: u64,
    pub max_depth_reached: usize,
    pub verification_ran: bool,
}

/// State of one fill run. A field id is never both processed and missing.
#[derive(Debug)]
pub struct FillSession {
    pub session_id: Uuid,
    pub depth: usize,
    started_at: DateTime<Utc>,
    clock: Instant,
    processed: HashSet<String>,
    missing: Vec<MissingField>,
    seen: HashSet<String>,
    max_depth_reached: usize,
    verification_done: bool,
}

impl FillSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            depth: 0,
            started_at: Utc::now(),
            clock: Instant::now(),
            processed: HashSet::new(),
            missing: Vec::new(),
            seen: HashSet::new(),
            max_depth_reached: 0,
            verification_done: false,
        }
    }

    /// Counts `field_id` toward the report total.
    pub fn note_seen(&mut self, field_id: &str) {
        self.seen.insert(field_id.to_string());
    }

    /// Call only after a value was actually written.
    pub fn mark_processed(&mut self, field_id: &str) {
        self.missing.retain(|m| m.field_id != field_id);
        self.processed.insert(field_id.to_string());
    }

    /// Records or updates a missing entry. Processed fields are left alone.
    pub fn mark_missing(&mut self, field_id: &str, question: &str, reason: MissingReason) {
        if self.processed.contains(field_id) {
            return;
        }
        match self.missing.iter_mut().find(|m| m.field_id == field_id) {
            Some(entry) => entry.reason = reason,
            None => self.missing.push(MissingField {
                field_id: field_id.to_string(),
                question: question.to_string(),
                reason,
            }),
        }
    }

    pub fn is_processed(&self, field_id: &str) -> bool {
        self.processed.contains(field_id)
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
        self.max_depth_reached = self.max_depth_reached.max(depth);
    }

    /// True the first time it is called, false afterwards.
    pub fn begin_verification(&mut self) -> bool {
        !std::mem::replace(&mut self.verification_done, true)
    }

    pub fn into_report(self) -> CompletionReport {
        CompletionReport {
            session_id: self.session_id,
            started_at: self.started_at,
            filled_count: self.processed.len(),
            total_count: self.seen.len().max(self.processed.len()),
            missing_fields: self.missing,
            elapsed_ms: self.clock.elapsed().as_millis() as u64,
            max_depth_reached: self.max_depth_reached,
            verification_ran: self.verification_done,
        }
    }
}

impl Default for FillSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_clears_missing_entry() {
        let mut s = FillSession::new();
        s.mark_missing("city", "City", MissingReason::NoAnswer);
        assert_eq!(s.missing.len(), 1);
        s.mark_processed("city");
        assert!(s.missing.is_empty());
        assert!(s.is_processed("city"));
    }

    #[test]
    fn test_missing_ignored_once_processed() {
        let mut s = FillSession::new();
        s.mark_processed("city");
        s.mark_missing("city", "City", MissingReason::NoAnswer);
        assert!(s.missing.is_empty());
    }

    #[test]
    fn test_missing_entry_is_updated_not_duplicated() {
        let mut s = FillSession::new();
        s.mark_missing("dob", "Date of birth", MissingReason::NoAnswer);
        s.mark_missing("dob", "Date of birth", MissingReason::UnparseableDate);
        assert_eq!(s.missing.len(), 1);
        assert_eq!(s.missing[0].reason, MissingReason::UnparseableDate);
    }

    #[test]
    fn test_verification_starts_once() {
        let mut s = FillSession::new();
        assert!(s.begin_verification());
        assert!(!s.begin_verification());
    }

    #[test]
    fn test_report_counts() {
        let mut s = FillSession::new();
        s.note_seen("a");
        s.note_seen("b");
        s.mark_processed("a");
        s.mark_missing("b", "B?", MissingReason::NoAnswer);
        s.set_depth(2);
        s.set_depth(0);
        let report = s.into_report();
        assert_eq!(report.filled_count, 1);
        assert_eq!(report.total_count, 2);
        assert_eq!(report.missing_fields.len(), 1);
        assert_eq!(report.max_depth_reached, 2);
    }
}
