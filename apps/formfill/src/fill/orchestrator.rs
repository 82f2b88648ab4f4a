//! Fill Orchestrator: the convergence loop.
//!
//! One session:
//! 1. batch phase (depth 0 of the first pass only): every field that does not
//!    need individual handling is resolved with one `resolve_batch` call
//! 2. individual phase: the rest, one at a time (lazy options loaded first,
//!    checkboxes from yes/no answers, date pickers through the date parser)
//! 3. re-enumerate; newly revealed fields repeat 2 at `depth + 1`, up to `max_depth`
//! 4. verification, once: still-empty visible fields get one more individual
//!    pass with depth reset to 0
//!
//! Per-field failures are logged and recorded as missing. Only a failed first
//! enumeration aborts the session.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fill::page::{FieldValue, FormPage, PageError, QuestionSource, ReportSink};
use crate::fill::session::{CompletionReport, FillSession, MissingReason};
use crate::form::classifier::classify;
use crate::form::models::{FieldDescriptor, FieldMetadata, FieldType};
use crate::matching::dates::{format_date, parse_at};
use crate::matching::dictionary::concepts_in;
use crate::matching::fuzzy::{match_many, match_option};
use crate::resolution::pipeline::{
    AnswerResolver, BatchQuestion, Provenance, ResolutionRequest, ResolutionResult,
};
use crate::resolution::placeholder::is_placeholder_label;
use crate::resolution::profile_match::ProfileData;

/// Hard bound on convergence depth. `FillOptions::max_depth` is capped to it.
pub const MAX_DEPTH: usize = 10;

/// Upper bound on `FillOptions::settle_delay`.
pub const MAX_SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum FillError {
    #[error("Could not enumerate form fields: {0}")]
    Enumeration(#[from] PageError),
}

#[derive(Debug, Clone)]
pub struct FillOptions {
    /// Capture AI answers written during the batch phase into memory.
    pub learning: bool,
    /// Overrides the resolver's memory acceptance threshold.
    pub memory_threshold: Option<f64>,
    /// Pause after each successful write so dependent fields can appear.
    /// Capped to `MAX_SETTLE_DELAY`.
    pub settle_delay: Duration,
    pub max_depth: usize,
    /// Reference date for relative answers; the local date when unset.
    pub today: Option<NaiveDate>,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            learning: true,
            memory_threshold: None,
            settle_delay: Duration::from_millis(300),
            max_depth: MAX_DEPTH,
            today: None,
        }
    }
}

/// A field that is visible, empty and still to be handled in this pass.
struct Candidate {
    meta: FieldMetadata,
    descriptor: FieldDescriptor,
    question: String,
}

enum WriteOutcome {
    Written,
    Skipped(MissingReason),
}

pub struct FillOrchestrator {
    resolver: AnswerResolver,
    options: FillOptions,
}

impl FillOrchestrator {
    pub fn new(resolver: AnswerResolver, options: FillOptions) -> Self {
        Self { resolver, options }
    }

    pub async fn run(
        &self,
        page: &dyn FormPage,
        questions: &dyn QuestionSource,
        profile: &ProfileData,
        sink: &dyn ReportSink,
    ) -> Result<CompletionReport, FillError> {
        let mut session = FillSession::new();
        info!(session_id = %session.session_id, "Fill session started");

        let fields = page.enumerate_fields().await?;
        self.fill_pass(&mut session, page, questions, profile, Some(fields), false)
            .await;

        if session.begin_verification() {
            match page.enumerate_fields().await {
                Ok(fields) => {
                    let leftover = fields
                        .iter()
                        .filter(|f| is_fillable(f) && !session.is_processed(&f.id))
                        .count();
                    if leftover > 0 {
                        info!(
                            session_id = %session.session_id,
                            "Verification pass: {leftover} fields still empty"
                        );
                        self.fill_pass(&mut session, page, questions, profile, Some(fields), true)
                            .await;
                    }
                }
                Err(e) => warn!("Verification enumeration failed: {e}"),
            }
        }

        let report = session.into_report();
        sink.report(&report);
        Ok(report)
    }

    /// One convergence loop from depth 0. `first_fields` saves the initial enumeration.
    async fn fill_pass(
        &self,
        session: &mut FillSession,
        page: &dyn FormPage,
        questions: &dyn QuestionSource,
        profile: &ProfileData,
        mut first_fields: Option<Vec<FieldMetadata>>,
        is_retry: bool,
    ) {
        let max_depth = self.options.max_depth.min(MAX_DEPTH);
        let mut attempted: HashSet<String> = HashSet::new();
        session.set_depth(0);

        loop {
            let fields = match first_fields.take() {
                Some(fields) => fields,
                None => match page.enumerate_fields().await {
                    Ok(fields) => fields,
                    Err(e) => {
                        warn!("Re-enumeration failed at depth {}: {e}", session.depth);
                        break;
                    }
                },
            };

            let candidates = self
                .candidates(session, questions, &fields, &mut attempted)
                .await;
            if candidates.is_empty() {
                break;
            }

            if session.depth >= max_depth {
                warn!(
                    session_id = %session.session_id,
                    "Depth limit {max_depth} reached with {} fields left",
                    candidates.len()
                );
                for c in &candidates {
                    session.mark_missing(&c.meta.id, &c.question, MissingReason::DepthLimit);
                }
                break;
            }

            let batch_phase = session.depth == 0 && !is_retry;
            let (batch, individual): (Vec<Candidate>, Vec<Candidate>) = candidates
                .into_iter()
                .partition(|c| batch_phase && !c.descriptor.field_type.needs_individual_handling());

            let mut written = 0;
            if !batch.is_empty() {
                written += self.batch_phase(session, page, profile, &batch).await;
            }
            for candidate in individual {
                if self.fill_one(session, page, profile, candidate).await {
                    written += 1;
                }
            }

            debug!(depth = session.depth, written, is_retry, "Fill iteration done");
            if written == 0 {
                break;
            }
            session.set_depth(session.depth + 1);
        }
    }

    /// Visible, enabled, empty fields not yet processed or attempted in this pass.
    async fn candidates(
        &self,
        session: &mut FillSession,
        questions: &dyn QuestionSource,
        fields: &[FieldMetadata],
        attempted: &mut HashSet<String>,
    ) -> Vec<Candidate> {
        let mut out = Vec::new();
        for meta in fields {
            if !is_fillable(meta) || session.is_processed(&meta.id) || attempted.contains(&meta.id) {
                continue;
            }
            attempted.insert(meta.id.clone());

            let descriptor = classify(meta);
            if descriptor.field_type == FieldType::File {
                continue;
            }
            let Some(question) = questions.question_text(meta).await else {
                debug!(field_id = %meta.id, "No question text, skipping field");
                continue;
            };
            session.note_seen(&meta.id);
            out.push(Candidate {
                meta: meta.clone(),
                descriptor,
                question,
            });
        }
        out
    }

    async fn batch_phase(
        &self,
        session: &mut FillSession,
        page: &dyn FormPage,
        profile: &ProfileData,
        batch: &[Candidate],
    ) -> usize {
        let questions: Vec<BatchQuestion> = batch
            .iter()
            .map(|c| BatchQuestion {
                question: c.question.clone(),
                options: (!c.descriptor.options.is_empty()).then(|| c.descriptor.options.clone()),
                multiple: c.descriptor.multiple,
            })
            .collect();
        let results = self
            .resolver
            .resolve_batch(&questions, profile, self.options.memory_threshold)
            .await;

        let mut written = 0;
        for (i, candidate) in batch.iter().enumerate() {
            let result = results.get(&i).cloned().unwrap_or_else(ResolutionResult::empty);
            if self.apply(session, page, candidate, &result).await {
                written += 1;
                if self.options.learning && result.provenance == Provenance::Ai {
                    self.resolver
                        .remember(
                            &candidate.question,
                            &result.answer,
                            Some(candidate.descriptor.field_type),
                        )
                        .await;
                }
            }
        }
        written
    }

    async fn fill_one(
        &self,
        session: &mut FillSession,
        page: &dyn FormPage,
        profile: &ProfileData,
        mut candidate: Candidate,
    ) -> bool {
        if candidate.descriptor.options_pending {
            match page.load_options(&candidate.meta.id).await {
                Ok(options) => {
                    candidate.descriptor.options = options
                        .into_iter()
                        .filter(|o| !is_placeholder_label(o))
                        .collect();
                    candidate.descriptor.options_pending = false;
                }
                Err(e) => {
                    warn!(field_id = %candidate.meta.id, "Loading options failed: {e}");
                    session.mark_missing(&candidate.meta.id, &candidate.question, MissingReason::PageError);
                    return false;
                }
            }
        }

        let options = &candidate.descriptor.options;
        let request = ResolutionRequest {
            question_text: candidate.question.clone(),
            profile_data: profile.clone(),
            options: (!options.is_empty()).then(|| options.clone()),
            memory_threshold: self.options.memory_threshold,
            field_type: Some(candidate.descriptor.field_type),
            multiple: candidate.descriptor.multiple,
        };
        let result = self.resolver.resolve(&request).await;
        self.apply(session, page, &candidate, &result).await
    }

    /// Converts, writes and records one answer. Returns whether a value was written.
    async fn apply(
        &self,
        session: &mut FillSession,
        page: &dyn FormPage,
        candidate: &Candidate,
        result: &ResolutionResult,
    ) -> bool {
        let id = &candidate.meta.id;
        if result.is_empty() {
            session.mark_missing(id, &candidate.question, MissingReason::NoAnswer);
            return false;
        }

        let outcome = match self.to_value(&candidate.descriptor, &result.answer) {
            Err(reason) => WriteOutcome::Skipped(reason),
            Ok(value) => match page.write_value(id, &value).await {
                Ok(true) => WriteOutcome::Written,
                Ok(false) => WriteOutcome::Skipped(MissingReason::WriteRejected),
                Err(e) => {
                    warn!(field_id = %id, "Write failed: {e}");
                    WriteOutcome::Skipped(MissingReason::PageError)
                }
            },
        };

        match outcome {
            WriteOutcome::Written => {
                debug!(field_id = %id, provenance = ?result.provenance, "Field filled");
                session.mark_processed(id);
                let settle = self.options.settle_delay.min(MAX_SETTLE_DELAY);
                if !settle.is_zero() {
                    tokio::time::sleep(settle).await;
                }
                true
            }
            WriteOutcome::Skipped(reason) => {
                debug!(field_id = %id, ?reason, "Field left empty");
                session.mark_missing(id, &candidate.question, reason);
                false
            }
        }
    }

    fn to_value(&self, descriptor: &FieldDescriptor, answer: &str) -> Result<FieldValue, MissingReason> {
        match descriptor.field_type {
            FieldType::Checkbox => checkbox_value(answer).ok_or(MissingReason::NoMatchingOption),
            FieldType::DatePicker => {
                let today = self.options.today.unwrap_or_else(|| Local::now().date_naive());
                let date = parse_at(answer, today).ok_or(MissingReason::UnparseableDate)?;
                Ok(FieldValue::Text(format_date(date, descriptor.format.as_deref())))
            }
            _ if !descriptor.options.is_empty() => {
                if descriptor.multiple {
                    let picked = match_many(answer, &descriptor.options);
                    if picked.is_empty() {
                        return Err(MissingReason::NoMatchingOption);
                    }
                    return Ok(FieldValue::Choices(picked));
                }
                match_option(answer, &descriptor.options)
                    .map(FieldValue::Choice)
                    .ok_or(MissingReason::NoMatchingOption)
            }
            _ => Ok(FieldValue::Text(answer.to_string())),
        }
    }
}

/// Visible, enabled, not a file input, and currently empty.
fn is_fillable(meta: &FieldMetadata) -> bool {
    meta.visible
        && !meta.disabled
        && meta.is_empty()
        && meta.input_type.as_deref() != Some("file")
}

/// Yes/no-shaped answers to a checked state. Negation wins when both appear.
fn checkbox_value(answer: &str) -> Option<FieldValue> {
    let concepts = concepts_in(answer);
    if concepts.contains(&"no") {
        Some(FieldValue::Checked(false))
    } else if concepts.contains(&"yes") {
        Some(FieldValue::Checked(true))
    } else {
        None
    }
}
