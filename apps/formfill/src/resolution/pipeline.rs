//! Answer Resolution Pipeline.
//!
//! Single mode, first success wins:
//! 1. memory suggestion above the confidence threshold (`learned`)
//! 2. profile concept / key lookup, then consent / notification defaults (`profile`)
//! 3. AI query, captured into memory on success (`ai`)
//! 4. nothing usable: `empty`
//!
//! Batch mode runs tier 1 per question, one AI round-trip for everything
//! still pending, then tier 2 per question for whatever the AI left blank.
//!
//! Multi-select questions are fitted part by part: the answer becomes the
//! matched options joined with ", ".

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::form::models::FieldType;
use crate::llm_client::{strip_json_fences, AiRequest, AiTransport};
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_INVENTION_INSTRUCTION};
use crate::matching::fuzzy::fit_answer;
use crate::memory::store::SuggestionSource;
use crate::memory::SharedMemory;
use crate::resolution::placeholder::is_placeholder_answer;
use crate::resolution::profile_match::{default_answer, match_profile, ProfileData};
use crate::resolution::prompts::{
    BATCH_ANSWER_PROMPT_TEMPLATE, MULTI_OPTIONS_BLOCK_TEMPLATE, OPTIONS_BLOCK_TEMPLATE,
    SINGLE_ANSWER_PROMPT_TEMPLATE, SINGLE_ANSWER_SYSTEM,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Learned,
    Profile,
    Ai,
    /// Nothing usable: the field is skipped and not marked filled.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub answer: String,
    pub provenance: Provenance,
}

impl ResolutionResult {
    pub fn new(answer: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            answer: answer.into(),
            provenance,
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), Provenance::Empty)
    }

    pub fn is_empty(&self) -> bool {
        self.provenance == Provenance::Empty || self.answer.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolutionRequest {
    pub question_text: String,
    #[serde(default)]
    pub profile_data: ProfileData,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    /// Overrides the configured tier-1 acceptance threshold for this call.
    #[serde(default)]
    pub memory_threshold: Option<f64>,
    #[serde(default)]
    pub field_type: Option<FieldType>,
    /// Several options may be picked at once.
    #[serde(default)]
    pub multiple: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub multiple: bool,
}

impl BatchQuestion {
    fn choices(&self) -> Choices<'_> {
        Choices::new(self.options.as_deref(), self.multiple)
    }
}

/// The option constraint of one question.
#[derive(Debug, Clone, Copy)]
struct Choices<'a> {
    options: Option<&'a [String]>,
    multiple: bool,
}

impl<'a> Choices<'a> {
    fn new(options: Option<&'a [String]>, multiple: bool) -> Self {
        let options = options.filter(|o| !o.is_empty());
        Self {
            options,
            multiple: multiple && options.is_some(),
        }
    }

    /// Options a whole profile value is matched against. Multi-select values
    /// are split and fitted afterwards instead.
    fn whole(&self) -> Option<&'a [String]> {
        if self.multiple {
            None
        } else {
            self.options
        }
    }

    fn fit(&self, answer: &str) -> Option<String> {
        match self.options {
            Some(options) => fit_answer(answer, options, self.multiple),
            None => Some(answer.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub memory_threshold: f64,
    pub ai_timeout: Duration,
    pub batch_timeout: Duration,
    /// Minimum overlap length for reclassifying a batch AI answer as `profile`.
    pub profile_match_min_chars: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            memory_threshold: 0.75,
            ai_timeout: Duration::from_millis(15_000),
            batch_timeout: Duration::from_millis(30_000),
            profile_match_min_chars: 3,
        }
    }
}

#[derive(Clone)]
pub struct AnswerResolver {
    memory: SharedMemory,
    transport: Option<Arc<dyn AiTransport>>,
    settings: ResolverSettings,
}

impl AnswerResolver {
    /// `transport = None` disables the AI tier (no API key configured).
    pub fn new(
        memory: SharedMemory,
        transport: Option<Arc<dyn AiTransport>>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            memory,
            transport,
            settings,
        }
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn ai_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Resolves one question. Never fails: every error degrades to the next tier.
    pub async fn resolve(&self, request: &ResolutionRequest) -> ResolutionResult {
        let question = request.question_text.trim();
        if question.is_empty() {
            return ResolutionResult::empty();
        }
        let choices = Choices::new(request.options.as_deref(), request.multiple);
        let threshold = request
            .memory_threshold
            .unwrap_or(self.settings.memory_threshold);

        if let Some(answer) = self.from_memory(question, choices, threshold).await {
            debug!(question, "Resolved from memory");
            return ResolutionResult::new(answer, Provenance::Learned);
        }

        if let Some(answer) = profile_tier(question, &request.profile_data, choices) {
            debug!(question, "Resolved from profile");
            return ResolutionResult::new(answer, Provenance::Profile);
        }

        // Tier 2 is deterministic, so a failed AI call has nothing left to fall back to.
        if let Some(answer) = self.ask_single(question, &request.profile_data, choices).await {
            debug!(question, "Resolved by AI");
            self.remember(question, &answer, request.field_type).await;
            return ResolutionResult::new(answer, Provenance::Ai);
        }

        debug!(question, "No tier produced an answer");
        ResolutionResult::empty()
    }

    /// Resolves many questions with at most one AI round-trip.
    /// Every input index is present in the returned map.
    pub async fn resolve_batch(
        &self,
        questions: &[BatchQuestion],
        profile: &ProfileData,
        memory_threshold: Option<f64>,
    ) -> BTreeMap<usize, ResolutionResult> {
        let threshold = memory_threshold.unwrap_or(self.settings.memory_threshold);
        let mut results = BTreeMap::new();
        let mut pending = Vec::new();

        for (i, q) in questions.iter().enumerate() {
            let question = q.question.trim();
            if question.is_empty() {
                results.insert(i, ResolutionResult::empty());
                continue;
            }
            match self.from_memory(question, q.choices(), threshold).await {
                Some(answer) => {
                    results.insert(i, ResolutionResult::new(answer, Provenance::Learned));
                }
                None => pending.push(i),
            }
        }

        if !pending.is_empty() {
            if let Some(answers) = self.ask_batch(questions, &pending, profile).await {
                for &i in &pending {
                    let Some(text) = answers.get(&i.to_string()).and_then(value_text) else {
                        continue;
                    };
                    let Some(answer) = accept_reply(&text, questions[i].choices()) else {
                        continue;
                    };
                    let provenance = if profile
                        .contains_related(&answer, self.settings.profile_match_min_chars)
                    {
                        Provenance::Profile
                    } else {
                        Provenance::Ai
                    };
                    results.insert(i, ResolutionResult::new(answer, provenance));
                }
            }
        }

        for &i in &pending {
            if results.contains_key(&i) {
                continue;
            }
            let q = &questions[i];
            let result = profile_tier(&q.question, profile, q.choices())
                .map(|answer| ResolutionResult::new(answer, Provenance::Profile))
                .unwrap_or_else(ResolutionResult::empty);
            results.insert(i, result);
        }

        let resolved = results.values().filter(|r| !r.is_empty()).count();
        info!("Batch resolved {resolved}/{} questions", questions.len());
        results
    }

    /// Offers an answer to memory. A failed write is logged, never fatal.
    pub async fn remember(&self, question: &str, answer: &str, field_type: Option<FieldType>) {
        let mut memory = self.memory.lock().await;
        if let Err(e) = memory.capture(question, answer, field_type).await {
            warn!("Memory capture failed for '{question}': {e}");
        }
    }

    async fn from_memory(
        &self,
        question: &str,
        choices: Choices<'_>,
        threshold: f64,
    ) -> Option<String> {
        let mut memory = self.memory.lock().await;
        let suggestion = memory.suggest(question)?;
        if suggestion.confidence <= threshold {
            debug!(
                question,
                confidence = suggestion.confidence,
                "Memory suggestion below threshold"
            );
            return None;
        }

        let answer = choices.fit(&suggestion.answer)?;

        if suggestion.source == SuggestionSource::Similar {
            if let Err(e) = memory.add_variation(&suggestion.hash, question).await {
                warn!("Failed to record question variation: {e}");
            }
        }
        Some(answer)
    }

    async fn ask_single(
        &self,
        question: &str,
        profile: &ProfileData,
        choices: Choices<'_>,
    ) -> Option<String> {
        let transport = self.transport.as_ref()?;

        let template = if choices.multiple {
            MULTI_OPTIONS_BLOCK_TEMPLATE
        } else {
            OPTIONS_BLOCK_TEMPLATE
        };
        let options_block = choices
            .options
            .map(|o| template.replace("{options}", &bullet_list(o)))
            .unwrap_or_default();
        let prompt = SINGLE_ANSWER_PROMPT_TEMPLATE
            .replace("{question}", question)
            .replace("{profile}", &profile_json(profile))
            .replace("{options_block}", &options_block);
        let request = AiRequest {
            system: format!("{SINGLE_ANSWER_SYSTEM} {NO_INVENTION_INSTRUCTION}"),
            prompt,
            timeout: self.settings.ai_timeout,
        };

        let text = self.call(transport.as_ref(), &request, self.settings.ai_timeout).await?;
        accept_reply(&text, choices)
    }

    async fn ask_batch(
        &self,
        questions: &[BatchQuestion],
        pending: &[usize],
        profile: &ProfileData,
    ) -> Option<Map<String, Value>> {
        let transport = self.transport.as_ref()?;

        let listed: Map<String, Value> = pending
            .iter()
            .map(|&i| {
                let q = &questions[i];
                let choices = q.choices();
                let entry = match choices.options {
                    Some(options) if choices.multiple => {
                        json!({ "question": q.question, "options": options, "multiple": true })
                    }
                    Some(options) => json!({ "question": q.question, "options": options }),
                    None => json!({ "question": q.question }),
                };
                (i.to_string(), entry)
            })
            .collect();
        let prompt = BATCH_ANSWER_PROMPT_TEMPLATE
            .replace("{profile}", &profile_json(profile))
            .replace(
                "{questions}",
                &serde_json::to_string_pretty(&listed).unwrap_or_default(),
            );
        let request = AiRequest {
            system: format!("{JSON_ONLY_SYSTEM} {NO_INVENTION_INSTRUCTION}"),
            prompt,
            timeout: self.settings.batch_timeout,
        };

        let text = self
            .call(transport.as_ref(), &request, self.settings.batch_timeout)
            .await?;
        match serde_json::from_str::<Map<String, Value>>(strip_json_fences(&text)) {
            Ok(answers) => Some(answers),
            Err(e) => {
                warn!("Discarding malformed batch reply ({} bytes): {e}", text.len());
                None
            }
        }
    }

    /// One time-boxed AI call. Any failure is logged and reported as `None`.
    async fn call(
        &self,
        transport: &dyn AiTransport,
        request: &AiRequest,
        limit: Duration,
    ) -> Option<String> {
        match tokio::time::timeout(limit, transport.complete(request)).await {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!("AI tier failed: {e}");
                None
            }
            Err(_) => {
                warn!("AI tier timed out after {}ms", limit.as_millis());
                None
            }
        }
    }
}

/// Profile lookup, then the consent / notification defaults.
fn profile_tier(question: &str, profile: &ProfileData, choices: Choices<'_>) -> Option<String> {
    let fitted = |answer: String| {
        if choices.multiple {
            choices.fit(&answer)
        } else {
            Some(answer)
        }
    };
    match_profile(question, profile, choices.whole())
        .and_then(fitted)
        .or_else(|| default_answer(question, choices.whole()).and_then(fitted))
}

/// Cleans an AI reply and checks it is usable; with options it must match them.
fn accept_reply(text: &str, choices: Choices<'_>) -> Option<String> {
    let cleaned = text
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    if is_placeholder_answer(cleaned) {
        debug!(reply = cleaned, "AI reply is placeholder-shaped");
        return None;
    }
    let fitted = choices.fit(cleaned);
    if fitted.is_none() {
        debug!(reply = cleaned, "AI reply matches no option");
    }
    fitted
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "Yes" } else { "No" }.to_string()),
        _ => None,
    }
}

fn profile_json(profile: &ProfileData) -> String {
    serde_json::to_string_pretty(profile).unwrap_or_default()
}

fn bullet_list(options: &[String]) -> String {
    options
        .iter()
        .map(|o| format!("- {o}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedTransport;
    use crate::llm_client::AiError;
    use crate::memory::backend::InMemoryStore;
    use crate::memory::store::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    fn memory() -> SharedMemory {
        Arc::new(Mutex::new(MemoryStore::new(
            Arc::new(InMemoryStore::new()),
            5 * 1024 * 1024,
        )))
    }

    fn resolver(transport: Option<Arc<dyn AiTransport>>) -> AnswerResolver {
        AnswerResolver::new(memory(), transport, ResolverSettings::default())
    }

    fn request(question: &str) -> ResolutionRequest {
        ResolutionRequest {
            question_text: question.to_string(),
            ..Default::default()
        }
    }

    fn profile() -> ProfileData {
        [("first_name", "Anna"), ("city", "Kraków"), ("salary", "15000 PLN")]
            .into_iter()
            .collect()
    }

    async fn trust(resolver: &AnswerResolver, question: &str, answer: &str) {
        let mut memory = resolver.memory().lock().await;
        let hash = memory.capture(question, answer, None).await.unwrap().unwrap();
        memory.set_answer(&hash, answer).await.unwrap();
    }

    struct SlowTransport;

    #[async_trait]
    impl AiTransport for SlowTransport {
        async fn complete(&self, _request: &AiRequest) -> Result<String, AiError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_empty_profile_without_ai_is_empty() {
        let r = resolver(None);
        let result = r.resolve(&request("What is your favourite framework?")).await;
        assert_eq!(result, ResolutionResult::empty());
    }

    #[tokio::test]
    async fn test_trusted_memory_wins_without_calling_ai() {
        let ai = Arc::new(ScriptedTransport::replying("from ai"));
        let r = resolver(Some(ai.clone()));
        trust(&r, "Notice period", "1 month").await;

        let result = r.resolve(&request("Notice period?")).await;
        assert_eq!(result, ResolutionResult::new("1 month", Provenance::Learned));
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_untrusted_memory_falls_through_to_profile() {
        let r = resolver(None);
        r.remember("First name", "Old", None).await;

        let mut req = request("First name");
        req.profile_data = profile();
        let result = r.resolve(&req).await;
        assert_eq!(result, ResolutionResult::new("Anna", Provenance::Profile));
    }

    #[tokio::test]
    async fn test_accepted_similar_hit_records_variation() {
        let r = resolver(None);
        trust(&r, "What is your expected monthly salary", "15000").await;

        let result = r.resolve(&request("What is your expected salary")).await;
        assert_eq!(result.provenance, Provenance::Learned);

        let memory = r.memory().lock().await;
        let record = &memory.list()[0];
        assert!(record.variations.contains("what is your expected salary"));
    }

    #[tokio::test]
    async fn test_ai_answer_is_captured() {
        let ai = Arc::new(ScriptedTransport::replying("\"Rust and Go\""));
        let r = resolver(Some(ai.clone()));

        let result = r.resolve(&request("Which languages do you code in daily?")).await;
        assert_eq!(result, ResolutionResult::new("Rust and Go", Provenance::Ai));

        let memory = r.memory().lock().await;
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.list()[0].answer, "Rust and Go");
        assert!(ai.prompts()[0].contains("Which languages do you code in daily?"));
    }

    #[tokio::test]
    async fn test_ai_reply_is_mapped_onto_options() {
        let ai = Arc::new(ScriptedTransport::replying("Remote"));
        let r = resolver(Some(ai.clone()));
        let mut req = request("Preferowany tryb pracy");
        req.options = Some(vec!["Stacjonarnie".into(), "Zdalnie".into()]);

        let result = r.resolve(&req).await;
        assert_eq!(result, ResolutionResult::new("Zdalnie", Provenance::Ai));
        assert!(ai.prompts()[0].contains("- Zdalnie"));
    }

    #[tokio::test]
    async fn test_placeholder_ai_reply_is_empty() {
        let ai = Arc::new(ScriptedTransport::replying("[Your answer here]"));
        let r = resolver(Some(ai));
        let result = r.resolve(&request("Describe a challenging project")).await;
        assert_eq!(result, ResolutionResult::empty());
        assert!(r.memory().lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_consent_default_wins_before_ai() {
        let ai = Arc::new(ScriptedTransport::replying("No"));
        let r = resolver(Some(ai.clone()));
        let result = r
            .resolve(&request("I consent to the processing of my personal data"))
            .await;
        assert_eq!(result, ResolutionResult::new("Yes", Provenance::Profile));
        assert_eq!(ai.calls(), 0);
        assert!(r.memory().lock().await.is_empty());

        let mut req = request("Subscribe to our newsletter");
        req.options = Some(vec!["Tak".into(), "Nie".into()]);
        assert_eq!(r.resolve(&req).await, ResolutionResult::new("Nie", Provenance::Profile));
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_select_keeps_every_choice() {
        let r = resolver(None);
        let mut req = request("Languages you speak");
        req.profile_data = [("languages", "English, Polish")].into_iter().collect();
        req.options = Some(vec!["English".into(), "German".into(), "Polish".into()]);
        req.multiple = true;
        assert_eq!(
            r.resolve(&req).await,
            ResolutionResult::new("English, Polish", Provenance::Profile)
        );

        req.multiple = false;
        assert_eq!(r.resolve(&req).await.answer.matches(',').count(), 0);
    }

    #[tokio::test]
    async fn test_multi_select_ai_reply_is_fitted_per_option() {
        let ai = Arc::new(ScriptedTransport::replying("german; english"));
        let r = resolver(Some(ai.clone()));
        let mut req = request("Which languages do you use at work?");
        req.options = Some(vec!["English".into(), "German".into(), "Polish".into()]);
        req.multiple = true;
        assert_eq!(
            r.resolve(&req).await,
            ResolutionResult::new("English, German", Provenance::Ai)
        );
        assert!(ai.prompts()[0].contains("several may apply"));
    }

    #[tokio::test]
    async fn test_ai_failure_degrades_to_empty() {
        let ai = Arc::new(ScriptedTransport::new(vec![Err(AiError::AuthError("bad key".into()))]));
        let r = resolver(Some(ai));
        let result = r.resolve(&request("Describe a challenging project")).await;
        assert_eq!(result, ResolutionResult::empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ai_timeout_is_a_tier_failure() {
        let r = resolver(Some(Arc::new(SlowTransport)));
        let result = r.resolve(&request("Describe a challenging project")).await;
        assert_eq!(result, ResolutionResult::empty());
    }

    #[tokio::test]
    async fn test_batch_mixes_memory_ai_and_profile() {
        let ai = Arc::new(ScriptedTransport::replying(
            "```json\n{\"1\": \"Kraków\", \"2\": \"I enjoy distributed systems\", \"3\": \"\"}\n```",
        ));
        let r = resolver(Some(ai.clone()));
        trust(&r, "Notice period", "1 month").await;

        let questions = vec![
            BatchQuestion { question: "Notice period".into(), options: None, ..Default::default() },
            BatchQuestion { question: "Where do you live?".into(), options: None, ..Default::default() },
            BatchQuestion { question: "Why this team?".into(), options: None, ..Default::default() },
            BatchQuestion { question: "First name".into(), options: None, ..Default::default() },
        ];
        let results = r.resolve_batch(&questions, &profile(), None).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[&0], ResolutionResult::new("1 month", Provenance::Learned));
        assert_eq!(results[&1], ResolutionResult::new("Kraków", Provenance::Profile));
        assert_eq!(
            results[&2],
            ResolutionResult::new("I enjoy distributed systems", Provenance::Ai)
        );
        assert_eq!(results[&3], ResolutionResult::new("Anna", Provenance::Profile));
        assert_eq!(ai.calls(), 1);
        assert!(!ai.prompts()[0].contains("Notice period"));
    }

    #[tokio::test]
    async fn test_malformed_batch_reply_is_discarded_wholesale() {
        let ai = Arc::new(ScriptedTransport::replying("Sure! Here are the answers: 1) Kraków"));
        let r = resolver(Some(ai));
        let questions = vec![
            BatchQuestion { question: "City".into(), options: None, ..Default::default() },
            BatchQuestion { question: "Why this team?".into(), options: None, ..Default::default() },
        ];
        let results = r.resolve_batch(&questions, &profile(), None).await;
        assert_eq!(results[&0], ResolutionResult::new("Kraków", Provenance::Profile));
        assert_eq!(results[&1], ResolutionResult::empty());
    }

    #[tokio::test]
    async fn test_batch_options_are_enforced() {
        let ai = Arc::new(ScriptedTransport::replying(r#"{"0": "Yes", "1": "Purple"}"#));
        let r = resolver(Some(ai));
        let yes_no = Some(vec!["Tak".to_string(), "Nie".to_string()]);
        let questions = vec![
            BatchQuestion { question: "Do you have a work permit?".into(), options: yes_no.clone(), ..Default::default() },
            BatchQuestion { question: "Do you own a car?".into(), options: yes_no, ..Default::default() },
        ];
        let results = r.resolve_batch(&questions, &ProfileData::default(), None).await;
        assert_eq!(results[&0], ResolutionResult::new("Tak", Provenance::Ai));
        assert_eq!(results[&1], ResolutionResult::empty());
    }
}
