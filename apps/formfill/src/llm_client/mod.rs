//! LLM Client: the single point of entry for all Claude API calls in formfill.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! Resolution code talks to `dyn AiTransport`; `LlmClient` is the production
//! implementation and tests script replies through `testing::ScriptedTransport`.
//!
//! Models come from an injected `ModelRotation` (AI_MODELS). A rate-limited or
//! retired model rotates to the next one immediately; once every model has been
//! tried, remaining attempts back off exponentially (1s, 2s).

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("AI call timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl AiError {
    /// Errors that no retry or model switch can fix.
    fn is_fatal(&self) -> bool {
        matches!(self, AiError::AuthError(_) | AiError::InvalidRequest(_))
    }

    /// Errors that justify trying the next model right away.
    fn rotates_model(&self) -> bool {
        matches!(self, AiError::RateLimited(_) | AiError::NotFound(_))
    }
}

/// One prompt round-trip. `timeout` bounds each HTTP attempt.
#[derive(Debug, Clone)]
pub struct AiRequest {
    pub system: String,
    pub prompt: String,
    pub timeout: Duration,
}

#[async_trait]
pub trait AiTransport: Send + Sync {
    /// Returns the model's text reply.
    async fn complete(&self, request: &AiRequest) -> Result<String, AiError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Model rotation
// ────────────────────────────────────────────────────────────────────────────

/// Ordered fallback model ids plus the index currently in use.
/// Shared across calls so a rate-limited model stays skipped.
#[derive(Debug)]
pub struct ModelRotation {
    models: Vec<String>,
    current: AtomicUsize,
}

impl ModelRotation {
    pub fn new(models: Vec<String>) -> Self {
        Self {
            models,
            current: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn current(&self) -> Option<&str> {
        if self.models.is_empty() {
            return None;
        }
        let i = self.current.load(Ordering::Relaxed) % self.models.len();
        Some(self.models[i].as_str())
    }

    /// Advances to the next model (wrapping) and returns it.
    pub fn rotate(&self) -> Option<&str> {
        if self.models.is_empty() {
            return None;
        }
        self.current.fetch_add(1, Ordering::Relaxed);
        self.current()
    }
}

/// Runs `attempt` with the current model at most `MAX_RETRIES` times.
pub(crate) async fn run_with_retry<F, Fut>(
    rotation: &ModelRotation,
    mut attempt: F,
) -> Result<String, AiError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String, AiError>>,
{
    let mut models_tried = 1;
    let mut backoff_step = 0;
    let mut last_error = AiError::Transport("no models configured".to_string());

    for n in 0..MAX_RETRIES {
        let Some(model) = rotation.current().map(str::to_string) else {
            break;
        };

        match attempt(model.clone()).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("AI call attempt {} with {model} failed: {e}", n + 1);
                let rotate = e.rotates_model() && models_tried < rotation.len();
                last_error = e;
                if n + 1 == MAX_RETRIES {
                    break;
                }
                if rotate {
                    models_tried += 1;
                    if let Some(next) = rotation.rotate() {
                        debug!("Rotating AI model {model} -> {next}");
                    }
                    continue;
                }
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << backoff_step));
                backoff_step += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_error)
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic Messages API
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Maps a non-success HTTP status to an error kind.
fn error_for_status(status: u16, message: String) -> AiError {
    match status {
        400 | 413 | 422 => AiError::InvalidRequest(message),
        401 | 403 => AiError::AuthError(message),
        404 => AiError::NotFound(message),
        429 | 529 => AiError::RateLimited(message),
        _ => AiError::Transport(format!("status {status}: {message}")),
    }
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    rotation: Arc<ModelRotation>,
}

impl LlmClient {
    pub fn new(api_key: String, rotation: Arc<ModelRotation>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            rotation,
        })
    }

    pub fn current_model(&self) -> Option<&str> {
        self.rotation.current()
    }

    /// One HTTP attempt against `model`.
    async fn call_model(&self, model: &str, request: &AiRequest) -> Result<String, AiError> {
        let body = AnthropicRequest {
            model,
            max_tokens: MAX_TOKENS,
            system: &request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .timeout(request.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(error_for_status(status.as_u16(), message));
        }

        let llm_response: LlmResponse = response.json().await.map_err(transport_error)?;
        debug!(
            "LLM call succeeded ({model}): input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        llm_response
            .text()
            .map(str::to_string)
            .ok_or_else(|| AiError::Transport("LLM returned empty content".to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout
    } else {
        AiError::Transport(e.to_string())
    }
}

#[async_trait]
impl AiTransport for LlmClient {
    async fn complete(&self, request: &AiRequest) -> Result<String, AiError> {
        run_with_retry(&self.rotation, |model| async move {
            self.call_model(&model, request).await
        })
        .await
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn rotation(models: &[&str]) -> ModelRotation {
        ModelRotation::new(models.iter().map(|m| m.to_string()).collect())
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(error_for_status(400, "x".into()), AiError::InvalidRequest("x".into()));
        assert_eq!(error_for_status(401, "x".into()), AiError::AuthError("x".into()));
        assert_eq!(error_for_status(404, "x".into()), AiError::NotFound("x".into()));
        assert_eq!(error_for_status(429, "x".into()), AiError::RateLimited("x".into()));
        assert!(matches!(error_for_status(503, "x".into()), AiError::Transport(_)));
    }

    #[test]
    fn test_rotation_wraps() {
        let r = rotation(&["a", "b"]);
        assert_eq!(r.current(), Some("a"));
        assert_eq!(r.rotate(), Some("b"));
        assert_eq!(r.rotate(), Some("a"));
        assert_eq!(rotation(&[]).current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_rotates_to_next_model() {
        let r = rotation(&["sonnet", "haiku"]);
        let seen = Mutex::new(Vec::new());
        let result = run_with_retry(&r, |model| {
            seen.lock().unwrap().push(model.clone());
            async move {
                if model == "sonnet" {
                    Err(AiError::RateLimited("slow down".into()))
                } else {
                    Ok("ok".to_string())
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(*seen.lock().unwrap(), vec!["sonnet", "haiku"]);
        assert_eq!(r.current(), Some("haiku"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_error_surfaces_immediately() {
        let r = rotation(&["sonnet", "haiku"]);
        let calls = AtomicUsize::new(0);
        let result = run_with_retry(&r, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>(AiError::AuthError("bad key".into())) }
        })
        .await;
        assert_eq!(result.unwrap_err(), AiError::AuthError("bad key".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_stop_after_max_retries() {
        let r = rotation(&["sonnet"]);
        let calls = AtomicUsize::new(0);
        let result = run_with_retry(&r, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>(AiError::Transport("reset".into())) }
        })
        .await;
        assert!(matches!(result, Err(AiError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_rotation_falls_back_to_backoff() {
        let r = rotation(&["sonnet", "haiku"]);
        let seen = Mutex::new(Vec::new());
        let result = run_with_retry(&r, |model| {
            seen.lock().unwrap().push(model);
            async { Err::<String, _>(AiError::RateLimited("busy".into())) }
        })
        .await;
        assert!(matches!(result, Err(AiError::RateLimited(_))));
        // Third attempt reuses the last model after a backoff instead of wrapping.
        assert_eq!(*seen.lock().unwrap(), vec!["sonnet", "haiku", "haiku"]);
    }

    #[tokio::test]
    async fn test_scripted_transport_replays_in_order() {
        let t = testing::ScriptedTransport::new(vec![Ok("one".into()), Err(AiError::Timeout)]);
        let req = AiRequest {
            system: String::new(),
            prompt: "p".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(t.complete(&req).await.unwrap(), "one");
        assert_eq!(t.complete(&req).await.unwrap_err(), AiError::Timeout);
        assert!(t.complete(&req).await.is_err());
        assert_eq!(t.calls(), 3);
    }
}
