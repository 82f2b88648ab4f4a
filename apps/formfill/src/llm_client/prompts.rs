// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction shared by every form-answer prompt: never make things up.
pub const NO_INVENTION_INSTRUCTION: &str = "\
    CRITICAL: Answer only from the candidate profile provided. \
    Do NOT invent names, numbers, dates, or contact details. \
    If the profile does not support an answer, return an empty string.";
