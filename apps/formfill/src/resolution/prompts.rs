// Answer resolution LLM prompt templates.
// All prompts for the resolution module are defined here.

pub const SINGLE_ANSWER_SYSTEM: &str = "\
You fill in job application forms on behalf of a candidate. \
Reply with the answer text only: no quotes, no labels, no explanations. \
Keep answers short and in the language of the question.";

pub const SINGLE_ANSWER_PROMPT_TEMPLATE: &str = r#"Answer the following form question for the candidate.

QUESTION:
{question}

CANDIDATE PROFILE (JSON):
{profile}
{options_block}
RULES:
1. Use only facts present in the profile. If the profile cannot answer, reply with an empty string.
2. Reply with the answer text only."#;

pub const OPTIONS_BLOCK_TEMPLATE: &str = r#"
ALLOWED OPTIONS (your reply MUST be exactly one of these, copied verbatim):
{options}
"#;

pub const MULTI_OPTIONS_BLOCK_TEMPLATE: &str = r#"
ALLOWED OPTIONS (several may apply: reply with every matching option copied verbatim, separated by commas):
{options}
"#;

pub const BATCH_ANSWER_PROMPT_TEMPLATE: &str = r#"Answer each numbered form question for the candidate.

CANDIDATE PROFILE (JSON):
{profile}

QUESTIONS (JSON object, key = question index):
{questions}

OUTPUT SCHEMA (return exactly this structure):
{
  "<question index>": "answer text"
}

RULES:
1. Use only facts present in the profile. Use "" for any question the profile cannot answer.
2. When a question lists options, the answer MUST be one of them, copied verbatim.
   When it is also marked "multiple", give every option that applies, separated by commas.
3. Return ONLY the JSON object: nothing else, no code fences."#;
