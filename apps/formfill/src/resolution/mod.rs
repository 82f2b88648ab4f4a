// Answer resolution: memory, then profile data, then the AI tier, then defaults.

pub mod handlers;
pub mod pipeline;
pub mod placeholder;
pub mod profile_match;
pub mod prompts;
