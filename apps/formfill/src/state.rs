use crate::config::Config;
use crate::memory::SharedMemory;
use crate::resolution::pipeline::AnswerResolver;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The same store the resolver reads and writes; exposed for the memory API.
    pub memory: SharedMemory,
    pub resolver: AnswerResolver,
    pub config: Config,
}
