// Learning memory: confidence-scored answers keyed by normalized question,
// persisted as one JSON document in a pluggable key-value backend.

pub mod backend;
pub mod handlers;
pub mod normalize;
pub mod store;

use std::sync::Arc;

use tokio::sync::Mutex;

/// One store shared by every request and fill session; last write wins.
pub type SharedMemory = Arc<Mutex<store::MemoryStore>>;
