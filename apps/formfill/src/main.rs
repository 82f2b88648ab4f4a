mod config;
mod errors;
mod fill;
mod form;
mod llm_client;
mod matching;
mod memory;
mod resolution;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{AiTransport, LlmClient, ModelRotation};
use crate::memory::backend::{FileStore, InMemoryStore, KeyValueStore, RedisStore};
use crate::memory::store::MemoryStore;
use crate::resolution::pipeline::{AnswerResolver, ResolverSettings};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting formfill v{}", env!("CARGO_PKG_VERSION"));

    // Initialize memory backend and restore the learned answers
    let backend = build_memory_backend(&config)?;
    let store = MemoryStore::load(backend, config.memory_max_bytes).await?;
    let memory = Arc::new(Mutex::new(store));

    // Initialize LLM client (AI tier is optional)
    let transport: Option<Arc<dyn AiTransport>> = match &config.anthropic_api_key {
        Some(key) => {
            let rotation = Arc::new(ModelRotation::new(config.ai_models.clone()));
            let llm = LlmClient::new(key.clone(), rotation)?;
            info!(
                "LLM client initialized (model: {})",
                llm.current_model().unwrap_or("none")
            );
            Some(Arc::new(llm))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; AI tier disabled");
            None
        }
    };

    let resolver = AnswerResolver::new(
        memory.clone(),
        transport,
        ResolverSettings {
            memory_threshold: config.memory_confidence_threshold,
            ai_timeout: Duration::from_millis(config.ai_timeout_ms),
            batch_timeout: Duration::from_millis(config.ai_batch_timeout_ms),
            profile_match_min_chars: config.profile_match_min_chars,
        },
    );

    // Build app state
    let state = AppState {
        memory,
        resolver,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // the browser-side host calls from arbitrary origins

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Redis when REDIS_URL is set, else a JSON file when MEMORY_FILE is set, else process memory.
fn build_memory_backend(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    if let Some(url) = &config.redis_url {
        info!("Memory backend: redis");
        return Ok(Arc::new(RedisStore::new(url)?));
    }
    if let Some(dir) = &config.memory_file {
        info!("Memory backend: JSON files in {dir}");
        return Ok(Arc::new(FileStore::new(dir)));
    }
    warn!("No REDIS_URL or MEMORY_FILE set; learned answers will not survive a restart");
    Ok(Arc::new(InMemoryStore::new()))
}
