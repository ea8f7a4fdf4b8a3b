//! Service entrypoint - configuration, wiring, and the HTTP server.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strand_concierge::adapters::ai::{CompletionClient, GeminiBackend, GeminiConfig};
use strand_concierge::adapters::cache::SessionCache;
use strand_concierge::adapters::http::{app_router, AppState};
use strand_concierge::adapters::index::{LibrarianConfig, LibrarianIndex};
use strand_concierge::adapters::store::InMemoryEventStore;
use strand_concierge::application::{ChatService, DiagnosticAgent, RoutinePipeline, Summarizer};
use strand_concierge::config::AppConfig;
use strand_concierge::ports::{EventStore, ProductIndex};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let backend = Arc::new(GeminiBackend::new(
        GeminiConfig::new(config.ai.gemini_api_key.clone())
            .with_base_url(config.ai.gemini_base_url.clone()),
    ));
    let client = Arc::new(
        CompletionClient::new(backend)
            .with_model_pool(config.ai.model_pool_list())
            .with_max_retries(config.ai.max_retries)
            .with_reasoning_budget(config.ai.reasoning_budget),
    );

    let index: Arc<dyn ProductIndex> = Arc::new(LibrarianIndex::new(
        LibrarianConfig::new(config.librarian.api_key.clone())
            .with_base_url(config.librarian.base_url.clone()),
    ));
    let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
    let cache = Arc::new(SessionCache::new());

    let chat = Arc::new(ChatService::new(
        DiagnosticAgent::new(Arc::clone(&client)),
        Summarizer::new(Arc::clone(&client)),
        cache,
        Arc::clone(&store),
    ));
    let pipeline = Arc::new(RoutinePipeline::new(client, index, store));

    let router = app_router(AppState::new(chat, pipeline), &config.server);

    let addr = config.server.socket_addr();
    info!(%addr, "starting strand-concierge");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
