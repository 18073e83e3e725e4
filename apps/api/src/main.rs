mod config;
mod documents;
mod errors;
mod gateway;
mod models;
mod optimize;
mod routes;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::documents::service_client::DocumentServiceClient;
use crate::gateway::anthropic::AnthropicProvider;
use crate::gateway::gemini::GeminiProvider;
use crate::gateway::local::LocalProvider;
use crate::gateway::openrouter::OpenRouterProvider;
use crate::gateway::settings::load_settings;
use crate::gateway::{ModelGateway, ProviderClient};
use crate::optimize::optimizer::Optimizer;
use crate::optimize::prompt_builder::PromptBuilder;
use crate::routes::build_router;
use crate::session::store::{InMemorySessionStore, RedisSessionStore, SessionStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Providers are registered whether or not a key is configured; a missing
    // key surfaces as an Unauthorized failure on the first call.
    let providers: Vec<Arc<dyn ProviderClient>> = vec![
        Arc::new(GeminiProvider::new(config.gemini_api_key.clone())),
        Arc::new(OpenRouterProvider::new(config.openrouter_api_key.clone())),
        Arc::new(AnthropicProvider::new(config.anthropic_api_key.clone())),
        Arc::new(LocalProvider::new(
            config.local_llm_url.clone(),
            config.local_llm_model.clone(),
        )),
    ];

    let routing = load_settings(&config.model_settings_path).await;
    info!("Model routing loaded: {:?}", routing);
    let gateway = Arc::new(ModelGateway::new(providers, routing));

    let prompts = PromptBuilder::new(Some(config.prompt_template_dir.clone()));
    let optimizer = Arc::new(Optimizer::new(gateway.clone(), prompts));

    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis session store initialized");
            Arc::new(RedisSessionStore::new(client, config.session_ttl_secs))
        }
        None => {
            info!("REDIS_URL not set; sessions are kept in memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let documents = DocumentServiceClient::new(&config.doc_service_url);

    let state = AppState {
        config: config.clone(),
        gateway,
        optimizer,
        sessions,
        documents,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
