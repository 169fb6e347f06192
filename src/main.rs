use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use flexiev_chat::config::Config;
use flexiev_chat::embeddings::{EmbeddingProvider, HashingEmbedder, OpenAIEmbedder, OPENAI_API_BASE};
use flexiev_chat::llm::{LLMAdapter, LLMProviderConfig, UnconfiguredAdapter, LLM};
use flexiev_chat::routes::create_router;
use flexiev_chat::utils::init_tracing;
use flexiev_chat::AppState;

#[derive(Parser, Debug)]
#[command(name = "flexiev-chat", about = "EV assistant chat service with document retrieval")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Host/interface to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,
}

fn build_llm(config: &Config) -> Arc<dyn LLMAdapter> {
    let provider = LLMProviderConfig {
        name: config.llm.provider.clone(),
        api_key: config.llm.active_api_key().to_string(),
        model: config.llm.model.clone(),
    };

    match LLM::new(provider) {
        Ok(llm) => {
            info!(provider = llm.provider_name(), model = llm.default_model(), "LLM provider ready");
            Arc::new(llm)
        }
        Err(e) => {
            warn!(error = %e, "{} not found; chat requests will fail until it is set", config.llm.api_key_env_var());
            Arc::new(UnconfiguredAdapter::new(&config.llm.provider, config.llm.api_key_env_var()))
        }
    }
}

fn build_embedder(config: &Config) -> Arc<dyn EmbeddingProvider> {
    if config.embedding.api_key.trim().is_empty() {
        warn!("OPENAI_API_KEY not set; using the local hashing embedder");
        return Arc::new(HashingEmbedder::default());
    }

    let api_base = config.embedding.api_base.as_deref().unwrap_or(OPENAI_API_BASE);
    info!(model = %config.embedding.model, api_base, "Embedding provider ready");
    Arc::new(OpenAIEmbedder::new_with_api_base(
        &config.embedding.api_key,
        &config.embedding.model,
        api_base,
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, starting graceful shutdown"),
        _ = terminate => info!("SIGTERM received, starting graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    config.validate()?;
    info!("Configuration loaded: {:?}", config.server);

    let llm = build_llm(&config);
    let embedder = build_embedder(&config);
    let state = AppState::new(config.clone(), embedder, llm);

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.server.host, config.server.port))?;
    info!("FlexiEV Chat Service listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Port {} is already in use or unavailable", config.server.port))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("HTTP server closed");
    Ok(())
}
