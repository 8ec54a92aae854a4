use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use site_chat_bridge::chat::{ChatService, ChatSettings};
use site_chat_bridge::config::Config;
use site_chat_bridge::llm::{AiProvider, OpenAIAdapter};
use site_chat_bridge::records::{DatasetCache, RecordsClient};
use site_chat_bridge::utils::init_logger;
use site_chat_bridge::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        data_dir = %config.cache.data_dir.display(),
        "Configuration loaded"
    );

    let provider: Option<Arc<dyn AiProvider>> = match OpenAIAdapter::from_config(&config.llm)? {
        Some(adapter) => Some(Arc::new(adapter)),
        None => {
            warn!("OPENAI_API_KEY is not set; chat requests will report a configuration error");
            None
        }
    };

    let records = RecordsClient::from_config(&config.records)?;
    if !records.is_configured() {
        warn!("PLEASANTER_API_KEY is not set; site notifications will fail");
    }

    let cache = DatasetCache::new(config.cache.data_dir.clone());
    let shutdown = CancellationToken::new();

    let chat = ChatService::new(
        provider,
        cache.clone(),
        ChatSettings::from_config(&config.llm, &config.chat),
        shutdown.clone(),
    );

    let state = AppState {
        config: config.clone(),
        chat: Arc::new(chat),
        records: Arc::new(records),
        cache,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Server stopped");
    Ok(())
}
