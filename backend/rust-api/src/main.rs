use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizdesk_api::{
    config::{Config, StorageBackend},
    create_router,
    repository::{MemoryRepository, MongoRepository, QuizRepository},
    services::{bootstrap, AppState},
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quizdesk_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    tracing::info!("Starting QuizDesk API");

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded for environment: {:?}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            serve(config, Arc::new(MemoryRepository::new())).await
        }
        StorageBackend::Mongo => {
            let client = mongodb::Client::with_uri_str(&config.mongo_uri)
                .await
                .context("Failed to connect to MongoDB")?;
            let repo = MongoRepository::new(client, &config.mongo_database);
            repo.ensure_indexes()
                .await
                .context("Failed to create MongoDB indexes")?;
            tracing::info!("MongoDB connected");
            serve(config, Arc::new(repo)).await
        }
    }
}

async fn serve<R: QuizRepository>(config: Config, repo: Arc<R>) -> anyhow::Result<()> {
    bootstrap::bootstrap(&config, repo.as_ref())
        .await
        .context("Failed to bootstrap reference data")?;

    let bind_addr = config.bind_addr.clone();
    let app = create_router(Arc::new(AppState::new(config, repo)));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
