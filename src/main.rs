use std::sync::Arc;

use coral_funnel::analytics::{AnalyticsSink, TracingSink};
use coral_funnel::api::{HttpRegistrationClient, RegistrationApi};
use coral_funnel::config::FunnelConfig;
use coral_funnel::error::Result;
use coral_funnel::funnel::{FunnelManager, FunnelRouteState, funnel_routes};
use coral_funnel::storage::{LibSqlStorage, MemoryStorage, SlotStorage};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = FunnelConfig::from_env()?;

    eprintln!("Coral Funnel v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", config.api_base_url);
    eprintln!("   Source: {}", config.source);
    eprintln!("   Funnel API: http://0.0.0.0:{}/api/funnel", config.port);

    // ── Storage ──────────────────────────────────────────────────────────
    let storage: Arc<dyn SlotStorage> = match &config.storage_path {
        Some(path) => {
            eprintln!("   Storage: {}", path.display());
            Arc::new(LibSqlStorage::new_local(path).await?)
        }
        None => {
            eprintln!("   Storage: in-memory");
            Arc::new(MemoryStorage::new())
        }
    };

    // ── Collaborators ────────────────────────────────────────────────────
    let api: Arc<dyn RegistrationApi> = Arc::new(HttpRegistrationClient::new(
        config.api_base_url.clone(),
        config.http_timeout,
    )?);
    let analytics: Arc<dyn AnalyticsSink> = Arc::new(TracingSink);

    let manager = Arc::new(FunnelManager::new(&config, storage, api, analytics));
    manager.start_session().await?;

    let app = funnel_routes(FunnelRouteState { manager }).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Funnel server started");
    axum::serve(listener, app).await?;

    Ok(())
}
