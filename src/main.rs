use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_leadgen_api::config::Config;
use rust_leadgen_api::db::Database;
use rust_leadgen_api::handlers::AppState;
use rust_leadgen_api::pipeline::LeadPipeline;
use rust_leadgen_api::routes;
use rust_leadgen_api::services::LeadService;
use rust_leadgen_api::store::LeadStore;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Lead store (Postgres when configured, memory otherwise).
/// - Pipeline stages and the hydrated match index.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_leadgen_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let settings = config.pipeline_settings()?;

    let store = match &config.database_url {
        Some(url) => {
            let db = Database::new(url).await?;
            tracing::info!("Database connection pool established");
            LeadStore::postgres(db.pool)
        }
        None => LeadStore::memory(),
    };

    let pipeline = LeadPipeline::from_settings(&settings);
    let leads = LeadService::new(pipeline, settings.matching.clone(), store).await?;

    if config.api_key.is_none() {
        tracing::warn!("API_KEY not set, /api/v1 routes are unauthenticated");
    }

    let app_state = Arc::new(AppState {
        config: config.clone(),
        leads,
    });

    let app = routes::build_router(app_state)?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
