use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};

/// Request size limit: 5MB max payload
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// The full application: routes plus transport middleware.
///
/// Health check bypasses rate limiting and the body limit.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    // Rate limiter: one token every 100ms (10 requests/second) per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(100)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    let protected_routes = api_routes().layer(
        ServiceBuilder::new()
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}

/// `/api/v1` routes.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/leads", get(handlers::list_leads))
        .route("/api/v1/leads/ingest", post(handlers::ingest_leads))
        .route("/api/v1/leads/stats", get(handlers::lead_stats))
        .route(
            "/api/v1/leads/:id",
            get(handlers::get_lead).delete(handlers::delete_lead),
        )
        .route(
            "/api/v1/reviews",
            get(handlers::list_reviews).delete(handlers::clear_reviews),
        )
}
