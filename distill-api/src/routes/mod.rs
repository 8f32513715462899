//! REST API Routes Module
//!
//! Route layout:
//! - `POST /api/chat` - agent invocation and dataset capture
//! - `GET /api/transcripts/{trace_id}/{raw,refined}` - stored records
//! - `/health/*` - liveness and readiness
//! - `GET /metrics` - Prometheus exposition
//! - `GET /openapi.json` - API description (with the `openapi` feature)
//! - `/data/*` - static files, when the configured directory exists

pub mod chat;
pub mod health;
pub mod transcripts;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// ============================================================================
// OPENAPI
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// CORS
// ============================================================================

/// Build the CORS layer.
///
/// With no configured origins every origin is allowed. Browsers refuse a
/// wildcard together with credentials, so in that case the request's own
/// origin, method and headers are mirrored back.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new().max_age(Duration::from_secs(config.cors_max_age_secs));

    let allow_all = config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*");
    if allow_all {
        tracing::info!("CORS: allowing all origins");
        return if config.cors_allow_credentials {
            cors.allow_origin(AllowOrigin::mirror_request())
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true)
        } else {
            cors.allow_origin(Any).allow_methods(Any).allow_headers(Any)
        };
    }

    tracing::info!("CORS: allowing origins: {:?}", config.cors_origins);
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = cors
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .allow_origin(origins);

    if config.cors_allow_credentials {
        cors.allow_credentials(true)
    } else {
        cors
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// Layer order (outermost first): CORS, then request observability.
pub fn create_api_router(state: AppState, config: &ApiConfig) -> Router {
    let mut router = Router::new()
        .nest(
            "/api",
            chat::create_router().merge(transcripts::create_router()),
        )
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    if config.static_dir.is_dir() {
        tracing::info!(dir = %config.static_dir.display(), "Serving static files at /data");
        router = router.nest_service("/data", ServeDir::new(&config.static_dir));
    } else {
        tracing::warn!(
            dir = %config.static_dir.display(),
            "Static directory not found, /data not mounted"
        );
    }

    router
        .layer(from_fn(observability_middleware))
        .layer(build_cors_layer(config))
        .with_state(state)
}
