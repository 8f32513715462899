//! DISTILL API Server Entry Point
//!
//! Loads `.env` and configuration, warms up the agent connection and
//! starts the Axum HTTP server.

use axum::Router;
use distill_api::telemetry::{init_tracing, TelemetryConfig};
use distill_api::{
    create_api_router, resolve_bind_addr, AgentConfig, ApiConfig, ApiError, ApiResult, AppState,
    FlattenSettings, LangfuseConfig, StorageConfig,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let dotenv = dotenvy::dotenv();

    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;
    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }

    let api_config = ApiConfig::from_env();
    let agent_config = AgentConfig::from_env();
    let langfuse_config = LangfuseConfig::from_env();
    let storage_config = StorageConfig::from_env();
    let flatten_settings = FlattenSettings::from_env()?;

    tracing::info!(
        agent_url = %agent_config.base_url,
        data_path = %agent_config.data_path,
        log_dir = %storage_config.log_dir.display(),
        transcript_source = ?flatten_settings.source,
        "Configuration loaded"
    );

    let state = AppState::from_config(
        &api_config,
        &agent_config,
        &langfuse_config,
        &storage_config,
        flatten_settings,
    )?;
    state.agent.warm_up().await;

    let app: Router = create_api_router(state, &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting DISTILL API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
