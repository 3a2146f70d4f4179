//! gateway-core-demo
//!
//! Single-binary demonstration service that:
//! 1. Builds the identity pool from configuration and seeds it with
//!    whatever refresh tokens the environment supplies.
//! 2. Exposes `/health` and `/stats` wrapping the pool's own health and
//!    statistics snapshots.
//! 3. Exposes `/internal/drive`, a thin JSON wrapper around
//!    `drive_request`, standing in for the out-of-scope OpenAI-compatible
//!    surface so the core is runnable end-to-end.

mod config;
mod error;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use gateway_core::{CoreError, Engine as CoreEngine, EngineConfig};
use pool::IdentityStore;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[derive(Clone)]
struct AppState {
    engine: Arc<CoreEngine>,
    started_at: Instant,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting gateway-core-demo");

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = AppConfig::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config =
        AppConfig::load(&config_path).with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let store = Arc::new(IdentityStore::new());
    for seed in &config.seed_identities {
        store.add(seed.refresh_token.expose().clone(), seed.priority, seed.display_name.clone());
    }
    info!(identities = config.seed_identities.len(), "identity pool seeded");

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(config.insecure_tls)
        .build()
        .context("failed to build HTTP client")?;

    let mut engine_config = EngineConfig::new(
        config.upstream_url.clone(),
        config.identity_refresh_url.clone(),
        config.identity_api_key.expose().clone(),
    );
    if let Some(proxy) = &config.proxy_url {
        info!(proxy = %proxy, "provisioning path will use configured proxy (informational only; not wired into the client builder here)");
    }
    engine_config.upstream_timeout = Duration::from_secs(60);
    engine_config.identity_timeout = Duration::from_secs(30);
    engine_config.fallback_jwt = config.fallback_jwt.as_ref().map(|jwt| jwt.expose().clone());

    let engine = Arc::new(CoreEngine::new(store.clone(), client, engine_config));

    let recovery_interval = Duration::from_secs(config.recovery_interval_secs);
    let _recovery_handle = pool::spawn_recovery_task(store.clone(), recovery_interval);

    let app_state = AppState {
        engine,
        started_at: Instant::now(),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/internal/drive", post(drive_handler))
        .with_state(app_state);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.listen_addr))?;

    info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let report = state.engine.health_report();
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": uptime,
        "identities": report.identities.iter().map(|i| serde_json::json!({
            "display_name": i.display_name,
            "priority": i.priority.as_str(),
            "active": i.active,
            "healthy": i.healthy,
            "failure_count": i.failure_count,
            "has_cached_credential": i.has_cached_credential,
            "credential_expires_in_seconds": i.credential_expires_in_seconds,
        })).collect::<Vec<_>>(),
    }))
}

async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.engine.pool_stats();
    Json(serde_json::json!({
        "total": stats.total,
        "active": stats.active,
        "failed": stats.failed,
        "anonymous": stats.anonymous,
        "shared": stats.shared,
        "personal": stats.personal,
    }))
}

#[derive(Deserialize)]
struct DriveRequestBody {
    payload_base64: String,
}

#[derive(Serialize)]
struct DriveResponseBody {
    text: String,
    conversation_id: Option<String>,
    task_id: Option<String>,
    event_count: usize,
}

async fn drive_handler(State(state): State<AppState>, Json(body): Json<DriveRequestBody>) -> Response {
    let payload = match base64::engine::general_purpose::STANDARD.decode(&body.payload_base64) {
        Ok(bytes) => bytes,
        Err(err) => {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"category": "invalid_request", "message": err.to_string()})),
            )
                .into_response();
        }
    };

    match state.engine.drive_request(payload).await {
        Ok(out) => Json(DriveResponseBody {
            text: out.text,
            conversation_id: out.conversation_id,
            task_id: out.task_id,
            event_count: out.events.len(),
        })
        .into_response(),
        Err(err) => (core_error_status(&err), Json(core_error_body(&err))).into_response(),
    }
}

fn core_error_status(err: &CoreError) -> axum::http::StatusCode {
    use axum::http::StatusCode;
    match err {
        CoreError::PoolExhausted | CoreError::ProvisioningRateLimited => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::UpstreamUnauthorized { .. } => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn core_error_body(err: &CoreError) -> serde_json::Value {
    serde_json::json!({
        "category": err.category(),
        "status": err.upstream_status(),
        "message": err.to_string(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
