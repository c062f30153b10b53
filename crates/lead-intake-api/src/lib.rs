//! # Lead-Intake HTTP Service
//!
//! HTTP surface of the lead ingestion pipeline.
//!
//! This service provides:
//! - The inbound webhook endpoint (`POST <endpoint_path>?token=...`)
//! - Liveness and readiness endpoints
//! - A Prometheus metrics endpoint
//!
//! The `token` query parameter is a bearer credential. Request logging and
//! tracing spans record the path only, never the query string.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

pub use config::{
    LoggingConfig, ServerConfig, ServiceConfig, StorageBackend, StorageConfig, WebhookConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use responses::{ErrorResponse, HealthResponse, ReadinessResponse, WebhookResponse};

use axum::{
    extract::{rejection::QueryRejection, DefaultBodyLimit, Query, Request, State},
    http::StatusCode,
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use lead_intake_core::{
    IngestionError, IngestionRequest, IntegrationDirectory, LeadStore, Timestamp,
    WebhookIngestion,
};
use std::{collections::HashMap, future::IntoFuture, sync::Arc, time::Instant};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::{error, info, info_span, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Webhook ingestion controller
    pub ingestion: WebhookIngestion,

    /// Integration directory, probed by the readiness check
    pub directory: Arc<dyn IntegrationDirectory>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        directory: Arc<dyn IntegrationDirectory>,
        leads: Arc<dyn LeadStore>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let ingestion = WebhookIngestion::new(Arc::clone(&directory), leads);
        Self {
            config,
            ingestion,
            directory,
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
///
/// The configuration must have passed [`ServiceConfig::validate`]; an
/// endpoint path that collides with a built-in route makes axum panic.
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;

    let webhook_routes = Router::new().route(
        &state.config.webhooks.endpoint_path,
        post(handle_webhook).fallback(handle_method_not_allowed),
    );

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let mut router = Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(middleware::from_fn(request_logging_middleware));

    if server.enable_compression {
        router = router.layer(CompressionLayer::new());
    }

    router
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                // The query string carries the webhook token.
                info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Serves until SIGINT or SIGTERM, then stops accepting connections and waits
/// up to `server.shutdown_timeout_seconds` for in-flight requests.
pub async fn start_server(
    config: ServiceConfig,
    directory: Arc<dyn IntegrationDirectory>,
    leads: Arc<dyn LeadStore>,
) -> Result<(), ServiceError> {
    config.validate()?;

    let metrics = ServiceMetrics::new()?;
    let state = AppState::new(config.clone(), directory, leads, metrics);
    let app = create_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(
        address = %address,
        webhook_path = %config.webhooks.endpoint_path,
        "Starting HTTP server"
    );

    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);
    let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(true);
        })
        .into_future();

    let drain_deadline = async move {
        if signalled_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "In-flight requests did not finish before the shutdown timeout"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle an inbound lead webhook
///
/// A malformed query string is treated like a missing token.
#[instrument(skip(state, query, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    let start = Instant::now();
    let token = query
        .ok()
        .and_then(|Query(mut params)| params.remove("token"));

    match state
        .ingestion
        .ingest(IngestionRequest::new(token, body))
        .await
    {
        Ok(outcome) => {
            state.metrics.record_lead_created(start.elapsed());
            Ok(Json(WebhookResponse::created(outcome.lead_id)))
        }
        Err(e) => {
            state.metrics.record_rejection(e.reason(), start.elapsed());
            Err(e.into())
        }
    }
}

/// Any method other than POST on the webhook path
async fn handle_method_not_allowed(State(state): State<AppState>) -> WebhookHandlerError {
    let error = IngestionError::MethodNotAllowed;
    state.metrics.count_rejection(error.reason());
    error.into()
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Liveness check; does not touch storage
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check: storage must answer
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match state.directory.check_health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                timestamp: Timestamp::now(),
                reason: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    timestamp: Timestamp::now(),
                    reason: Some(e.to_string()),
                }),
            )
        }
    }
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Extracts or generates `x-correlation-id`, echoes it on the response and
/// logs request completion at a level matching the status class.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    path = %request.uri().path(),
    correlation_id
))]
async fn request_logging_middleware(mut request: Request, next: middleware::Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
