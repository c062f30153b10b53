//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use lead_intake_core::IngestionError;
use tracing::{debug, error, warn};

use crate::responses::ErrorResponse;

/// Webhook handler errors with HTTP status code mapping
///
/// The response body is always `{"error": "<message>"}`:
///
/// - `400 Bad Request`: missing token, invalid JSON, unmappable lead data
/// - `404 Not Found`: token unknown or integration inactive
/// - `405 Method Not Allowed`: anything but POST
/// - `500 Internal Server Error`: storage failures, with the storage detail
///
/// Platforms redeliver on non-2xx responses, so no `Retry-After` hint is sent.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
}

impl WebhookHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Ingestion(e) => StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let Self::Ingestion(ref e) = self;

        if status.is_server_error() {
            error!(error = %e, category = ?e.error_category(), "Webhook failed");
        } else if matches!(e, IngestionError::UnknownToken) {
            warn!(status = %status, "Webhook rejected");
        } else {
            debug!(status = %status, reason = e.reason(), "Webhook rejected");
        }

        let body = ErrorResponse {
            error: e.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Metrics initialization failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}
