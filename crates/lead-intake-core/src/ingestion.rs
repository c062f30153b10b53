//! # Webhook Ingestion
//!
//! Orchestrates a single inbound webhook delivery:
//!
//! ```text
//! token check -> body parse -> integration lookup -> normalize -> insert lead -> record usage
//! ```
//!
//! Each step either advances or terminates the request with an
//! [`IngestionError`] that carries the exact client-facing message and status
//! code. The controller holds no per-request state, so concurrent deliveries
//! (including duplicate deliveries of the same payload) are independent.
//!
//! The lead insert and the usage update are two separate writes. A failure
//! between them leaves a stored lead whose integration counter is one behind;
//! that is accepted and not compensated.

use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::directory::{Integration, IntegrationDirectory, StorageError};
use crate::leads::{LeadStore, NewLead};
use crate::normalize::{normalize_tagged, NormalizationError};
use crate::{ErrorCategory, IntegrationId, LeadId};

// ============================================================================
// Request / Outcome
// ============================================================================

/// Raw inputs of one webhook delivery
#[derive(Clone)]
pub struct IngestionRequest {
    /// Value of the `token` query parameter, if present
    pub token: Option<String>,
    /// Raw request body
    pub body: Bytes,
}

impl IngestionRequest {
    pub fn new(token: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            token,
            body: body.into(),
        }
    }
}

impl fmt::Debug for IngestionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionRequest")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Result of a successful ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionOutcome {
    pub lead_id: LeadId,
    pub integration_id: IntegrationId,
}

// ============================================================================
// Errors
// ============================================================================

/// Terminal failures of an ingestion attempt
///
/// None of these are retried by the pipeline itself; redelivery is up to the
/// calling platform.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Webhook token is required")]
    MissingToken,

    #[error("Invalid JSON payload")]
    InvalidPayload,

    #[error("Invalid webhook token")]
    UnknownToken,

    #[error("Failed to parse lead data: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Database error: {0}")]
    Storage(#[from] StorageError),
}

impl IngestionError {
    /// HTTP status code for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MethodNotAllowed => 405,
            Self::MissingToken => 400,
            Self::InvalidPayload => 400,
            Self::UnknownToken => 404,
            Self::Normalization(_) => 400,
            Self::Storage(_) => 500,
        }
    }

    /// Message returned in the `error` field of the response body
    pub fn client_message(&self) -> String {
        match self {
            Self::Normalization(_) => "Failed to parse lead data".to_string(),
            other => other.to_string(),
        }
    }

    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "method_not_allowed",
            Self::MissingToken => "missing_token",
            Self::InvalidPayload => "invalid_payload",
            Self::UnknownToken => "unknown_token",
            Self::Normalization(_) => "normalization",
            Self::Storage(_) => "storage",
        }
    }

    /// Whether a redelivery of the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::UnknownToken => ErrorCategory::Security,
            Self::Storage(e) if e.is_transient() => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Webhook ingestion controller
#[derive(Clone)]
pub struct WebhookIngestion {
    directory: Arc<dyn IntegrationDirectory>,
    leads: Arc<dyn LeadStore>,
}

impl WebhookIngestion {
    pub fn new(directory: Arc<dyn IntegrationDirectory>, leads: Arc<dyn LeadStore>) -> Self {
        Self { directory, leads }
    }

    /// Process one delivery end to end
    ///
    /// # Errors
    ///
    /// Returns the [`IngestionError`] of the first step that fails. When the
    /// error is raised before the insert step no lead is stored and no
    /// counter is touched.
    #[instrument(skip(self, request), fields(body_len = request.body.len()))]
    pub async fn ingest(
        &self,
        request: IngestionRequest,
    ) -> Result<IngestionOutcome, IngestionError> {
        let token = Self::require_token(request.token.as_deref())?;
        let payload = Self::parse_body(&request.body)?;

        let integration = self.authenticate(token).await?;

        let draft = normalize_tagged(&integration.platform, &payload).inspect_err(|e| {
            info!(
                integration_id = %integration.id,
                reason = %e,
                "Lead data rejected"
            );
        })?;

        let lead = NewLead::from_webhook(draft, integration.platform.clone());
        let lead_id = self.leads.insert(lead).await.inspect_err(|e| {
            warn!(integration_id = %integration.id, error = %e, "Lead insert failed");
        })?;

        // The lead is durable from here on; a usage failure still fails the request.
        self.directory
            .record_usage(integration.id)
            .await
            .inspect_err(|e| {
                warn!(
                    integration_id = %integration.id,
                    lead_id = %lead_id,
                    error = %e,
                    "Lead stored but usage update failed"
                );
            })?;

        info!(
            integration_id = %integration.id,
            lead_id = %lead_id,
            platform = %integration.platform,
            "Lead created from webhook"
        );

        Ok(IngestionOutcome {
            lead_id,
            integration_id: integration.id,
        })
    }

    fn require_token(token: Option<&str>) -> Result<&str, IngestionError> {
        match token {
            Some(t) if !t.is_empty() => Ok(t),
            _ => {
                debug!("Webhook call without token");
                Err(IngestionError::MissingToken)
            }
        }
    }

    /// Malformed JSON, non-objects and empty objects are all the same failure
    fn parse_body(body: &[u8]) -> Result<Value, IngestionError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            debug!(error = %e, "Webhook body is not valid JSON");
            IngestionError::InvalidPayload
        })?;

        match value.as_object() {
            Some(map) if !map.is_empty() => Ok(value),
            _ => {
                debug!("Webhook body is not a non-empty JSON object");
                Err(IngestionError::InvalidPayload)
            }
        }
    }

    async fn authenticate(&self, token: &str) -> Result<Integration, IngestionError> {
        match self.directory.find_active_by_token(token).await {
            Ok(Some(integration)) => {
                debug!(integration_id = %integration.id, "Webhook token accepted");
                Ok(integration)
            }
            Ok(None) => {
                info!("Webhook token did not match an active integration");
                Err(IngestionError::UnknownToken)
            }
            Err(e) => {
                warn!(error = %e, "Integration lookup failed");
                Err(IngestionError::Storage(e))
            }
        }
    }
}

#[cfg(test)]
#[path = "ingestion_tests.rs"]
mod tests;
