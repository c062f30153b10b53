//! Response bodies for the HTTP API.

use lead_intake_core::{LeadId, Timestamp};
use serde::{Deserialize, Serialize};

/// Body returned when a lead was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub lead_id: LeadId,
    pub message: String,
}

impl WebhookResponse {
    pub fn created(lead_id: LeadId) -> Self {
        Self {
            success: true,
            lead_id,
            message: "Lead created successfully".to_string(),
        }
    }
}

/// Body of every failed webhook call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: Timestamp,
    /// Storage failure detail when not ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
