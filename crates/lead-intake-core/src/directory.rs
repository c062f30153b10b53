//! # Integration Directory
//!
//! Registered inbound channels, one per external lead source. Each integration
//! carries the webhook token that authenticates its deliveries and the usage
//! statistics the pipeline updates after every stored lead.
//!
//! Lookup by token is the only authentication the webhook path has, so an
//! inactive integration must be indistinguishable from an unknown token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::normalize::Platform;
use crate::{IntegrationId, ParseError, Timestamp, ValidationError, WebhookToken};

/// Longest accepted integration display name
pub const MAX_INTEGRATION_NAME_LENGTH: usize = 255;

// ============================================================================
// Types
// ============================================================================

/// Whether an integration accepts webhook traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Active,
    Inactive,
}

impl IntegrationStatus {
    /// Get string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(ParseError::InvalidFormat {
                expected: "active or inactive".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// A registered lead source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub name: String,
    /// Platform tag as stored; also copied into the `source` of every lead
    pub platform: String,
    pub webhook_token: WebhookToken,
    pub status: IntegrationStatus,
    pub leads_received: u64,
    pub last_used_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Integration {
    /// Check whether webhook deliveries are accepted
    pub fn is_active(&self) -> bool {
        self.status == IntegrationStatus::Active
    }

    /// The webhook URL a platform should be configured with
    ///
    /// `endpoint` is the absolute URL of the webhook route, without query.
    pub fn webhook_url(&self, endpoint: &str) -> String {
        format!("{}?token={}", endpoint, self.webhook_token.expose())
    }
}

/// Validated request to register a new integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIntegration {
    name: String,
    platform: Platform,
}

impl NewIntegration {
    /// Create a registration request
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the name is blank or too long.
    pub fn new(name: impl Into<String>, platform: Platform) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();

        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            });
        }

        if name.chars().count() > MAX_INTEGRATION_NAME_LENGTH {
            return Err(ValidationError::TooLong {
                field: "name".to_string(),
                max_length: MAX_INTEGRATION_NAME_LENGTH,
            });
        }

        Ok(Self { name, platform })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the persistence layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage operation failed: {message}")]
    OperationFailed { message: String },

    #[error("Storage not available: {message}")]
    Unavailable { message: String },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    #[error("Stored data is corrupt: {message}")]
    Corrupt { message: String },
}

impl StorageError {
    /// Check if storage error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::OperationFailed { .. } => true,
            Self::Unavailable { .. } => true,
            Self::ConstraintViolation { .. } => false,
            Self::NotFound { .. } => false,
            Self::Corrupt { .. } => false,
        }
    }
}

// ============================================================================
// Core Operations (Traits)
// ============================================================================

/// Persistent registry of integrations
///
/// Implementations must make [`record_usage`](Self::record_usage) atomic with
/// respect to concurrent calls for the same integration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntegrationDirectory: Send + Sync {
    /// Find the active integration owning `token`
    ///
    /// Returns `Ok(None)` both for unknown tokens and for tokens of inactive
    /// integrations.
    async fn find_active_by_token(&self, token: &str) -> Result<Option<Integration>, StorageError>;

    /// Increment `leads_received` by one and set `last_used_at` to now
    async fn record_usage(&self, id: IntegrationId) -> Result<(), StorageError>;

    /// Register a new integration with a freshly generated token
    async fn create(&self, request: NewIntegration) -> Result<Integration, StorageError>;

    /// Get an integration by identifier
    async fn get(&self, id: IntegrationId) -> Result<Option<Integration>, StorageError>;

    /// List all integrations, newest first
    async fn list(&self) -> Result<Vec<Integration>, StorageError>;

    /// Change the status; returns `false` when the integration does not exist
    async fn set_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
    ) -> Result<bool, StorageError>;

    /// Remove an integration; returns `false` when it does not exist
    async fn delete(&self, id: IntegrationId) -> Result<bool, StorageError>;

    /// Probe the backing store for readiness checks
    async fn check_health(&self) -> Result<(), StorageError>;
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
