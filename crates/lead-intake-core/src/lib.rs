//! # Lead-Intake Core
//!
//! Core business logic for the lead ingestion pipeline.
//!
//! Third-party lead sources (Google Ads lead forms, Facebook Lead Ads and custom
//! webhooks) push leads to a single webhook endpoint. Each call is authenticated
//! by an opaque per-integration token, the platform-specific payload is
//! normalized into a canonical [`normalize::LeadDraft`], and the draft is stored
//! as a new lead before the integration's usage counters are bumped.
//!
//! ## Architecture
//!
//! - [`normalize`] holds pure payload mapping functions (no I/O)
//! - [`directory`] and [`leads`] define the storage traits the pipeline needs
//! - [`ingestion`] orchestrates a single webhook delivery end to end
//! - [`adapters`] provides in-memory and SQLite implementations of the traits
//!
//! ## Usage
//!
//! ```rust
//! use lead_intake_core::normalize::{normalize, Platform};
//!
//! let payload = serde_json::json!({"name": "Ann Lee", "phone": "555-1212"});
//! let draft = normalize(Platform::Custom, &payload).unwrap();
//! assert_eq!(draft.name(), "Ann Lee");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Standard result type for lead-intake operations
pub type LeadIntakeResult<T> = Result<T, LeadIntakeError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Storage-assigned identifier of a registered integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntegrationId(i64);

impl IntegrationId {
    /// Wrap a raw storage identifier
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IntegrationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<i64>().map_err(|_| ParseError::InvalidFormat {
            expected: "integer".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self::new(id))
    }
}

/// Storage-assigned identifier of a lead record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(i64);

impl LeadId {
    /// Wrap a raw storage identifier
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LeadId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<i64>().map_err(|_| ParseError::InvalidFormat {
            expected: "integer".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self::new(id))
    }
}

/// Bearer secret that authenticates webhook calls for one integration
///
/// The token travels in the `token` query parameter of the webhook URL, so it
/// is the only credential an ad platform needs. The value is wiped from memory
/// on drop and never printed through `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WebhookToken(String);

impl WebhookToken {
    /// Number of random bytes behind a generated token
    pub const ENTROPY_BYTES: usize = 32;

    /// Generate a fresh token from 256 bits of OS-seeded randomness
    ///
    /// The result is hex encoded, giving a 64 character lowercase string.
    pub fn generate() -> Self {
        use rand::RngCore;

        let mut bytes = [0u8; Self::ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        bytes.zeroize();
        Self(token)
    }

    /// Wrap an existing token value (e.g. one read back from storage)
    pub fn from_existing(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "webhook_token".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Expose the secret value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a presented token
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl fmt::Debug for WebhookToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookToken(<REDACTED>)")
    }
}

impl PartialEq for WebhookToken {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.expose())
    }
}

impl Eq for WebhookToken {}

impl Serialize for WebhookToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WebhookToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_existing(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that may succeed when the caller redelivers
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Authentication failures
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Top-level error type for lead-intake operations
#[derive(Debug, thiserror::Error)]
pub enum LeadIntakeError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] directory::StorageError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl LeadIntakeError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Validation(_) => false,
            Self::Parse(_) => false,
            Self::Configuration { .. } => false,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Permanent,
            Self::Parse(_) => ErrorCategory::Permanent,
            Self::Storage(e) if e.is_transient() => ErrorCategory::Transient,
            Self::Storage(_) => ErrorCategory::Permanent,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Platform payload normalization
pub mod normalize;

/// Integration directory (token lookup and usage statistics)
pub mod directory;

/// Lead storage
pub mod leads;

/// Webhook ingestion pipeline
pub mod ingestion;

/// Storage adapters
pub mod adapters;

pub use adapters::{InMemoryIntegrationDirectory, InMemoryLeadStore, SqliteStore};
pub use directory::{
    Integration, IntegrationDirectory, IntegrationStatus, NewIntegration, StorageError,
};
pub use ingestion::{IngestionError, IngestionOutcome, IngestionRequest, WebhookIngestion};
pub use leads::{Lead, LeadStatus, LeadStore, NewLead};
pub use normalize::{normalize, normalize_tagged, LeadDraft, NormalizationError, Platform};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
