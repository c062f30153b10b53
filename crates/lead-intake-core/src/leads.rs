//! # Lead Store
//!
//! Persistence of lead records. Webhook-originated leads always start in
//! [`LeadStatus::New`], carry the integration's platform tag as `source` and
//! are unassigned. Every insert creates a new record: redelivered payloads are
//! not deduplicated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::directory::StorageError;
use crate::normalize::LeadDraft;
use crate::{LeadId, ParseError, Timestamp};

/// Position of a lead in the sales pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    New,
    Contacted,
    Interested,
    Qualified,
    Lost,
    Converted,
}

impl LeadStatus {
    /// Get string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::Interested => "Interested",
            Self::Qualified => "Qualified",
            Self::Lost => "Lost",
            Self::Converted => "Converted",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Contacted" => Ok(Self::Contacted),
            "Interested" => Ok(Self::Interested),
            "Qualified" => Ok(Self::Qualified),
            "Lost" => Ok(Self::Lost),
            "Converted" => Ok(Self::Converted),
            _ => Err(ParseError::InvalidFormat {
                expected: "New, Contacted, Interested, Qualified, Lost, or Converted".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// A lead about to be inserted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub source: String,
    pub status: LeadStatus,
    pub assigned_to: Option<i64>,
}

impl NewLead {
    /// Build the record for a lead delivered through a webhook
    pub fn from_webhook(draft: LeadDraft, source: impl Into<String>) -> Self {
        let (name, email, phone) = draft.into_parts();
        Self {
            name,
            email,
            phone,
            source: source.into(),
            status: LeadStatus::New,
            assigned_to: None,
        }
    }

    /// Storage-boundary check, independent of payload normalization
    pub fn check_constraints(&self) -> Result<(), StorageError> {
        if self.name.is_empty() {
            return Err(StorageError::ConstraintViolation {
                message: "lead name must not be empty".to_string(),
            });
        }
        if self.phone.is_empty() {
            return Err(StorageError::ConstraintViolation {
                message: "lead phone must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// A stored lead
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub source: String,
    pub status: LeadStatus,
    pub assigned_to: Option<i64>,
    pub created_at: Timestamp,
}

/// Persistent lead records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Insert a new lead; always creates a new record
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConstraintViolation`] when name or phone is empty.
    async fn insert(&self, lead: NewLead) -> Result<LeadId, StorageError>;

    /// Get a lead by identifier
    async fn get(&self, id: LeadId) -> Result<Option<Lead>, StorageError>;

    /// Most recently created leads, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<Lead>, StorageError>;

    /// Total number of stored leads
    async fn count(&self) -> Result<u64, StorageError>;
}

#[cfg(test)]
#[path = "leads_tests.rs"]
mod tests;
