//! # Storage Adapters
//!
//! Implementations of [`IntegrationDirectory`](crate::directory::IntegrationDirectory)
//! and [`LeadStore`](crate::leads::LeadStore).

pub mod memory;
pub mod sqlite;

pub use memory::{InMemoryIntegrationDirectory, InMemoryLeadStore};
pub use sqlite::SqliteStore;
