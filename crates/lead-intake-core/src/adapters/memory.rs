//! # In-Memory Storage
//!
//! Thread-safe in-memory directory and lead store for tests and ephemeral
//! runs. Nothing survives a restart.
//!
//! Both stores accept an injected failure per operation so callers can
//! exercise storage error paths without a real database.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::directory::{
    Integration, IntegrationDirectory, IntegrationStatus, NewIntegration, StorageError,
};
use crate::leads::{Lead, LeadStore, NewLead};
use crate::{IntegrationId, LeadId, Timestamp, WebhookToken};

// ============================================================================
// Integration Directory
// ============================================================================

#[derive(Default)]
struct DirectoryState {
    integrations: BTreeMap<IntegrationId, Integration>,
    last_id: i64,
    lookup_failure: Option<StorageError>,
    usage_failure: Option<StorageError>,
}

impl DirectoryState {
    fn add(
        &mut self,
        name: &str,
        platform: &str,
        token: WebhookToken,
        status: IntegrationStatus,
    ) -> Integration {
        self.last_id += 1;
        let integration = Integration {
            id: IntegrationId::new(self.last_id),
            name: name.to_string(),
            platform: platform.to_string(),
            webhook_token: token,
            status,
            leads_received: 0,
            last_used_at: None,
            created_at: Timestamp::now(),
        };
        self.integrations
            .insert(integration.id, integration.clone());
        integration
    }
}

/// In-memory integration directory
#[derive(Clone, Default)]
pub struct InMemoryIntegrationDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryIntegrationDirectory {
    /// Create new empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an integration with a caller-chosen token and raw platform tag
    ///
    /// Bypasses [`NewIntegration`] validation so that fixtures can hold tags
    /// the normalizer does not know.
    pub async fn insert_with_token(
        &self,
        name: &str,
        platform: &str,
        token: WebhookToken,
        status: IntegrationStatus,
    ) -> Integration {
        let mut state = self.state.write().await;
        state.add(name, platform, token, status)
    }

    /// Make every subsequent token lookup fail with `error`
    pub async fn fail_lookups_with(&self, error: StorageError) {
        self.state.write().await.lookup_failure = Some(error);
    }

    /// Make every subsequent usage update fail with `error`
    pub async fn fail_usage_with(&self, error: StorageError) {
        self.state.write().await.usage_failure = Some(error);
    }

    /// Remove injected failures
    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.lookup_failure = None;
        state.usage_failure = None;
    }
}

#[async_trait]
impl IntegrationDirectory for InMemoryIntegrationDirectory {
    async fn find_active_by_token(&self, token: &str) -> Result<Option<Integration>, StorageError> {
        let state = self.state.read().await;
        if let Some(error) = &state.lookup_failure {
            return Err(error.clone());
        }

        Ok(state
            .integrations
            .values()
            .find(|i| i.is_active() && i.webhook_token.matches(token))
            .cloned())
    }

    async fn record_usage(&self, id: IntegrationId) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if let Some(error) = &state.usage_failure {
            return Err(error.clone());
        }

        let integration =
            state
                .integrations
                .get_mut(&id)
                .ok_or_else(|| StorageError::NotFound {
                    resource: "integration".to_string(),
                    id: id.to_string(),
                })?;
        integration.leads_received += 1;
        integration.last_used_at = Some(Timestamp::now());
        Ok(())
    }

    async fn create(&self, request: NewIntegration) -> Result<Integration, StorageError> {
        let mut state = self.state.write().await;
        let mut token = WebhookToken::generate();
        while state
            .integrations
            .values()
            .any(|i| i.webhook_token == token)
        {
            token = WebhookToken::generate();
        }

        Ok(state.add(
            request.name(),
            request.platform().as_str(),
            token,
            IntegrationStatus::Active,
        ))
    }

    async fn get(&self, id: IntegrationId) -> Result<Option<Integration>, StorageError> {
        Ok(self.state.read().await.integrations.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Integration>, StorageError> {
        let state = self.state.read().await;
        let mut integrations: Vec<Integration> = state.integrations.values().cloned().collect();
        integrations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(integrations)
    }

    async fn set_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
    ) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        match state.integrations.get_mut(&id) {
            Some(integration) => {
                integration.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: IntegrationId) -> Result<bool, StorageError> {
        Ok(self.state.write().await.integrations.remove(&id).is_some())
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        match &self.state.read().await.lookup_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Lead Store
// ============================================================================

#[derive(Default)]
struct LeadState {
    leads: Vec<Lead>,
    last_id: i64,
    insert_failure: Option<StorageError>,
}

/// In-memory lead store
#[derive(Clone, Default)]
pub struct InMemoryLeadStore {
    state: Arc<RwLock<LeadState>>,
}

impl InMemoryLeadStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail with `error`
    pub async fn fail_inserts_with(&self, error: StorageError) {
        self.state.write().await.insert_failure = Some(error);
    }

    /// Remove injected failures
    pub async fn clear_failures(&self) {
        self.state.write().await.insert_failure = None;
    }

    /// All stored leads in insertion order
    pub async fn all(&self) -> Vec<Lead> {
        self.state.read().await.leads.clone()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn insert(&self, lead: NewLead) -> Result<LeadId, StorageError> {
        let mut state = self.state.write().await;
        if let Some(error) = &state.insert_failure {
            return Err(error.clone());
        }
        lead.check_constraints()?;

        state.last_id += 1;
        let id = LeadId::new(state.last_id);
        state.leads.push(Lead {
            id,
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            source: lead.source,
            status: lead.status,
            assigned_to: lead.assigned_to,
            created_at: Timestamp::now(),
        });
        Ok(id)
    }

    async fn get(&self, id: LeadId) -> Result<Option<Lead>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .leads
            .iter()
            .find(|l| l.id == id)
            .cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Lead>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .leads
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.state.read().await.leads.len() as u64)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
