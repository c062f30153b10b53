//! Common test utilities for lead-intake integration tests
//!
//! This module provides:
//! - A harness that drives the full router with `tower::ServiceExt::oneshot`
//! - Constructors for in-memory and SQLite-backed harnesses
//! - Payload builders for each platform

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use lead_intake_api::{create_router, AppState, ServiceConfig, ServiceMetrics};
use lead_intake_core::{
    InMemoryIntegrationDirectory, InMemoryLeadStore, Integration, IntegrationDirectory,
    IntegrationId, Lead, LeadStore, NewIntegration, Platform, SqliteStore,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

// ============================================================================
// Harness
// ============================================================================

/// Router plus direct handles on the stores behind it
#[derive(Clone)]
#[allow(dead_code)]
pub struct TestHarness {
    pub router: Router,
    pub directory: Arc<dyn IntegrationDirectory>,
    pub leads: Arc<dyn LeadStore>,
}

/// Response status with the decoded JSON body
#[derive(Debug)]
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn new(directory: Arc<dyn IntegrationDirectory>, leads: Arc<dyn LeadStore>) -> Self {
        let metrics = ServiceMetrics::new().expect("metrics registry");
        let state = AppState::new(
            ServiceConfig::default(),
            Arc::clone(&directory),
            Arc::clone(&leads),
            metrics,
        );
        Self {
            router: create_router(state),
            directory,
            leads,
        }
    }

    /// Register an active integration for `platform`
    pub async fn register(&self, platform: Platform) -> Integration {
        let request = NewIntegration::new(format!("{platform} campaign"), platform).unwrap();
        self.directory.create(request).await.unwrap()
    }

    /// POST `body` to the webhook endpoint
    pub async fn post(&self, token: Option<&str>, body: &str) -> TestResponse {
        let uri = match token {
            Some(token) => format!("/api/webhook?token={token}"),
            None => "/api/webhook".to_string(),
        };
        self.send(Method::POST, &uri, body.to_string()).await
    }

    /// Send an arbitrary request and decode the JSON response
    pub async fn send(&self, method: Method, uri: &str, body: String) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Current state of an integration
    pub async fn integration(&self, id: IntegrationId) -> Integration {
        self.directory.get(id).await.unwrap().unwrap()
    }

    pub async fn lead_count(&self) -> u64 {
        self.leads.count().await.unwrap()
    }

    /// Lead created by a successful response
    pub async fn created_lead(&self, response: &TestResponse) -> Lead {
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        let id = response.body["lead_id"].as_i64().unwrap();
        self.leads
            .get(lead_intake_core::LeadId::new(id))
            .await
            .unwrap()
            .unwrap()
    }
}

/// Harness over the in-memory adapters, with their failure hooks exposed
#[allow(dead_code)]
pub fn memory_harness() -> (TestHarness, InMemoryIntegrationDirectory, InMemoryLeadStore) {
    let directory = InMemoryIntegrationDirectory::new();
    let leads = InMemoryLeadStore::new();
    let harness = TestHarness::new(Arc::new(directory.clone()), Arc::new(leads.clone()));
    (harness, directory, leads)
}

/// Harness over one SQLite file inside `dir`
#[allow(dead_code)]
pub fn sqlite_harness(dir: &tempfile::TempDir) -> TestHarness {
    let store = SqliteStore::open(dir.path().join("leads.db")).unwrap();
    TestHarness::new(Arc::new(store.clone()), Arc::new(store))
}

// ============================================================================
// Payload Builders
// ============================================================================

/// Google Ads lead form export with `form_data` entries
#[allow(dead_code)]
pub fn google_form(entries: &[(&str, &str)]) -> Value {
    let form_data: Vec<Value> = entries
        .iter()
        .map(|(key, value)| serde_json::json!({"key": key, "value": value}))
        .collect();
    serde_json::json!({ "form_data": form_data })
}

/// Facebook lead form export with `field_data` entries
#[allow(dead_code)]
pub fn facebook_form(entries: &[(&str, Vec<&str>)]) -> Value {
    let field_data: Vec<Value> = entries
        .iter()
        .map(|(name, values)| serde_json::json!({"name": name, "values": values}))
        .collect();
    serde_json::json!({ "field_data": field_data })
}
