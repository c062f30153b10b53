//! Integration tests for the webhook wire contract
//!
//! Status codes and exact JSON bodies for every outcome of a delivery.

mod common;

use axum::http::{Method, StatusCode};
use common::memory_harness;
use lead_intake_core::{IntegrationDirectory, IntegrationStatus, Platform, StorageError};
use serde_json::json;

fn lead_body() -> String {
    json!({"name": "Jane Doe", "phone": "+1 555 0100", "email": "jane@example.com"}).to_string()
}

#[tokio::test]
async fn test_success_body_is_exact() {
    let (harness, _, _) = memory_harness();
    let integration = harness.register(Platform::Custom).await;

    let response = harness
        .post(Some(integration.webhook_token.expose()), &lead_body())
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({"success": true, "lead_id": 1, "message": "Lead created successfully"})
    );

    let lead = harness.created_lead(&response).await;
    assert_eq!(lead.status.as_str(), "New");
    assert_eq!(lead.assigned_to, None);
}

#[tokio::test]
async fn test_get_is_405_regardless_of_token() {
    let (harness, _, _) = memory_harness();
    let integration = harness.register(Platform::Custom).await;
    let valid = format!("/api/webhook?token={}", integration.webhook_token.expose());

    for uri in [valid.as_str(), "/api/webhook?token=unknown", "/api/webhook"] {
        let response = harness.send(Method::GET, uri, String::new()).await;

        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED, "{uri}");
        assert_eq!(response.body, json!({"error": "Method not allowed"}));
    }

    assert_eq!(harness.lead_count().await, 0);
    assert_eq!(harness.integration(integration.id).await.leads_received, 0);
}

#[tokio::test]
async fn test_other_methods_are_405() {
    let (harness, _, _) = memory_harness();
    let integration = harness.register(Platform::Custom).await;
    let uri = format!("/api/webhook?token={}", integration.webhook_token.expose());

    for method in [Method::PUT, Method::DELETE, Method::PATCH] {
        let response = harness.send(method.clone(), &uri, lead_body()).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
    }

    assert_eq!(harness.lead_count().await, 0);
}

#[tokio::test]
async fn test_missing_token_is_400() {
    let (harness, _, _) = memory_harness();

    let response = harness.post(None, &lead_body()).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"error": "Webhook token is required"}));
}

#[tokio::test]
async fn test_token_is_checked_before_body() {
    let (harness, _, _) = memory_harness();

    let response = harness.post(None, "definitely not json").await;

    assert_eq!(response.body, json!({"error": "Webhook token is required"}));
}

#[tokio::test]
async fn test_invalid_bodies_are_400_before_token_lookup() {
    let (harness, _, _) = memory_harness();

    for body in ["", "not json", "[]", "{}", "null", "false", "42"] {
        let response = harness.post(Some("unknown-token"), body).await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{body:?}");
        assert_eq!(response.body, json!({"error": "Invalid JSON payload"}));
    }
}

#[tokio::test]
async fn test_inactive_token_is_indistinguishable_from_unknown() {
    let (harness, _, _) = memory_harness();
    let integration = harness.register(Platform::Custom).await;
    harness
        .directory
        .set_status(integration.id, IntegrationStatus::Inactive)
        .await
        .unwrap();

    let inactive = harness
        .post(Some(integration.webhook_token.expose()), &lead_body())
        .await;
    let unknown = harness.post(Some("never-issued"), &lead_body()).await;

    assert_eq!(inactive.status, StatusCode::NOT_FOUND);
    assert_eq!(inactive.body, json!({"error": "Invalid webhook token"}));
    assert_eq!(inactive.status, unknown.status);
    assert_eq!(inactive.body, unknown.body);
    assert_eq!(harness.lead_count().await, 0);
}

#[tokio::test]
async fn test_reactivated_token_is_accepted_on_next_request() {
    let (harness, _, _) = memory_harness();
    let integration = harness.register(Platform::Custom).await;
    let token = integration.webhook_token.expose();

    harness
        .directory
        .set_status(integration.id, IntegrationStatus::Inactive)
        .await
        .unwrap();
    assert_eq!(
        harness.post(Some(token), &lead_body()).await.status,
        StatusCode::NOT_FOUND
    );

    harness
        .directory
        .set_status(integration.id, IntegrationStatus::Active)
        .await
        .unwrap();
    assert_eq!(
        harness.post(Some(token), &lead_body()).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_deleted_integration_token_stops_working() {
    let (harness, _, _) = memory_harness();
    let integration = harness.register(Platform::Custom).await;

    assert!(harness.directory.delete(integration.id).await.unwrap());

    let response = harness
        .post(Some(integration.webhook_token.expose()), &lead_body())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lookup_failure_is_500_with_detail() {
    let (harness, directory, _) = memory_harness();
    directory
        .fail_lookups_with(StorageError::Unavailable {
            message: "connection refused".to_string(),
        })
        .await;

    let response = harness.post(Some("any-token"), &lead_body()).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({"error": "Database error: Storage not available: connection refused"})
    );
}

#[tokio::test]
async fn test_insert_failure_is_500_and_leaves_counter_untouched() {
    let (harness, _, leads) = memory_harness();
    let integration = harness.register(Platform::Custom).await;
    leads
        .fail_inserts_with(StorageError::OperationFailed {
            message: "disk I/O error".to_string(),
        })
        .await;

    let response = harness
        .post(Some(integration.webhook_token.expose()), &lead_body())
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .starts_with("Database error: "));
    let after = harness.integration(integration.id).await;
    assert_eq!(after.leads_received, 0);
    assert!(after.last_used_at.is_none());
}

#[tokio::test]
async fn test_usage_failure_is_500_but_lead_is_kept() {
    let (harness, directory, _) = memory_harness();
    let integration = harness.register(Platform::Custom).await;
    directory
        .fail_usage_with(StorageError::OperationFailed {
            message: "counter update failed".to_string(),
        })
        .await;

    let response = harness
        .post(Some(integration.webhook_token.expose()), &lead_body())
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.lead_count().await, 1);
    assert_eq!(harness.integration(integration.id).await.leads_received, 0);
}
