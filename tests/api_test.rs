use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use rentdesk_core::adapters::{InMemoryLedgerStore, InMemoryTenantDirectory};
use rentdesk_core::domain::{Obligation, ObligationLabel};
use rentdesk_core::ports::{FixedClock, TenantProfile};
use rentdesk_core::services::Ledger;
use rentdesk_core::{create_app, AppState};

const VERIFIER_KEY: &str = "test-verifier-key";

struct TestApp {
    app: Router,
    store: InMemoryLedgerStore,
    tenant: TenantProfile,
}

async fn setup_test_app() -> TestApp {
    let store = InMemoryLedgerStore::new();
    let directory = InMemoryTenantDirectory::new();
    let tenant = TenantProfile {
        tenant_id: Uuid::new_v4(),
        unit_id: Uuid::new_v4(),
        move_in_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        monthly_rent: BigDecimal::from(5000),
        billing_day: 10,
    };
    directory.insert(tenant.clone()).await;

    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap(),
    ));
    let ledger = Ledger::new(
        Arc::new(store.clone()),
        Arc::new(directory),
        clock,
        Duration::from_secs(30),
    );

    let mut keys = HashMap::new();
    keys.insert(VERIFIER_KEY.to_string(), "alice".to_string());

    TestApp {
        app: create_app(AppState::new(ledger, keys)),
        store,
        tenant,
    }
}

async fn seed_rent(t: &TestApp, total: i64, due: NaiveDate) -> Obligation {
    let obligation = Obligation {
        id: Uuid::new_v4(),
        tenant_id: t.tenant.tenant_id,
        unit_id: t.tenant.unit_id,
        label: ObligationLabel::Rent,
        total_amount: BigDecimal::from(total),
        amount_paid: BigDecimal::from(0),
        due_date: due,
        fully_paid_at: None,
        notes: None,
        created_at: Utc::now(),
    };
    t.store.seed_obligation(obligation.clone()).await;
    obligation
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, key: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_connected_store() {
    let t = setup_test_app().await;
    let (status, body) = send(&t.app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["db"], "connected");
}

#[tokio::test]
async fn test_submit_and_verify_flow() {
    let t = setup_test_app().await;
    let rent = seed_rent(&t, 5000, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()).await;

    let submit = json!({ "tenant_id": t.tenant.tenant_id, "transaction_id": "MPESA-001" });
    let (status, _) = send(&t.app, "POST", "/payments/submit", Some(submit.clone()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&t.app, "POST", "/payments/submit", Some(submit), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(t.store.transaction_count().await, 1);

    let (status, body) = send(&t.app, "GET", "/payments/pending", None, Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "pending");

    let verify = json!({ "transaction_id": "MPESA-001", "amount": "5000.00" });
    let (status, body) = send(&t.app, "POST", "/payments/verify", Some(verify.clone()), Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&t.app, "GET", "/payments/MPESA-001", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "verified");
    assert_eq!(body["verified_by"], "alice");
    assert_eq!(body["obligation_id"], rent.id.to_string());

    let (status, body) = send(&t.app, "POST", "/payments/verify", Some(verify), Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("already verified"));

    let uri = format!("/tenants/{}/obligations", t.tenant.tenant_id);
    let (status, body) = send(&t.app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    let obligations = body.as_array().unwrap();
    assert_eq!(obligations.len(), 2);
    assert_eq!(obligations[0]["is_fully_paid"], true);
    assert_eq!(obligations[1]["due_date"], "2025-02-10");
}

#[tokio::test]
async fn test_verifier_routes_require_a_known_key() {
    let t = setup_test_app().await;
    let verify = json!({ "transaction_id": "X", "amount": 10 });

    let (status, body) = send(&t.app, "POST", "/payments/verify", Some(verify.clone()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&t.app, "POST", "/payments/verify", Some(verify), Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.app, "GET", "/dashboard/summary", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_requests_are_bad_requests() {
    let t = setup_test_app().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/payments/submit",
        Some(json!({ "tenant_id": t.tenant.tenant_id, "transaction_id": "" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = send(&t.app, "POST", "/payments/submit", Some(json!({ "foo": 1 })), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = json!({ "tenant_id": Uuid::new_v4(), "transaction_id": "BANK-0" });
    let (status, _) = send(&t.app, "POST", "/payments/submit", Some(unknown), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    seed_rent(&t, 5000, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()).await;
    let submit = json!({ "tenant_id": t.tenant.tenant_id, "transaction_id": "BANK-9" });
    send(&t.app, "POST", "/payments/submit", Some(submit), None).await;

    let (status, _) = send(
        &t.app,
        "POST",
        "/payments/verify",
        Some(json!({ "transaction_id": "BANK-9", "amount": "-5" })),
        Some(VERIFIER_KEY),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reject_flow() {
    let t = setup_test_app().await;
    seed_rent(&t, 5000, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()).await;
    let submit = json!({ "tenant_id": t.tenant.tenant_id, "transaction_id": "BANK-1" });
    send(&t.app, "POST", "/payments/submit", Some(submit), None).await;

    let reject = json!({ "transaction_id": "BANK-1" });
    let (status, body) = send(&t.app, "POST", "/payments/reject", Some(reject.clone()), Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&t.app, "POST", "/payments/reject", Some(reject), Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, "GET", "/payments/BANK-1", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_custom_obligation_and_first_cycle() {
    let t = setup_test_app().await;

    let uri = format!("/tenants/{}/first-cycle", t.tenant.tenant_id);
    let (status, body) = send(&t.app, "POST", &uri, None, Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], true);
    assert_eq!(body["obligation"]["due_date"], "2025-01-10");

    let (status, body) = send(&t.app, "POST", &uri, None, Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);

    let create = json!({
        "tenant_id": t.tenant.tenant_id,
        "unit_id": t.tenant.unit_id,
        "label": "power_bill",
        "amount": "120.40",
        "due_date": "2025-01-25",
        "notes": "December usage"
    });
    let (status, body) = send(&t.app, "POST", "/obligations", Some(create.clone()), Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["payment"]["label"], "power_bill");
    assert_eq!(
        BigDecimal::from_str(body["payment"]["total_amount"].as_str().unwrap()).unwrap(),
        BigDecimal::from_str("120.40").unwrap()
    );

    let mut rent = create;
    rent["label"] = json!("rent");
    let (status, _) = send(&t.app, "POST", "/obligations", Some(rent), Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/tenants/{}/summary", t.tenant.tenant_id);
    let (status, body) = send(&t.app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["pending_count"], 2);
}

#[tokio::test]
async fn test_dashboard_summary() {
    let t = setup_test_app().await;
    seed_rent(&t, 5000, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).await;
    seed_rent(&t, 5000, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()).await;

    let (status, body) = send(&t.app, "GET", "/dashboard/summary", None, Some(VERIFIER_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["overdue_count"], 1);
    assert_eq!(body["pending_count"], 1);
    assert_eq!(body["as_of"], "2025-01-05");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let t = setup_test_app().await;
    let (status, body) = send(&t.app, "GET", "/api-docs/openapi.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/payments/verify"].is_object());
    assert!(body["components"]["securitySchemes"]["verifier_key"].is_object());
}
