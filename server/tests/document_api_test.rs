//! End-to-end tests against a running server.
//!
//! These tests require a running server backed by PostgreSQL, started
//! without AUTH_SECRET. Set DOMPET_TEST_SERVER_URL (default
//! `http://127.0.0.1:3000`) and run with `--ignored`.

use dompet_engine::{EntityType, PendingOperation};
use dompet_sync::{
    ChannelNotifier, HttpRemote, MemoryStore, PendingBadge, PendingStore, RemoteError,
    RemoteStore, SyncEngine,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn server_url() -> String {
    std::env::var("DOMPET_TEST_SERVER_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".into())
}

/// A user nobody else writes to, so reruns start clean.
fn fresh_user() -> String {
    format!("test-{}", uuid::Uuid::new_v4())
}

async fn fetch(user_id: &str, collection: &str, doc_id: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!(
            "{}/v1/users/{}/{}/{}",
            server_url(),
            user_id,
            collection,
            doc_id
        ))
        .bearer_auth(user_id)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn create_update_delete_round_trip() {
    let user = fresh_user();
    let remote = HttpRemote::new(&server_url(), Duration::from_secs(5), None).unwrap();

    remote
        .create(
            &user,
            EntityType::Expense,
            "exp-1",
            &json!({"description": "Kopi", "amount": 25000}),
        )
        .await
        .unwrap();
    remote
        .update(&user, EntityType::Expense, "exp-1", &json!({"amount": 30000}))
        .await
        .unwrap();

    let doc: Value = fetch(&user, "expenses", "exp-1").await.json().await.unwrap();
    assert_eq!(doc["data"], json!({"description": "Kopi", "amount": 30000}));

    remote.delete(&user, EntityType::Expense, "exp-1").await.unwrap();
    // Deleting again is fine
    remote.delete(&user, EntityType::Expense, "exp-1").await.unwrap();

    assert_eq!(fetch(&user, "expenses", "exp-1").await.status(), 404);
}

#[tokio::test]
#[ignore]
async fn patch_of_missing_document_is_permanent() {
    let user = fresh_user();
    let remote = HttpRemote::new(&server_url(), Duration::from_secs(5), None).unwrap();

    let err = remote
        .update(&user, EntityType::Income, "missing", &json!({"amount": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 404, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
#[ignore]
async fn invalid_document_is_permanent() {
    let user = fresh_user();
    let remote = HttpRemote::new(&server_url(), Duration::from_secs(5), None).unwrap();

    let err = remote
        .create(&user, EntityType::Expense, "exp-1", &json!({"amount": 0}))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 422, .. }));
}

#[tokio::test]
#[ignore]
async fn queued_writes_drain_against_server() {
    let user = fresh_user();
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(HttpRemote::new(&server_url(), Duration::from_secs(5), None).unwrap());
    let (notifier, _rx) = ChannelNotifier::channel();
    let engine = SyncEngine::new(
        store.clone(),
        remote,
        PendingBadge::new_shared(),
        Arc::new(notifier),
    );

    store
        .enqueue(PendingOperation::create(
            "op-1",
            user.as_str(),
            EntityType::Installment,
            "ins-1",
            json!({"description": "Laptop", "totalAmount": 1500000, "months": 12}),
            1000,
        ))
        .await
        .unwrap();
    store
        .enqueue(PendingOperation::update(
            "op-2",
            user.as_str(),
            EntityType::Installment,
            "ins-1",
            json!({"paidMonths": 1}),
            1001,
        ))
        .await
        .unwrap();

    engine.sync_pending_data(&user).await.unwrap();
    assert_eq!(store.count(&user).await.unwrap(), 0);

    let doc: Value = fetch(&user, "installments", "ins-1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(doc["data"]["paidMonths"], json!(1));
}
