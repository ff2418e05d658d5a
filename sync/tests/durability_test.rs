use dompet_engine::{EnqueueOutcome, EntityType, OperationStatus, PendingOperation};
use dompet_sync::{
    ChannelNotifier, InMemoryRemote, PendingBadge, PendingStore, RemoteError, RemoteStore,
    SqliteStore, SyncEngine,
};
use serde_json::json;
use std::sync::Arc;

fn expense(id: &str, target: &str, amount: i64) -> PendingOperation {
    PendingOperation::create(
        id,
        "user-1",
        EntityType::Expense,
        target,
        json!({"description": "Kopi", "amount": amount}),
        1000,
    )
}

#[tokio::test]
async fn queue_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending.db");

    {
        let store = SqliteStore::open_path(&path).await.unwrap();
        store.enqueue(expense("op-1", "a", 25000)).await.unwrap();
        store.enqueue(expense("op-2", "b", 8000)).await.unwrap();
        store
            .enqueue(PendingOperation::update(
                "op-3",
                "user-1",
                EntityType::Expense,
                "a",
                json!({"amount": 30000}),
                1001,
            ))
            .await
            .unwrap();
        store.close().await;
    }

    let store = SqliteStore::open_path(&path).await.unwrap();
    let ops = store.list_pending("user-1").await.unwrap();
    let ids: Vec<_> = ops.iter().map(|op| op.id.as_str()).collect();
    assert_eq!(ids, vec!["op-1", "op-2", "op-3"]);
    assert_eq!(ops[2].payload, json!({"amount": 30000}));
    assert_eq!(store.count("user-1").await.unwrap(), 3);
}

#[tokio::test]
async fn interrupted_drain_is_requeued_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending.db");

    {
        let store = SqliteStore::open_path(&path).await.unwrap();
        store.enqueue(expense("op-1", "a", 25000)).await.unwrap();
        // Crash while the operation is in flight
        assert!(store.begin("op-1").await.unwrap());
        store.close().await;
    }

    let store = Arc::new(SqliteStore::open_path(&path).await.unwrap());
    let ops = store.list_pending("user-1").await.unwrap();
    assert_eq!(ops[0].status, OperationStatus::Syncing);

    let remote = Arc::new(InMemoryRemote::new());
    let (notifier, _rx) = ChannelNotifier::channel();
    let engine = SyncEngine::new(
        store.clone(),
        remote.clone(),
        PendingBadge::new_shared(),
        Arc::new(notifier),
    );

    engine.sync_pending_data("user-1").await.unwrap();
    assert_eq!(store.count("user-1").await.unwrap(), 0);
    assert!(remote.document("user-1", EntityType::Expense, "a").is_some());
}

#[tokio::test]
async fn failed_operations_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending.db");

    {
        let store = Arc::new(SqliteStore::open_path(&path).await.unwrap());
        store.enqueue(expense("op-1", "a", 25000)).await.unwrap();

        let remote = Arc::new(InMemoryRemote::new());
        remote.fail_next(RemoteError::Status {
            status: 422,
            message: "amount too large".into(),
        });
        let (notifier, _rx) = ChannelNotifier::channel();
        let engine = SyncEngine::new(
            store.clone(),
            remote,
            PendingBadge::new_shared(),
            Arc::new(notifier),
        );
        engine.sync_pending_data("user-1").await.unwrap();
        store.close().await;
    }

    let store = SqliteStore::open_path(&path).await.unwrap();
    let failed = store.failed("user-1").await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].attempts, 1);
    assert!(failed[0]
        .last_error
        .as_deref()
        .unwrap()
        .contains("amount too large"));
    assert_eq!(store.count("user-1").await.unwrap(), 0);
}

#[tokio::test]
async fn delete_supersedes_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending.db");

    {
        let store = SqliteStore::open_path(&path).await.unwrap();
        store.enqueue(expense("op-1", "a", 25000)).await.unwrap();
        store.close().await;
    }

    let store = SqliteStore::open_path(&path).await.unwrap();
    store
        .enqueue(PendingOperation::delete(
            "op-2",
            "user-1",
            EntityType::Expense,
            "a",
            1002,
        ))
        .await
        .unwrap();
    assert!(store.list_pending("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_after_crash_recovered_create_reaches_remote() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending.db");
    let remote = Arc::new(InMemoryRemote::new());

    {
        let store = SqliteStore::open_path(&path).await.unwrap();
        store.enqueue(expense("op-1", "a", 25000)).await.unwrap();
        assert!(store.begin("op-1").await.unwrap());
        // The request went out before the process stopped
        remote
            .create(
                "user-1",
                EntityType::Expense,
                "a",
                &json!({"description": "Kopi", "amount": 25000}),
            )
            .await
            .unwrap();
        store.close().await;
    }

    let store = Arc::new(SqliteStore::open_path(&path).await.unwrap());
    assert_eq!(store.requeue_interrupted("user-1").await.unwrap(), 1);
    assert_eq!(store.list_pending("user-1").await.unwrap()[0].attempts, 1);

    let outcome = store
        .enqueue(PendingOperation::delete(
            "op-2",
            "user-1",
            EntityType::Expense,
            "a",
            1002,
        ))
        .await
        .unwrap();
    assert!(matches!(outcome, EnqueueOutcome::Queued { .. }));

    let (notifier, _rx) = ChannelNotifier::channel();
    let engine = SyncEngine::new(
        store.clone(),
        remote.clone(),
        PendingBadge::new_shared(),
        Arc::new(notifier),
    );
    engine.sync_pending_data("user-1").await.unwrap();

    assert!(remote.document("user-1", EntityType::Expense, "a").is_none());
    assert_eq!(store.count("user-1").await.unwrap(), 0);
}
