//! Integration tests for the HTTP + WebSocket remote binding
//!
//! Runs `HttpRemoteStore` against the fixture document service.

mod common;

use common::{
    local_store, remote_center, settle, wait_until, RecordingSink, TestServer, TEST_ENVIRONMENT,
    TEST_USER,
};
use notification_center::{
    CollectionPath, HttpRemoteStore, MemoryRemoteStore, NotificationPanel, NotificationRecord,
    RecordPatch, RemoteNotificationStore, RemoteStoreError, UserId,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);

fn collection() -> CollectionPath {
    CollectionPath::new(&UserId::new(TEST_USER), Some(TEST_ENVIRONMENT))
}

fn client(server: &TestServer) -> HttpRemoteStore {
    HttpRemoteStore::new(&server.base_url, TIMEOUT).expect("Failed to build client")
}

fn stepping_clock() -> impl Fn() -> i64 + Send + Sync + 'static {
    let now = Arc::new(AtomicI64::new(10_000));
    move || now.fetch_add(1000, Ordering::SeqCst)
}

#[tokio::test]
async fn test_put_and_fetch_use_server_time() {
    let server = TestServer::spawn_with(MemoryRemoteStore::new().with_clock(stepping_clock())).await;
    let store = client(&server);
    let coll = collection();

    // Client timestamps are ignored; server order wins
    store
        .put(&coll, &NotificationRecord::new("n1", "Rent due", 99_999))
        .await
        .unwrap();
    store
        .put(
            &coll,
            &NotificationRecord::new("n2", "Lease signed", 1)
                .with_body("Unit 4B")
                .with_url("/leases/4b"),
        )
        .await
        .unwrap();

    let records = store.fetch(&coll, 100).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "n2");
    assert_eq!(records[0].timestamp, 11_000);
    assert_eq!(records[0].body, "Unit 4B");
    assert_eq!(records[0].url.as_deref(), Some("/leases/4b"));
    assert_eq!(records[1].id, "n1");
    assert_eq!(records[1].timestamp, 10_000);
}

#[tokio::test]
async fn test_fetch_respects_limit() {
    let server = TestServer::spawn().await;
    let store = client(&server);
    let coll = collection();
    for i in 0..5 {
        server
            .store
            .insert_raw(&coll, NotificationRecord::new(format!("n{}", i), "T", i));
    }

    let records = store.fetch(&coll, 3).await.unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["n4", "n3", "n2"]);
}

#[tokio::test]
async fn test_exists_and_update() {
    let server = TestServer::spawn().await;
    let store = client(&server);
    let coll = collection();
    server
        .store
        .insert_raw(&coll, NotificationRecord::new("n1", "Rent due", 1));

    assert!(store.exists(&coll, "n1").await.unwrap());
    assert!(!store.exists(&coll, "missing").await.unwrap());

    store
        .update(&coll, "n1", &RecordPatch::mark_read())
        .await
        .unwrap();
    assert!(server.store.records(&coll)[0].read);

    let result = store
        .update(&coll, "missing", &RecordPatch::mark_read())
        .await;
    assert!(matches!(result, Err(RemoteStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_put_keeps_stored_read_flag() {
    let server = TestServer::spawn().await;
    let store = client(&server);
    let coll = collection();

    store
        .put(&coll, &NotificationRecord::new("n1", "Rent due", 1))
        .await
        .unwrap();
    store
        .update(&coll, "n1", &RecordPatch::mark_read())
        .await
        .unwrap();
    store
        .put(&coll, &NotificationRecord::new("n1", "Rent due", 2))
        .await
        .unwrap();

    let records = store.fetch(&coll, 100).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].read);
}

#[tokio::test]
async fn test_batch_operations() {
    let server = TestServer::spawn().await;
    let store = client(&server);
    let coll = collection();
    for id in ["a", "b", "c"] {
        server
            .store
            .insert_raw(&coll, NotificationRecord::new(id, id, 1));
    }

    store
        .batch_update(
            &coll,
            &["a".to_string(), "b".to_string(), "gone".to_string()],
            &RecordPatch::mark_read(),
        )
        .await
        .unwrap();
    let read: Vec<String> = server
        .store
        .records(&coll)
        .into_iter()
        .filter(|r| r.read)
        .map(|r| r.id)
        .collect();
    assert_eq!(read.len(), 2);

    store
        .batch_delete(&coll, &["a".to_string(), "c".to_string()])
        .await
        .unwrap();
    let remaining = server.store.records(&coll);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "b");
}

#[tokio::test]
async fn test_delete_missing_document_succeeds() {
    let server = TestServer::spawn().await;
    let store = client(&server);

    store.delete(&collection(), "missing").await.unwrap();
}

#[tokio::test]
async fn test_outage_surfaces_as_status_error() {
    let server = TestServer::spawn().await;
    let store = client(&server);
    server.store.set_unavailable(true);

    let result = store.fetch(&collection(), 100).await;
    assert!(matches!(
        result,
        Err(RemoteStoreError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_listener_streams_snapshots() {
    let server = TestServer::spawn().await;
    let store = client(&server);
    let coll = collection();
    server
        .store
        .insert_raw(&coll, NotificationRecord::new("n1", "Rent due", 1000));

    let mut snapshots = store.listen(&coll, 100).await.unwrap();
    let initial = timeout(TIMEOUT, snapshots.recv()).await.unwrap().unwrap();
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].id, "n1");

    server
        .store
        .insert_raw(&coll, NotificationRecord::new("n2", "Lease signed", 2000));
    let next = timeout(TIMEOUT, snapshots.recv()).await.unwrap().unwrap();
    let ids: Vec<&str> = next.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["n2", "n1"]);
}

#[tokio::test]
async fn test_dropping_receiver_detaches_listener() {
    let server = TestServer::spawn().await;
    let store = client(&server);
    let coll = collection();

    let mut snapshots = store.listen(&coll, 100).await.unwrap();
    timeout(TIMEOUT, snapshots.recv()).await.unwrap().unwrap();
    assert_eq!(server.store.active_listeners(), 1);

    drop(snapshots);
    let remote = server.store.clone();
    wait_until("listener detach", move || remote.active_listeners() == 0).await;
}

#[tokio::test]
async fn test_listener_outage_closes_stream() {
    let server = TestServer::spawn().await;
    let store = client(&server);
    server.store.set_unavailable(true);

    let mut snapshots = store.listen(&collection(), 100).await.unwrap();
    let next = timeout(TIMEOUT, snapshots.recv()).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn test_center_over_http_toasts_new_arrivals() {
    let server = TestServer::spawn().await;
    let remote: Arc<dyn RemoteNotificationStore> = Arc::new(client(&server));
    let center = Arc::new(remote_center(local_store(), remote));
    center
        .save(NotificationRecord::new("old", "Old news", 1))
        .await;

    let panel = NotificationPanel::new(center.clone(), Duration::from_millis(2000));
    let sink = Arc::new(RecordingSink::default());
    let _subscription = panel.attach(sink.clone());
    wait_until("priming snapshot", || panel.notifications().len() == 1).await;

    center
        .save(NotificationRecord::new("fresh", "Rent due", 2))
        .await;
    wait_until("second snapshot", || panel.notifications().len() == 2).await;
    settle().await;

    assert_eq!(sink.toast_ids(), vec!["fresh"]);
    assert_eq!(sink.chimes(), 1);
    assert_eq!(panel.badge_label().as_deref(), Some("2"));

    panel.mark_all_as_read().await;
    wait_until("all read", || panel.unread_count() == 0).await;
    assert!(panel.badge_label().is_none());
}
