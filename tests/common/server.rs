//! Fixture document service
//!
//! Serves the REST + WebSocket protocol spoken by `HttpRemoteStore`, backed
//! by a `MemoryRemoteStore` that tests can inspect and break on purpose.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use notification_center::remote_store::wire::{
    BatchDeleteRequest, BatchUpdateRequest, ListenerMessage, RemoteDocument,
};
use notification_center::{
    CollectionPath, MemoryRemoteStore, RecordPatch, RemoteNotificationStore, RemoteStoreError,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;

type SharedStore = Arc<MemoryRemoteStore>;

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

const DEFAULT_LIMIT: usize = 100;

/// Fixture server instance.
///
/// When dropped, the server shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,
    /// Store behind the server
    pub store: SharedStore,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(MemoryRemoteStore::new()).await
    }

    pub async fn spawn_with(store: MemoryRemoteStore) -> Self {
        let store = Arc::new(store);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = make_app(store.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url,
            store,
            _shutdown_tx: Some(shutdown_tx),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn make_app(store: SharedStore) -> Router {
    Router::new()
        .route("/users/{user}/{collection}", get(fetch_documents))
        .route(
            "/users/{user}/{collection}/_batch_update",
            post(batch_update_documents),
        )
        .route(
            "/users/{user}/{collection}/_batch_delete",
            post(batch_delete_documents),
        )
        .route("/users/{user}/{collection}/_listen", get(listen_documents))
        .route(
            "/users/{user}/{collection}/{id}",
            get(get_document)
                .put(put_document)
                .patch(patch_document)
                .delete(delete_document),
        )
        .with_state(store)
}

fn collection_path(user: &str, collection: &str) -> Result<CollectionPath, Response> {
    CollectionPath::from_segments(user, collection)
        .ok_or_else(|| StatusCode::NOT_FOUND.into_response())
}

fn error_response(error: RemoteStoreError) -> Response {
    match error {
        RemoteStoreError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
        RemoteStoreError::Unavailable(message) => {
            (StatusCode::SERVICE_UNAVAILABLE, message).into_response()
        }
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
}

fn to_response(result: Result<(), RemoteStoreError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn fetch_documents(
    State(store): State<SharedStore>,
    Path((user, collection)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let coll = match collection_path(&user, &collection) {
        Ok(coll) => coll,
        Err(response) => return response,
    };
    match store
        .fetch(&coll, query.limit.unwrap_or(DEFAULT_LIMIT))
        .await
    {
        Ok(records) => Json(
            records
                .iter()
                .map(RemoteDocument::from_record)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_document(
    State(store): State<SharedStore>,
    Path((user, collection, id)): Path<(String, String, String)>,
) -> Response {
    let coll = match collection_path(&user, &collection) {
        Ok(coll) => coll,
        Err(response) => return response,
    };
    match store.exists(&coll, &id).await {
        Ok(true) => match store.records(&coll).into_iter().find(|r| r.id == id) {
            Some(record) => Json(RemoteDocument::from_record(&record)).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => error_response(e),
    }
}

async fn put_document(
    State(store): State<SharedStore>,
    Path((user, collection, id)): Path<(String, String, String)>,
    Json(document): Json<RemoteDocument>,
) -> Response {
    let coll = match collection_path(&user, &collection) {
        Ok(coll) => coll,
        Err(response) => return response,
    };
    let mut record = document.into_record(0);
    record.id = id;
    to_response(store.put(&coll, &record).await)
}

async fn patch_document(
    State(store): State<SharedStore>,
    Path((user, collection, id)): Path<(String, String, String)>,
    Json(patch): Json<RecordPatch>,
) -> Response {
    let coll = match collection_path(&user, &collection) {
        Ok(coll) => coll,
        Err(response) => return response,
    };
    to_response(store.update(&coll, &id, &patch).await)
}

async fn delete_document(
    State(store): State<SharedStore>,
    Path((user, collection, id)): Path<(String, String, String)>,
) -> Response {
    let coll = match collection_path(&user, &collection) {
        Ok(coll) => coll,
        Err(response) => return response,
    };
    to_response(store.delete(&coll, &id).await)
}

async fn batch_update_documents(
    State(store): State<SharedStore>,
    Path((user, collection)): Path<(String, String)>,
    Json(request): Json<BatchUpdateRequest>,
) -> Response {
    let coll = match collection_path(&user, &collection) {
        Ok(coll) => coll,
        Err(response) => return response,
    };
    to_response(
        store
            .batch_update(&coll, &request.ids, &request.patch)
            .await,
    )
}

async fn batch_delete_documents(
    State(store): State<SharedStore>,
    Path((user, collection)): Path<(String, String)>,
    Json(request): Json<BatchDeleteRequest>,
) -> Response {
    let coll = match collection_path(&user, &collection) {
        Ok(coll) => coll,
        Err(response) => return response,
    };
    to_response(store.batch_delete(&coll, &request.ids).await)
}

async fn listen_documents(
    ws: WebSocketUpgrade,
    State(store): State<SharedStore>,
    Path((user, collection)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let coll = match collection_path(&user, &collection) {
        Ok(coll) => coll,
        Err(response) => return response,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    ws.on_upgrade(move |socket| handle_listener_socket(socket, store, coll, limit))
}

async fn send_message(socket: &mut WebSocket, message: &ListenerMessage) -> bool {
    let json = serde_json::to_string(message).expect("Failed to serialize listener message");
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_listener_socket(
    mut socket: WebSocket,
    store: SharedStore,
    coll: CollectionPath,
    limit: usize,
) {
    let mut snapshots = match store.listen(&coll, limit).await {
        Ok(snapshots) => snapshots,
        Err(e) => {
            let message = ListenerMessage::Error {
                code: "unavailable".to_string(),
                message: e.to_string(),
            };
            send_message(&mut socket, &message).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => match snapshot {
                Some(records) => {
                    let message = ListenerMessage::Snapshot(
                        records.iter().map(RemoteDocument::from_record).collect(),
                    );
                    if !send_message(&mut socket, &message).await {
                        break;
                    }
                }
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
