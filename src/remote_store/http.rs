//! REST + WebSocket binding of the remote document service.
//!
//! Documents live under `{base}/users/{user}/{collection}/{id}`. Batches go
//! through `_batch_update` / `_batch_delete`, live listeners attach to the
//! `_listen` WebSocket of a collection.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::wire::{BatchDeleteRequest, BatchUpdateRequest, ListenerMessage, RemoteDocument};
use super::{
    CollectionPath, RemoteNotificationStore, RemoteResult, RemoteStoreError, SnapshotReceiver,
};
use crate::notifications::{normalize_list, now_millis, NotificationRecord, RecordPatch};

/// Client for a remote notification document service.
pub struct HttpRemoteStore {
    http_client: Client,
    base_url: String,
    ws_base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> RemoteResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let ws_base_url = if let Some(rest) = base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(RemoteStoreError::Unavailable(format!(
                "Unsupported remote url {}",
                base_url
            )));
        };

        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            ws_base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_suffix(collection: &CollectionPath) -> String {
        format!(
            "users/{}/{}",
            urlencoding::encode(collection.user().as_str()),
            urlencoding::encode(&collection.collection_name())
        )
    }

    fn collection_url(&self, collection: &CollectionPath) -> String {
        format!("{}/{}", self.base_url, Self::collection_suffix(collection))
    }

    fn document_url(&self, collection: &CollectionPath, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id)
        )
    }

    fn listen_url(&self, collection: &CollectionPath, limit: usize) -> String {
        format!(
            "{}/{}/_listen?limit={}",
            self.ws_base_url,
            Self::collection_suffix(collection),
            limit
        )
    }
}

fn check_status(response: Response, url: &str) -> RemoteResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(RemoteStoreError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        })
    }
}

fn documents_to_records(documents: Vec<RemoteDocument>, limit: usize) -> Vec<NotificationRecord> {
    let received_at = now_millis();
    let records = documents
        .into_iter()
        .map(|doc| doc.into_record(received_at))
        .collect();
    normalize_list(records, limit)
}

#[async_trait]
impl RemoteNotificationStore for HttpRemoteStore {
    async fn fetch(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> RemoteResult<Vec<NotificationRecord>> {
        let url = self.collection_url(collection);
        let response = self
            .http_client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let documents: Vec<RemoteDocument> = check_status(response, &url)?.json().await?;
        Ok(documents_to_records(documents, limit))
    }

    async fn exists(&self, collection: &CollectionPath, id: &str) -> RemoteResult<bool> {
        let url = self.document_url(collection, id);
        let response = self.http_client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response, &url)?;
        Ok(true)
    }

    async fn put(
        &self,
        collection: &CollectionPath,
        record: &NotificationRecord,
    ) -> RemoteResult<()> {
        let url = self.document_url(collection, &record.id);
        let response = self
            .http_client
            .put(&url)
            .json(&RemoteDocument::for_upload(record))
            .send()
            .await?;
        check_status(response, &url)?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &CollectionPath,
        id: &str,
        patch: &RecordPatch,
    ) -> RemoteResult<()> {
        let url = self.document_url(collection, id);
        let response = self.http_client.patch(&url).json(patch).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteStoreError::NotFound(collection.document_path(id)));
        }
        check_status(response, &url)?;
        Ok(())
    }

    async fn batch_update(
        &self,
        collection: &CollectionPath,
        ids: &[String],
        patch: &RecordPatch,
    ) -> RemoteResult<()> {
        let url = format!("{}/_batch_update", self.collection_url(collection));
        let body = BatchUpdateRequest {
            ids: ids.to_vec(),
            patch: patch.clone(),
        };
        let response = self.http_client.post(&url).json(&body).send().await?;
        check_status(response, &url)?;
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> RemoteResult<()> {
        let url = self.document_url(collection, id);
        let response = self.http_client.delete(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Document {} already gone", collection.document_path(id));
            return Ok(());
        }
        check_status(response, &url)?;
        Ok(())
    }

    async fn batch_delete(&self, collection: &CollectionPath, ids: &[String]) -> RemoteResult<()> {
        let url = format!("{}/_batch_delete", self.collection_url(collection));
        let body = BatchDeleteRequest { ids: ids.to_vec() };
        let response = self.http_client.post(&url).json(&body).send().await?;
        check_status(response, &url)?;
        Ok(())
    }

    async fn listen(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> RemoteResult<SnapshotReceiver> {
        let url = self.listen_url(collection, limit);
        info!("Attaching listener to {}", collection);

        let (ws_stream, _) = connect_async(&url)
            .await
            .map_err(|e| RemoteStoreError::WebSocket(format!("Connection failed: {}", e)))?;
        let (mut write, mut read) = ws_stream.split();

        let (tx, rx) = mpsc::unbounded_channel();
        let label = collection.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!("Listener on {} detached", label);
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ListenerMessage>(&text) {
                                Ok(ListenerMessage::Snapshot(documents)) => {
                                    if tx.send(documents_to_records(documents, limit)).is_err() {
                                        break;
                                    }
                                }
                                Ok(ListenerMessage::Error { code, message }) => {
                                    warn!("Listener on {} failed: {} {}", label, code, message);
                                    break;
                                }
                                Err(e) => {
                                    warn!("Failed to parse listener message: {} - {}", e, text);
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                error!("Failed to send pong: {}", e);
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Listener socket on {} closed by server", label);
                            break;
                        }
                        Some(Err(e)) => {
                            error!("Listener socket error on {}: {}", label, e);
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        });

        Ok(rx)
    }
}
