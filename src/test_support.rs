//! Store doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use crate::errors::AppError;
use crate::store::{BlobStore, ChangeEvent, Query, RemoteStore, Row, UploadOptions};

/// Row store whose every call fails with the same remote error.
pub struct FailingStore {
    message: String,
    feed: broadcast::Sender<ChangeEvent>,
}

impl FailingStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            feed: broadcast::channel(16).0,
        }
    }

    fn fail<T>(&self) -> Result<T, AppError> {
        Err(AppError::Remote(self.message.clone()))
    }
}

#[async_trait]
impl RemoteStore for FailingStore {
    async fn select(&self, _table: &str, _query: &Query) -> Result<Vec<Row>, AppError> {
        self.fail()
    }

    async fn insert(&self, _table: &str, _fields: Row) -> Result<Row, AppError> {
        self.fail()
    }

    async fn update(&self, _table: &str, _id: &str, _fields: Row) -> Result<Row, AppError> {
        self.fail()
    }

    async fn update_where(
        &self,
        _table: &str,
        _query: &Query,
        _fields: Row,
    ) -> Result<Vec<Row>, AppError> {
        self.fail()
    }

    async fn delete(&self, _table: &str, _id: &str) -> Result<(), AppError> {
        self.fail()
    }

    async fn count(&self, _table: &str, _query: &Query) -> Result<i64, AppError> {
        self.fail()
    }

    fn changes(&self, _table: &str) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

/// Wraps a store and holds the first `select` until [`release`](Self::release).
pub struct GatedStore {
    inner: Arc<dyn RemoteStore>,
    armed: AtomicBool,
    entered: Notify,
    gate: Notify,
}

impl GatedStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }

    pub async fn wait_for_select(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl RemoteStore for GatedStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, AppError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.notified().await;
        }
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, fields: Row) -> Result<Row, AppError> {
        self.inner.insert(table, fields).await
    }

    async fn update(&self, table: &str, id: &str, fields: Row) -> Result<Row, AppError> {
        self.inner.update(table, id, fields).await
    }

    async fn update_where(
        &self,
        table: &str,
        query: &Query,
        fields: Row,
    ) -> Result<Vec<Row>, AppError> {
        self.inner.update_where(table, query, fields).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError> {
        self.inner.delete(table, id).await
    }

    async fn count(&self, table: &str, query: &Query) -> Result<i64, AppError> {
        self.inner.count(table, query).await
    }

    fn changes(&self, table: &str) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes(table)
    }
}

/// Wraps a store and fails `count` on one table.
pub struct CountFailsOn {
    inner: Arc<dyn RemoteStore>,
    table: &'static str,
    pub counts: AtomicUsize,
}

impl CountFailsOn {
    pub fn new(inner: Arc<dyn RemoteStore>, table: &'static str) -> Self {
        Self {
            inner,
            table,
            counts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteStore for CountFailsOn {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, AppError> {
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, fields: Row) -> Result<Row, AppError> {
        self.inner.insert(table, fields).await
    }

    async fn update(&self, table: &str, id: &str, fields: Row) -> Result<Row, AppError> {
        self.inner.update(table, id, fields).await
    }

    async fn update_where(
        &self,
        table: &str,
        query: &Query,
        fields: Row,
    ) -> Result<Vec<Row>, AppError> {
        self.inner.update_where(table, query, fields).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError> {
        self.inner.delete(table, id).await
    }

    async fn count(&self, table: &str, query: &Query) -> Result<i64, AppError> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        if table == self.table {
            return Err(AppError::Remote(format!("permission denied for table {}", table)));
        }
        self.inner.count(table, query).await
    }

    fn changes(&self, table: &str) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes(table)
    }
}

/// One recorded blob upload.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub bucket: String,
    pub key: String,
    pub size: usize,
    pub options: UploadOptions,
}

/// Blob store that records calls instead of storing anything.
#[derive(Default)]
pub struct RecordingBlobStore {
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub removed: Mutex<Vec<(String, Vec<String>)>>,
    pub fail_with: Option<String>,
}

impl RecordingBlobStore {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<(), AppError> {
        if let Some(message) = &self.fail_with {
            return Err(AppError::Remote(message.clone()));
        }
        self.uploads.lock().unwrap().push(RecordedUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: bytes.len(),
            options: options.clone(),
        });
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "https://cdn.example.edu/storage/v1/object/public/{}/{}",
            bucket, key
        )
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
        if let Some(message) = &self.fail_with {
            return Err(AppError::Remote(message.clone()));
        }
        self.removed
            .lock()
            .unwrap()
            .push((bucket.to_string(), keys.to_vec()));
        Ok(())
    }
}
