//! Filesystem-backed blob store.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{BlobStore, UploadOptions};
use crate::errors::AppError;

/// URL path prefix under which public objects are served.
pub const PUBLIC_OBJECT_PATH: &str = "/storage/v1/object/public";

/// Stores objects as files under `root/{bucket}/{key}`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    /// `public_base` is the externally visible origin, e.g. `https://dept.example.edu`.
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, AppError> {
        check_segment(bucket)?;
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(AppError::Validation(format!("Invalid object key: {}", key)));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

fn check_segment(bucket: &str) -> Result<(), AppError> {
    if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
        return Err(AppError::Validation(format!("Invalid bucket: {}", bucket)));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<(), AppError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut open = tokio::fs::OpenOptions::new();
        open.write(true);
        if options.upsert {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }

        let mut file = open.open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => AppError::Remote("The resource already exists".to_string()),
            _ => AppError::from(e),
        })?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        tracing::debug!(bucket, key, size = bytes.len(), "Stored object");
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}{}/{}/{}", self.public_base, PUBLIC_OBJECT_PATH, bucket, key)
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
        for key in keys {
            let path = self.object_path(bucket, key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(bucket, key = %key, "Removed object"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
