//! Image upload helper over the blob store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use crate::errors::AppError;
use crate::store::{BlobStore, UploadOptions, PUBLIC_OBJECT_PATH};

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const IMAGE_BUCKET: &str = "images";
pub const DEFAULT_FOLDER: &str = "general";
const CACHE_CONTROL: &str = "3600";
const TOKEN_LEN: usize = 11;

/// A file handed over by an admin screen.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Uploads images under unique keys and deletes them by public URL.
pub struct ImageUpload {
    blobs: Arc<dyn BlobStore>,
    bucket: String,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight counter when an upload finishes, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ImageUpload {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_bucket(blobs, IMAGE_BUCKET)
    }

    pub fn with_bucket(blobs: Arc<dyn BlobStore>, bucket: &str) -> Self {
        Self {
            blobs,
            bucket: bucket.to_string(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Whether any upload is running. Informational only.
    pub fn is_uploading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Store `file` under `{folder}/{millis}-{token}.{ext}` and return its public URL.
    pub async fn upload(&self, file: UploadFile, folder: Option<&str>) -> Result<String, AppError> {
        validate_image(&file)?;
        let folder = folder
            .map(|f| f.trim_matches('/'))
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FOLDER);
        let key = format!(
            "{}/{}-{}.{}",
            folder,
            Utc::now().timestamp_millis(),
            random_token(),
            extension(&file)
        );

        let _guard = InFlight::start(&self.in_flight);
        let options = UploadOptions {
            cache_control: CACHE_CONTROL.to_string(),
            upsert: false,
        };
        self.blobs
            .upload(&self.bucket, &key, file.bytes, &options)
            .await
            .inspect_err(|e| tracing::warn!(key = %key, error = %e, "Image upload failed"))?;

        tracing::info!(key = %key, "Uploaded image");
        Ok(self.blobs.public_url(&self.bucket, &key))
    }

    /// Remove the object behind a public URL produced by [`upload`](Self::upload).
    pub async fn delete(&self, url: &str) -> Result<(), AppError> {
        let key = storage_key_from_url(url, &self.bucket)?;
        self.blobs.remove(&self.bucket, &[key.to_string()]).await?;
        tracing::info!(key, "Deleted image");
        Ok(())
    }
}

fn validate_image(file: &UploadFile) -> Result<(), AppError> {
    if !file.content_type.starts_with("image/") {
        return Err(AppError::Validation(
            "Invalid file type. Please select an image file.".to_string(),
        ));
    }
    if file.bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation(
            "File too large. Please select an image smaller than 5MB.".to_string(),
        ));
    }
    Ok(())
}

/// Extension after the last `.` of the file name, else the media subtype.
fn extension(file: &UploadFile) -> String {
    let from_name = file
        .name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match from_name {
        Some(ext) => ext.to_string(),
        None => file
            .content_type
            .trim_start_matches("image/")
            .split(['+', ';'])
            .next()
            .unwrap_or("bin")
            .to_string(),
    }
}

fn random_token() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    (0..TOKEN_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Storage key of a public object URL in `bucket`.
pub fn storage_key_from_url<'a>(url: &'a str, bucket: &str) -> Result<&'a str, AppError> {
    let marker = format!("{}/{}/", PUBLIC_OBJECT_PATH, bucket);
    match url.split_once(marker.as_str()) {
        Some((_, key)) if !key.is_empty() => Ok(key),
        Some(_) => Err(AppError::InvalidReference("Invalid image URL".to_string())),
        None => Err(AppError::InvalidReference(
            "Invalid image URL format".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingBlobStore;

    fn image(size: usize) -> UploadFile {
        UploadFile {
            name: "portrait.JPG".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0; size],
        }
    }

    #[tokio::test]
    async fn test_size_boundary() {
        let blobs = Arc::new(RecordingBlobStore::default());
        let uploader = ImageUpload::new(blobs.clone());

        uploader.upload(image(MAX_IMAGE_BYTES), None).await.unwrap();
        assert_eq!(blobs.upload_count(), 1);

        let err = uploader
            .upload(image(MAX_IMAGE_BYTES + 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(blobs.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_images_without_store_call() {
        let blobs = Arc::new(RecordingBlobStore::default());
        let uploader = ImageUpload::new(blobs.clone());
        let file = UploadFile {
            name: "notes.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        };

        assert!(matches!(
            uploader.upload(file, Some("faculty")).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(blobs.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_key_layout_and_options() {
        let blobs = Arc::new(RecordingBlobStore::default());
        let uploader = ImageUpload::new(blobs.clone());

        let url = uploader.upload(image(10), Some("faculty")).await.unwrap();

        let recorded = blobs.uploads.lock().unwrap()[0].clone();
        assert_eq!(recorded.bucket, "images");
        assert_eq!(recorded.size, 10);
        assert_eq!(recorded.options.cache_control, "3600");
        assert!(!recorded.options.upsert);

        let (folder, name) = recorded.key.split_once('/').unwrap();
        assert_eq!(folder, "faculty");
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "JPG");
        let (millis, token) = stem.split_once('-').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(token.len(), TOKEN_LEN);

        assert!(url.ends_with(&format!("/storage/v1/object/public/images/{}", recorded.key)));
        assert!(!uploader.is_uploading());
    }

    #[tokio::test]
    async fn test_default_folder() {
        let blobs = Arc::new(RecordingBlobStore::default());
        let uploader = ImageUpload::new(blobs.clone());
        uploader.upload(image(1), None).await.unwrap();
        assert!(blobs.uploads.lock().unwrap()[0].key.starts_with("general/"));
    }

    #[tokio::test]
    async fn test_store_error_is_returned_verbatim() {
        let blobs = Arc::new(RecordingBlobStore::failing("The resource already exists"));
        let uploader = ImageUpload::new(blobs);
        let err = uploader.upload(image(1), None).await.unwrap_err();
        assert_eq!(
            err,
            AppError::Remote("The resource already exists".to_string())
        );
        assert!(!uploader.is_uploading());
    }

    #[tokio::test]
    async fn test_delete_by_url() {
        let blobs = Arc::new(RecordingBlobStore::default());
        let uploader = ImageUpload::new(blobs.clone());

        uploader
            .delete("https://cdn.example.edu/storage/v1/object/public/images/news/1-abc.png")
            .await
            .unwrap();
        assert_eq!(
            blobs.removed.lock().unwrap()[0],
            ("images".to_string(), vec!["news/1-abc.png".to_string()])
        );

        for bad in [
            "https://elsewhere.example/news/1-abc.png",
            "https://cdn.example.edu/storage/v1/object/public/images/",
        ] {
            assert!(matches!(
                uploader.delete(bad).await,
                Err(AppError::InvalidReference(_))
            ));
        }
        assert_eq!(blobs.removed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_extension_fallback() {
        let file = |name: &str, content_type: &str| UploadFile {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: Vec::new(),
        };
        assert_eq!(extension(&file("a.b.webp", "image/webp")), "webp");
        assert_eq!(extension(&file("clipboard", "image/png")), "png");
        assert_eq!(extension(&file("icon", "image/svg+xml")), "svg");
    }
}
