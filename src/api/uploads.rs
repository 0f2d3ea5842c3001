//! Image upload endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::sync::UploadFile;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub folder: Option<String>,
    /// Original file name; its extension names the stored object.
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageReference {
    pub url: String,
}

/// POST /api/admin/uploads - Store the raw request body as an image.
pub async fn upload_image(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ImageReference> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let file = UploadFile {
        name: query.filename.unwrap_or_default(),
        content_type,
        bytes: body.to_vec(),
    };
    let url = state
        .site
        .images
        .upload(file, query.folder.as_deref())
        .await?;
    success(ImageReference { url })
}

/// DELETE /api/admin/uploads - Remove an image by its public URL.
pub async fn delete_image(
    State(state): State<AppState>,
    Json(reference): Json<ImageReference>,
) -> ApiResult<()> {
    state.site.images.delete(&reference.url).await?;
    success(())
}
