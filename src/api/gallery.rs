//! Gallery API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::catalog;
use crate::errors::AppError;
use crate::models::{
    CreateAlbumRequest, CreatePhotoRequest, GalleryAlbum, GalleryPhoto, UpdateAlbumRequest,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    #[serde(default)]
    pub album_id: Option<String>,
    /// Only photos from albums in this category.
    #[serde(default)]
    pub category: Option<String>,
}

/// GET /api/gallery/albums - Published albums.
pub async fn published_albums(State(state): State<AppState>) -> ApiResult<Vec<GalleryAlbum>> {
    let albums = state.site.gallery.albums().await;
    success(catalog::published_albums(&albums))
}

/// GET /api/gallery/photos - Photos of published albums.
pub async fn published_photos(
    State(state): State<AppState>,
    Query(query): Query<PhotoQuery>,
) -> ApiResult<Vec<GalleryPhoto>> {
    let albums = state.site.gallery.albums().await;
    let photos = state.site.gallery.photos().await;
    let mut visible = catalog::published_photos(&albums, &photos, query.category.as_deref());
    if let Some(album_id) = &query.album_id {
        visible.retain(|photo| &photo.album_id == album_id);
    }
    success(visible)
}

/// GET /api/admin/gallery/albums - Every album with photo counts.
pub async fn list_albums(State(state): State<AppState>) -> ApiResult<Vec<GalleryAlbum>> {
    success(state.site.gallery.albums().await)
}

/// POST /api/admin/gallery/albums
pub async fn create_album(
    State(state): State<AppState>,
    Json(request): Json<CreateAlbumRequest>,
) -> ApiResult<GalleryAlbum> {
    success(state.site.gallery.create_album(&request).await?)
}

/// PUT /api/admin/gallery/albums/{id}
pub async fn update_album(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAlbumRequest>,
) -> ApiResult<GalleryAlbum> {
    success(state.site.gallery.update_album(&id, &request).await?)
}

/// DELETE /api/admin/gallery/albums/{id} - Delete an album and its photos.
pub async fn delete_album(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.site.gallery.remove_album(&id).await?;
    success(())
}

/// POST /api/admin/gallery/photos
pub async fn add_photo(
    State(state): State<AppState>,
    Json(request): Json<CreatePhotoRequest>,
) -> ApiResult<GalleryPhoto> {
    success(state.site.gallery.add_photo(&request).await?)
}

/// DELETE /api/admin/gallery/photos/{id}
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PhotoQuery>,
) -> ApiResult<()> {
    let album_id = match query.album_id {
        Some(album_id) => album_id,
        None => state
            .site
            .gallery
            .photos()
            .await
            .into_iter()
            .find(|photo| photo.id == id)
            .map(|photo| photo.album_id)
            .ok_or_else(|| AppError::NotFound(format!("Photo {} not found", id)))?,
    };
    state.site.gallery.remove_photo(&id, &album_id).await?;
    success(())
}
