//! Gallery hook: albums with derived photo counts, and their photos.

use std::sync::Arc;

use futures::future::try_join_all;

use super::{EntitySync, HookStatus};
use crate::errors::AppError;
use crate::models::{
    CreateAlbumRequest, CreatePhotoRequest, Entity, GalleryAlbum, GalleryPhoto,
    UpdateAlbumRequest,
};
use crate::store::{Order, Query, RemoteStore};

pub struct GallerySync {
    albums: EntitySync<GalleryAlbum>,
    photos: EntitySync<GalleryPhoto>,
}

impl GallerySync {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            albums: EntitySync::new(store.clone()),
            photos: EntitySync::new(store),
        }
    }

    /// Subscribe both feeds, load albums with counts and every photo. The
    /// photo feed is subscribed even when the albums fail; the first error is
    /// returned.
    pub async fn mount(&self) -> Result<(), AppError> {
        let albums = match self.albums.mount().await {
            Ok(()) => self.count_photos().await,
            Err(e) => Err(e),
        };
        let photos = self.photos.mount().await;
        albums.and(photos)
    }

    pub async fn unmount(&self) {
        self.albums.unmount().await;
        self.photos.unmount().await;
    }

    /// Reload albums newest first and recount their photos.
    pub async fn load(&self) -> Result<(), AppError> {
        self.albums.load().await?;
        self.count_photos().await
    }

    async fn count_photos(&self) -> Result<(), AppError> {
        let generation = self.albums.generation();
        let ids: Vec<String> = self.albums.items().await.into_iter().map(|a| a.id).collect();
        let store = self.albums.store();

        let counts = try_join_all(ids.iter().map(|id| {
            let query = Query::new().eq("album_id", id.as_str());
            async move { store.count(GalleryPhoto::TABLE, &query).await }
        }))
        .await;

        self.albums
            .edit_since(generation, |state| match counts {
                Ok(counts) => {
                    for (id, count) in ids.iter().zip(counts) {
                        if let Some(album) = state.get_mut(id) {
                            album.photo_count = count;
                        }
                    }
                    Ok(())
                }
                Err(e) => {
                    state.fail_load(&e);
                    Err(e)
                }
            })
            .await
            .unwrap_or(Ok(()))
    }

    /// Load photos newest first, optionally only one album's.
    pub async fn load_photos(&self, album_id: Option<&str>) -> Result<(), AppError> {
        let mut query = Query::new();
        if let Some(album_id) = album_id {
            query = query.eq("album_id", album_id);
        }
        self.photos
            .load_where(query.order(Order::desc("created_at")))
            .await
    }

    pub async fn albums(&self) -> Vec<GalleryAlbum> {
        self.albums.items().await
    }

    pub async fn photos(&self) -> Vec<GalleryPhoto> {
        self.photos.items().await
    }

    pub async fn create_album(&self, request: &CreateAlbumRequest) -> Result<GalleryAlbum, AppError> {
        self.albums.create(request).await
    }

    /// Update album fields; the locally known photo count is kept.
    pub async fn update_album(
        &self,
        id: &str,
        request: &UpdateAlbumRequest,
    ) -> Result<GalleryAlbum, AppError> {
        let updated = self.albums.update(id, request).await?;
        Ok(self.albums.get(id).await.unwrap_or(updated))
    }

    /// Delete an album. Its photos go with it.
    pub async fn remove_album(&self, id: &str) -> Result<(), AppError> {
        self.albums.remove(id).await?;
        let generation = self.photos.generation();
        self.photos
            .edit_since(generation, |state| {
                state.items.retain(|photo| photo.album_id != id);
            })
            .await;
        Ok(())
    }

    /// Add a photo and bump its album's count.
    pub async fn add_photo(&self, request: &CreatePhotoRequest) -> Result<GalleryPhoto, AppError> {
        let photo = self.photos.create(request).await?;
        self.adjust_count(&photo.album_id, 1).await;
        Ok(photo)
    }

    /// Delete a photo and lower its album's count, never below zero.
    pub async fn remove_photo(&self, id: &str, album_id: &str) -> Result<(), AppError> {
        self.photos.remove(id).await?;
        self.adjust_count(album_id, -1).await;
        Ok(())
    }

    async fn adjust_count(&self, album_id: &str, delta: i64) {
        let generation = self.albums.generation();
        self.albums
            .edit_since(generation, |state| {
                if let Some(album) = state.get_mut(album_id) {
                    album.photo_count = (album.photo_count + delta).max(0);
                }
            })
            .await;
    }

    pub async fn is_loading(&self) -> bool {
        self.albums.is_loading().await
    }

    pub async fn error(&self) -> Option<String> {
        match self.albums.error().await {
            Some(error) => Some(error),
            None => self.photos.error().await,
        }
    }

    pub async fn status(&self) -> HookStatus {
        self.albums.status().await
    }
}
