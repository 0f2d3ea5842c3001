//! Gallery album and photo models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, require, require_if_set, Entity};
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlbumStatus {
    #[default]
    Draft,
    Published,
}

/// A photo album. `photo_count` is derived locally and never written to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub status: AlbumStatus,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub photo_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlbumRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AlbumStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAlbumRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AlbumStatus>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_image_url: Option<Option<String>>,
}

impl Entity for GalleryAlbum {
    const TABLE: &'static str = "gallery_albums";
    type Create = CreateAlbumRequest;
    type Update = UpdateAlbumRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_create(request: &CreateAlbumRequest) -> Result<(), AppError> {
        require("Album name", &request.name)
    }

    fn validate_update(request: &UpdateAlbumRequest) -> Result<(), AppError> {
        require_if_set("Album name", &request.name)
    }

    fn reconcile(mut incoming: Self, existing: Option<&Self>) -> Self {
        incoming.photo_count = existing.map(|album| album.photo_count).unwrap_or(0);
        incoming
    }
}

/// A photo belonging to exactly one album.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryPhoto {
    pub id: String,
    pub album_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePhotoRequest {
    pub album_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePhotoRequest {
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Entity for GalleryPhoto {
    const TABLE: &'static str = "gallery_photos";
    type Create = CreatePhotoRequest;
    type Update = UpdatePhotoRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_create(request: &CreatePhotoRequest) -> Result<(), AppError> {
        require("Album", &request.album_id)?;
        require("Image URL", &request.image_url)
    }

    fn validate_update(request: &UpdatePhotoRequest) -> Result<(), AppError> {
        require_if_set("Image URL", &request.image_url)
    }
}
