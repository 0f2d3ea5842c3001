//! Client-side data synchronization.
//!
//! Every hook keeps a local copy of one table, mutates through the row store
//! and reconciles the table's change feed into its copy.

mod coordinator;
mod dashboard;
mod gallery;
mod hook;
mod state;
mod upload;

pub use coordinator::*;
pub use dashboard::*;
pub use gallery::*;
pub use hook::*;
pub use state::*;
pub use upload::*;

use std::sync::Arc;

use crate::errors::AppError;
use crate::models::{Event, Faculty, News, Program, StudyMaterial};
use crate::store::{BlobStore, Order, Query, RemoteStore};

/// All hooks the site mounts.
pub struct SiteSync {
    pub faculty: EntitySync<Faculty>,
    pub featured_faculty: EntitySync<Faculty>,
    pub events: EntitySync<Event>,
    pub news: EntitySync<News>,
    pub published_news: EntitySync<News>,
    pub programs: EntitySync<Program>,
    pub materials: EntitySync<StudyMaterial>,
    pub gallery: GallerySync,
    pub coordinator: CoordinatorMessageSync,
    pub dashboard: DashboardStatsSync,
    pub images: ImageUpload,
}

impl SiteSync {
    pub fn new(store: Arc<dyn RemoteStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            faculty: EntitySync::new(store.clone()),
            featured_faculty: EntitySync::with_query(
                store.clone(),
                Query::new()
                    .eq("is_featured", true)
                    .order(Order::desc("created_at")),
            ),
            events: EntitySync::new(store.clone()),
            news: EntitySync::new(store.clone()),
            published_news: EntitySync::with_query(
                store.clone(),
                Query::new()
                    .eq("status", "published")
                    .order(Order::desc("publish_date")),
            ),
            programs: EntitySync::new(store.clone()),
            materials: EntitySync::new(store.clone()),
            gallery: GallerySync::new(store.clone()),
            coordinator: CoordinatorMessageSync::new(store.clone()),
            dashboard: DashboardStatsSync::new(store),
            images: ImageUpload::new(blobs),
        }
    }

    /// Mount every hook. A failed initial load is recorded on its hook and
    /// reported here; the remaining hooks still mount.
    pub async fn mount(&self) -> Vec<(&'static str, AppError)> {
        let results = [
            ("faculty", self.faculty.mount().await),
            ("featured_faculty", self.featured_faculty.mount().await),
            ("events", self.events.mount().await),
            ("news", self.news.mount().await),
            ("published_news", self.published_news.mount().await),
            ("programs", self.programs.mount().await),
            ("materials", self.materials.mount().await),
            ("gallery", self.gallery.mount().await),
            ("coordinator", self.coordinator.mount().await),
        ];
        results
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|e| (name, e)))
            .collect()
    }

    pub async fn unmount(&self) {
        self.faculty.unmount().await;
        self.featured_faculty.unmount().await;
        self.events.unmount().await;
        self.news.unmount().await;
        self.published_news.unmount().await;
        self.programs.unmount().await;
        self.materials.unmount().await;
        self.gallery.unmount().await;
        self.coordinator.unmount().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateNewsRequest, NewsStatus, UpdateNewsRequest};
    use crate::store::{LocalBlobStore, SqliteStore};
    use crate::test_support::FailingStore;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_published_news_follows_status_changes() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn RemoteStore> = Arc::new(
            SqliteStore::open(&temp_dir.path().join("test.sqlite"))
                .await
                .unwrap(),
        );
        let blobs = Arc::new(LocalBlobStore::new(temp_dir.path().join("blobs"), "http://x"));
        let site = SiteSync::new(store, blobs);
        assert!(site.mount().await.is_empty());

        let draft = site
            .news
            .create(&CreateNewsRequest {
                title: "Seminar".to_string(),
                content: "On Friday".to_string(),
                author: "HOD".to_string(),
                category: "Events".to_string(),
                status: None,
                publish_date: None,
                excerpt: None,
                image_url: None,
            })
            .await
            .unwrap();
        assert_eq!(draft.status, NewsStatus::Draft);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(site.published_news.items().await.is_empty());

        site.news
            .update(
                &draft.id,
                &UpdateNewsRequest {
                    status: Some(NewsStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(site.published_news.items().await.len(), 1);

        let viewed = site.published_news.increment_views(&draft.id).await.unwrap();
        assert_eq!(viewed.views, 1);

        site.unmount().await;
        assert!(!site.faculty.mounted());
    }

    #[tokio::test]
    async fn test_mount_reports_failed_hooks() {
        let temp_dir = TempDir::new().unwrap();
        let blobs = Arc::new(LocalBlobStore::new(temp_dir.path(), "http://x"));
        let site = SiteSync::new(Arc::new(FailingStore::new("offline")), blobs);

        let failures = site.mount().await;
        assert_eq!(failures.len(), 9);
        assert!(site.events.mounted());
        assert_eq!(site.events.status().await, HookStatus::Error);
    }
}
