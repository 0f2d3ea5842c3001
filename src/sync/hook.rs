//! Generic entity sync hook.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::RwLock;

use super::state::{HookStatus, SyncState};
use crate::errors::AppError;
use crate::models::{Entity, Event, News, StudyMaterial};
use crate::store::{
    decode_row, encode_fields, subscribe, ChangeKind, FeedMessage, Query, RemoteStore, Row,
    Subscription,
};

struct Inner<T> {
    store: Arc<dyn RemoteStore>,
    state: RwLock<SyncState<T>>,
    /// Bumped on unmount; results captured under an older value are dropped.
    generation: AtomicU64,
}

impl<T: Entity> Inner<T> {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn load_where(&self, query: Query) -> Result<(), AppError> {
        let generation = self.generation();
        {
            let mut state = self.state.write().await;
            state.filter = query.clone();
            state.begin_load();
        }

        let result = self.fetch(&query).await;

        let mut state = self.state.write().await;
        if self.generation() != generation {
            tracing::debug!(table = T::TABLE, "Discarding load result after unmount");
            return result.map(|_| ());
        }
        match result {
            Ok(items) => {
                tracing::debug!(table = T::TABLE, count = items.len(), "Loaded collection");
                state.finish_load(items);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(table = T::TABLE, error = %e, "Load failed");
                state.fail_load(&e);
                Err(e)
            }
        }
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<T>, AppError> {
        let rows = self.store.select(T::TABLE, query).await?;
        rows.into_iter()
            .map(|row| decode_row(T::TABLE, row))
            .collect()
    }

    /// Re-read the collection after the change feed dropped events.
    async fn resync(&self) {
        let query = self.state.read().await.filter.clone();
        // A failure is recorded on the state.
        let _ = self.load_where(query).await;
    }
}

/// Keeps a local copy of one table (optionally filtered) in sync with the store.
///
/// Mutations go through the store first and are folded into the local
/// collection only when they succeed. The change feed subscription started by
/// [`mount`](Self::mount) reconciles writes made by anyone else.
pub struct EntitySync<T: Entity> {
    inner: Arc<Inner<T>>,
    subscription: Mutex<Option<Subscription>>,
}

impl<T: Entity> EntitySync<T> {
    /// Hook over the whole table in the entity's default order.
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_query(store, Query::new().order(T::default_order()))
    }

    /// Hook over the rows matching `query`.
    pub fn with_query(store: Arc<dyn RemoteStore>, query: Query) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                state: RwLock::new(SyncState::new(query)),
                generation: AtomicU64::new(0),
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribe to the table's change feed and run the initial load.
    pub async fn mount(&self) -> Result<(), AppError> {
        {
            let mut subscription = self
                .subscription
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if subscription.is_none() {
                *subscription = Some(self.listen());
            }
        }
        self.load().await
    }

    pub fn mounted(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop listening and forget local state. In-flight results are discarded.
    pub async fn unmount(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(subscription);

        let mut state = self.inner.state.write().await;
        let filter = state.filter.clone();
        *state = SyncState::new(filter);
    }

    fn listen(&self) -> Subscription {
        let inner = self.inner.clone();
        let store = inner.store.clone();
        let generation = inner.generation();
        subscribe(store.as_ref(), T::TABLE, move |message| {
            let inner = inner.clone();
            async move {
                if inner.generation() != generation {
                    return;
                }
                match message {
                    FeedMessage::Change(event) => {
                        let mut state = inner.state.write().await;
                        if inner.generation() != generation {
                            return;
                        }
                        if let Err(e) = state.apply_event(&event) {
                            tracing::warn!(table = T::TABLE, error = %e, "Ignoring change event");
                        }
                    }
                    FeedMessage::Resync { skipped } => {
                        tracing::info!(table = T::TABLE, skipped, "Reloading after missed changes");
                        inner.resync().await;
                    }
                }
            }
        })
    }

    /// Re-read the collection using the current filters.
    pub async fn load(&self) -> Result<(), AppError> {
        let query = self.inner.state.read().await.filter.clone();
        self.load_where(query).await
    }

    /// Re-read the collection with new filters. Later change events are matched
    /// against these filters.
    pub async fn load_where(&self, query: Query) -> Result<(), AppError> {
        self.inner.load_where(query).await
    }

    /// Insert a new record and prepend it unless the change feed already did.
    pub async fn create(&self, request: &T::Create) -> Result<T, AppError> {
        T::validate_create(request)?;
        let fields = encode_fields(request)?;
        self.insert_fields(fields).await
    }

    pub(crate) async fn insert_fields(&self, fields: Row) -> Result<T, AppError> {
        let generation = self.inner.generation();
        let row = self.inner.store.insert(T::TABLE, fields).await?;
        self.settle(generation, ChangeKind::Insert, row).await
    }

    /// Apply a partial update and replace the local record with the stored row.
    pub async fn update(&self, id: &str, request: &T::Update) -> Result<T, AppError> {
        T::validate_update(request)?;
        let fields = encode_fields(request)?;
        self.update_fields(id, fields).await
    }

    pub(crate) async fn update_fields(&self, id: &str, fields: Row) -> Result<T, AppError> {
        let generation = self.inner.generation();
        let row = self.inner.store.update(T::TABLE, id, fields).await?;
        self.settle(generation, ChangeKind::Update, row).await
    }

    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        let generation = self.inner.generation();
        self.inner.store.delete(T::TABLE, id).await?;

        let mut state = self.inner.state.write().await;
        if self.inner.generation() == generation {
            state.remove(id);
        }
        Ok(())
    }

    /// Fold a store result into local state unless the hook was unmounted meanwhile.
    async fn settle(&self, generation: u64, kind: ChangeKind, row: Row) -> Result<T, AppError> {
        let mut state = self.inner.state.write().await;
        if self.inner.generation() != generation {
            return decode_row(T::TABLE, row);
        }
        state.apply_row(kind, row)
    }

    /// Read one row straight from the store.
    pub(crate) async fn fetch_row(&self, id: &str) -> Result<Row, AppError> {
        let query = Query::new().eq("id", id).limit(1);
        self.inner
            .store
            .select(T::TABLE, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} row {} not found", T::TABLE, id)))
    }

    /// Read the counter from `row` and write back one more.
    ///
    /// Two concurrent increments may both read the same value; the store keeps
    /// whichever write lands last.
    async fn bump(&self, id: &str, column: &str, row: &Row) -> Result<T, AppError> {
        let current = row.get(column).and_then(Value::as_i64).unwrap_or(0);
        let mut fields = Row::new();
        fields.insert(column.to_string(), Value::from(current + 1));
        self.update_fields(id, fields).await
    }

    pub(crate) async fn increment_counter(&self, id: &str, column: &str) -> Result<T, AppError> {
        let row = self.fetch_row(id).await?;
        self.bump(id, column, &row).await
    }

    /// Run `f` against local state unless the hook was unmounted since `generation`.
    pub(crate) async fn edit_since<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut SyncState<T>) -> R,
    ) -> Option<R> {
        let mut state = self.inner.state.write().await;
        (self.inner.generation() == generation).then(|| f(&mut state))
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.generation()
    }

    pub(crate) fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.store
    }

    /// Snapshot of the local collection.
    pub async fn items(&self) -> Vec<T> {
        self.inner.state.read().await.items.clone()
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.inner.state.read().await.get(id).cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.read().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.state.read().await.error.clone()
    }

    pub async fn status(&self) -> HookStatus {
        self.inner.state.read().await.status
    }
}

impl<T: Entity> Drop for EntitySync<T> {
    fn drop(&mut self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl EntitySync<StudyMaterial> {
    pub async fn increment_downloads(&self, id: &str) -> Result<StudyMaterial, AppError> {
        self.increment_counter(id, "downloads").await
    }
}

impl EntitySync<News> {
    pub async fn increment_views(&self, id: &str) -> Result<News, AppError> {
        self.increment_counter(id, "views").await
    }
}

impl EntitySync<Event> {
    /// Register one attendee. Refused once `max_registrations` is reached.
    pub async fn increment_registrations(&self, id: &str) -> Result<Event, AppError> {
        let row = self.fetch_row(id).await?;
        let event: Event = decode_row(Event::TABLE, row.clone())?;
        if event.is_full() {
            return Err(AppError::Validation(format!(
                "Event \"{}\" is full",
                event.title
            )));
        }
        self.bump(id, "current_registrations", &row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CreateEventRequest, CreateFacultyRequest, CreateProgramRequest, CreateStudyMaterialRequest,
        Faculty, Program, UpdateEventRequest, UpdateFacultyRequest,
    };
    use crate::store::SqliteStore;
    use crate::test_support::{GatedStore, FailingStore};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn sqlite() -> (TempDir, Arc<dyn RemoteStore>) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteStore::open(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to open store");
        (temp_dir, Arc::new(store))
    }

    fn faculty_request(name: &str) -> CreateFacultyRequest {
        CreateFacultyRequest {
            name: name.to_string(),
            designation: "Assistant Professor".to_string(),
            specialization: vec!["Databases".to_string()],
            email: format!("{}@college.edu", name.to_lowercase()),
            phone: None,
            experience: None,
            education: None,
            publications: None,
            photo_url: None,
            bio: None,
            is_featured: None,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_create_then_load_round_trip() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Faculty>::new(store);
        hook.mount().await.unwrap();

        let created = hook.create(&faculty_request("Meera")).await.unwrap();
        assert!(!created.id.is_empty());
        assert!(!created.is_featured);

        hook.load().await.unwrap();
        let items = hook.items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], created);
    }

    #[tokio::test]
    async fn test_create_is_not_duplicated_by_change_feed_echo() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Faculty>::new(store);
        hook.mount().await.unwrap();

        let created = hook.create(&faculty_request("Meera")).await.unwrap();
        settle().await;

        let items = hook.items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, created.id);
    }

    #[tokio::test]
    async fn test_interleaved_writers_leave_no_duplicates() {
        let (_dir, store) = sqlite().await;
        let hook = Arc::new(EntitySync::<Faculty>::new(store.clone()));
        let other = EntitySync::<Faculty>::new(store);
        hook.mount().await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..10 {
            let hook = hook.clone();
            tasks.push(tokio::spawn(async move {
                hook.create(&faculty_request(&format!("Local{i}"))).await
            }));
        }
        for i in 0..10 {
            other
                .create(&faculty_request(&format!("Remote{i}")))
                .await
                .unwrap();
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        settle().await;

        let items = hook.items().await;
        let mut ids: Vec<_> = items.iter().map(|f| f.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), items.len());
        assert_eq!(items.len(), 20);
    }

    #[tokio::test]
    async fn test_remote_writes_are_reconciled() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Faculty>::new(store.clone());
        let admin = EntitySync::<Faculty>::new(store);
        hook.mount().await.unwrap();

        let created = admin.create(&faculty_request("Arun")).await.unwrap();
        settle().await;
        assert_eq!(hook.items().await.len(), 1);

        let update = UpdateFacultyRequest {
            designation: Some("Professor".to_string()),
            ..Default::default()
        };
        admin.update(&created.id, &update).await.unwrap();
        settle().await;
        assert_eq!(hook.items().await[0].designation, "Professor");

        admin.remove(&created.id).await.unwrap();
        settle().await;
        assert!(hook.items().await.is_empty());
    }

    #[tokio::test]
    async fn test_lagging_feed_triggers_reload() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Program>::new(store.clone());
        let writer = EntitySync::<Program>::new(store);
        hook.mount().await.unwrap();

        // Stall the listener on the state lock so the feed overflows.
        let stalled = hook.inner.state.read().await;
        for i in 0..300 {
            writer
                .create(&CreateProgramRequest {
                    title: format!("Program {i}"),
                    duration: "3 years".to_string(),
                    description: "UG".to_string(),
                    eligibility: None,
                    curriculum: None,
                })
                .await
                .unwrap();
        }
        drop(stalled);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(hook.items().await.len(), 300);
        assert_eq!(hook.status().await, HookStatus::Ready);
    }

    #[tokio::test]
    async fn test_filtered_hook_follows_featured_flag() {
        let (_dir, store) = sqlite().await;
        let featured = EntitySync::<Faculty>::with_query(
            store.clone(),
            Query::new()
                .eq("is_featured", true)
                .order(crate::store::Order::desc("created_at")),
        );
        let admin = EntitySync::<Faculty>::new(store);
        featured.mount().await.unwrap();

        let created = admin.create(&faculty_request("Kavya")).await.unwrap();
        settle().await;
        assert!(featured.items().await.is_empty());

        let promote = UpdateFacultyRequest {
            is_featured: Some(true),
            ..Default::default()
        };
        admin.update(&created.id, &promote).await.unwrap();
        settle().await;
        assert_eq!(featured.items().await.len(), 1);
    }

    #[tokio::test]
    async fn test_validation_runs_before_store() {
        let hook = EntitySync::<Faculty>::new(Arc::new(FailingStore::new("unreachable")));
        let err = hook.create(&faculty_request("  ")).await.unwrap_err();
        assert_eq!(err, AppError::Validation("Name is required".to_string()));
    }

    #[tokio::test]
    async fn test_blank_update_is_rejected_and_row_kept() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Faculty>::new(store);
        hook.mount().await.unwrap();
        let created = hook.create(&faculty_request("Ravi")).await.unwrap();

        let blank = UpdateFacultyRequest {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        let err = hook.update(&created.id, &blank).await.unwrap_err();
        assert_eq!(err, AppError::Validation("Name is required".to_string()));

        let row = hook.fetch_row(&created.id).await.unwrap();
        assert_eq!(row["name"], serde_json::json!("Ravi"));
        assert_eq!(hook.items().await, vec![created]);
    }

    #[tokio::test]
    async fn test_failed_mutations_leave_state_unchanged() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Faculty>::new(store);
        hook.mount().await.unwrap();
        let created = hook.create(&faculty_request("Ravi")).await.unwrap();

        let err = hook
            .update("missing", &UpdateFacultyRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(hook.remove("missing").await.is_err());
        assert_eq!(hook.items().await, vec![created]);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_items() {
        let store = Arc::new(FailingStore::new("connection refused"));
        let hook = EntitySync::<Faculty>::new(store);

        let err = hook.mount().await.unwrap_err();
        assert_eq!(err, AppError::Remote("connection refused".to_string()));
        assert_eq!(hook.status().await, HookStatus::Error);
        assert_eq!(hook.error().await.as_deref(), Some("connection refused"));
        assert!(!hook.is_loading().await);
        assert!(hook.items().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_table_loads_ready() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Event>::new(store);
        assert_eq!(hook.status().await, HookStatus::Uninitialized);

        hook.mount().await.unwrap();

        assert_eq!(hook.status().await, HookStatus::Ready);
        assert!(hook.items().await.is_empty());
        assert_eq!(hook.error().await, None);
        assert!(!hook.is_loading().await);
    }

    #[tokio::test]
    async fn test_unmount_during_load_discards_result() {
        let (_dir, sqlite) = sqlite().await;
        EntitySync::<Faculty>::new(sqlite.clone())
            .create(&faculty_request("Sita"))
            .await
            .unwrap();

        let gated = Arc::new(GatedStore::new(sqlite));
        let hook = Arc::new(EntitySync::<Faculty>::new(gated.clone()));

        let loading = {
            let hook = hook.clone();
            tokio::spawn(async move { hook.load().await })
        };
        gated.wait_for_select().await;
        assert!(hook.is_loading().await);

        hook.unmount().await;
        gated.release();
        loading.await.unwrap().unwrap();

        assert!(hook.items().await.is_empty());
        assert_eq!(hook.status().await, HookStatus::Uninitialized);
        assert!(!hook.mounted());
    }

    #[tokio::test]
    async fn test_unmount_stops_reconciliation() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Faculty>::new(store.clone());
        let admin = EntitySync::<Faculty>::new(store);
        hook.mount().await.unwrap();
        assert!(hook.mounted());

        hook.unmount().await;
        admin.create(&faculty_request("Late")).await.unwrap();
        settle().await;

        assert!(hook.items().await.is_empty());
    }

    fn material_request() -> CreateStudyMaterialRequest {
        CreateStudyMaterialRequest {
            title: "DBMS notes".to_string(),
            description: None,
            course: "BCA".to_string(),
            subject: "DBMS".to_string(),
            semester: Some("3".to_string()),
            kind: "notes".to_string(),
            file_url: "https://files.example/dbms.pdf".to_string(),
            file_size: None,
            uploaded_by: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_increment_downloads() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<StudyMaterial>::new(store);
        hook.mount().await.unwrap();
        let material = hook.create(&material_request()).await.unwrap();
        assert_eq!(material.downloads, 0);

        let updated = hook.increment_downloads(&material.id).await.unwrap();
        assert_eq!(updated.downloads, 1);
        assert_eq!(hook.get(&material.id).await.unwrap().downloads, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_increments_may_lose_an_update() {
        let (_dir, store) = sqlite().await;
        let hook = Arc::new(EntitySync::<StudyMaterial>::new(store));
        let material = hook.create(&material_request()).await.unwrap();

        let first = tokio::spawn({
            let hook = hook.clone();
            let id = material.id.clone();
            async move { hook.increment_downloads(&id).await }
        });
        let second = tokio::spawn({
            let hook = hook.clone();
            let id = material.id.clone();
            async move { hook.increment_downloads(&id).await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let row = hook.fetch_row(&material.id).await.unwrap();
        let downloads = row["downloads"].as_i64().unwrap();
        assert!(downloads == 1 || downloads == 2, "downloads = {downloads}");
    }

    #[tokio::test]
    async fn test_increment_missing_row() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<StudyMaterial>::new(store);
        let err = hook.increment_downloads("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_registrations_stop_at_capacity() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Event>::new(store);
        let event = hook
            .create(&CreateEventRequest {
                title: "Hackathon".to_string(),
                description: "24 hours".to_string(),
                date_time: Utc::now() + ChronoDuration::days(7),
                venue: "Lab 2".to_string(),
                category: "Technical".to_string(),
                status: None,
                is_featured: None,
                max_registrations: Some(1),
                image_url: None,
                contact_email: None,
            })
            .await
            .unwrap();

        let registered = hook.increment_registrations(&event.id).await.unwrap();
        assert_eq!(registered.current_registrations, 1);

        let err = hook.increment_registrations(&event.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let row = hook.fetch_row(&event.id).await.unwrap();
        assert_eq!(row["current_registrations"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn test_update_can_clear_capacity() {
        let (_dir, store) = sqlite().await;
        let hook = EntitySync::<Event>::new(store);
        let event = hook
            .create(&CreateEventRequest {
                title: "Seminar".to_string(),
                description: "Guest talk".to_string(),
                date_time: Utc::now() + ChronoDuration::days(3),
                venue: "Hall A".to_string(),
                category: "Academic".to_string(),
                status: None,
                is_featured: None,
                max_registrations: Some(1),
                image_url: Some("https://cdn.example/seminar.png".to_string()),
                contact_email: None,
            })
            .await
            .unwrap();

        let cleared: UpdateEventRequest =
            serde_json::from_value(serde_json::json!({ "max_registrations": null }))
                .unwrap();
        let updated = hook.update(&event.id, &cleared).await.unwrap();
        assert_eq!(updated.max_registrations, None);
        assert_eq!(
            updated.image_url.as_deref(),
            Some("https://cdn.example/seminar.png")
        );

        hook.increment_registrations(&event.id).await.unwrap();
        let registered = hook.increment_registrations(&event.id).await.unwrap();
        assert_eq!(registered.current_registrations, 2);
    }
}
