//! Coordinator's message hook.

use std::sync::Arc;

use serde_json::Value;

use super::{EntitySync, HookStatus};
use crate::errors::AppError;
use crate::models::{
    CoordinatorMessage, CreateCoordinatorMessageRequest, Entity, UpdateCoordinatorMessageRequest,
};
use crate::store::{encode_fields, Order, Query, RemoteStore, Row};

/// Tracks the active coordinator's message.
pub struct CoordinatorMessageSync {
    hook: EntitySync<CoordinatorMessage>,
}

impl CoordinatorMessageSync {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            hook: EntitySync::with_query(store, Self::active()),
        }
    }

    fn active() -> Query {
        Query::new()
            .eq("is_active", true)
            .order(Order::desc("created_at"))
    }

    pub async fn mount(&self) -> Result<(), AppError> {
        self.hook.mount().await
    }

    pub async fn unmount(&self) {
        self.hook.unmount().await
    }

    pub async fn load(&self) -> Result<(), AppError> {
        self.hook.load().await
    }

    /// The active message, if there is one.
    pub async fn message(&self) -> Option<CoordinatorMessage> {
        self.hook.items().await.into_iter().next()
    }

    /// Deactivate every active message, then insert the new one as the only
    /// active message. A failed deactivation aborts before the insert.
    pub async fn create(
        &self,
        request: &CreateCoordinatorMessageRequest,
    ) -> Result<CoordinatorMessage, AppError> {
        CoordinatorMessage::validate_create(request)?;
        let mut fields = encode_fields(request)?;
        fields.insert("is_active".to_string(), Value::Bool(true));

        let mut deactivate = Row::new();
        deactivate.insert("is_active".to_string(), Value::Bool(false));
        let retired = self
            .hook
            .store()
            .update_where(CoordinatorMessage::TABLE, &Self::active(), deactivate)
            .await?;
        if !retired.is_empty() {
            tracing::info!(count = retired.len(), "Deactivated coordinator messages");
        }

        let generation = self.hook.generation();
        let created = self.hook.insert_fields(fields).await?;
        let retired_ids: Vec<String> = retired
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        self.hook
            .edit_since(generation, |state| {
                for id in &retired_ids {
                    state.remove(id);
                }
            })
            .await;
        Ok(created)
    }

    pub async fn update(
        &self,
        id: &str,
        request: &UpdateCoordinatorMessageRequest,
    ) -> Result<CoordinatorMessage, AppError> {
        self.hook.update(id, request).await
    }

    pub async fn is_loading(&self) -> bool {
        self.hook.is_loading().await
    }

    pub async fn error(&self) -> Option<String> {
        self.hook.error().await
    }

    pub async fn status(&self) -> HookStatus {
        self.hook.status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::test_support::FailingStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(name: &str) -> CreateCoordinatorMessageRequest {
        CreateCoordinatorMessageRequest {
            name: name.to_string(),
            designation: "Programme Coordinator".to_string(),
            message: "Welcome to the department.".to_string(),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_leaves_exactly_one_active_message() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn RemoteStore> = Arc::new(
            SqliteStore::open(&temp_dir.path().join("test.sqlite"))
                .await
                .unwrap(),
        );
        let hook = CoordinatorMessageSync::new(store.clone());
        hook.mount().await.unwrap();
        assert_eq!(hook.message().await, None);

        hook.create(&request("First")).await.unwrap();
        hook.create(&request("Second")).await.unwrap();
        let third = hook.create(&request("Third")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let active = store
            .select("coordinator_message", &Query::new().eq("is_active", true))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["id"], Value::from(third.id.clone()));
        assert_eq!(
            store
                .count("coordinator_message", &Query::new())
                .await
                .unwrap(),
            3
        );

        assert_eq!(hook.message().await.map(|m| m.id), Some(third.id));
        hook.load().await.unwrap();
        assert_eq!(hook.message().await.map(|m| m.name), Some("Third".to_string()));
    }

    #[tokio::test]
    async fn test_failed_deactivation_skips_insert() {
        let hook = CoordinatorMessageSync::new(Arc::new(FailingStore::new("timeout")));
        let err = hook.create(&request("New")).await.unwrap_err();
        assert_eq!(err, AppError::Remote("timeout".to_string()));
        assert_eq!(hook.message().await, None);
    }
}
