//! Admin dashboard counts.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use super::HookStatus;
use crate::errors::AppError;
use crate::models::{Entity, Event, Faculty, News, StudyMaterial};
use crate::store::{Query, RemoteStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub faculty_count: i64,
    pub events_count: i64,
    pub materials_count: i64,
    pub news_count: i64,
}

#[derive(Debug)]
struct StatsState {
    stats: DashboardStats,
    loading: bool,
    error: Option<String>,
    status: HookStatus,
}

/// Fetches the four dashboard counts together. Counts are only published
/// when every query succeeds.
pub struct DashboardStatsSync {
    store: Arc<dyn RemoteStore>,
    state: RwLock<StatsState>,
}

impl DashboardStatsSync {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            state: RwLock::new(StatsState {
                stats: DashboardStats::default(),
                loading: false,
                error: None,
                status: HookStatus::Uninitialized,
            }),
        }
    }

    pub async fn load(&self) -> Result<DashboardStats, AppError> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.status = HookStatus::Loading;
        }

        let all = Query::new();
        let result = tokio::try_join!(
            self.store.count(Faculty::TABLE, &all),
            self.store.count(Event::TABLE, &all),
            self.store.count(StudyMaterial::TABLE, &all),
            self.store.count(News::TABLE, &all),
        );

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok((faculty_count, events_count, materials_count, news_count)) => {
                state.stats = DashboardStats {
                    faculty_count,
                    events_count,
                    materials_count,
                    news_count,
                };
                state.error = None;
                state.status = HookStatus::Ready;
                Ok(state.stats)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dashboard counts failed");
                state.error = Some(e.message());
                state.status = HookStatus::Error;
                Err(e)
            }
        }
    }

    pub async fn stats(&self) -> DashboardStats {
        self.state.read().await.stats
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn status(&self) -> HookStatus {
        self.state.read().await.status
    }
}
