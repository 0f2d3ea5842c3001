//! Local collection state and change reconciliation.

use serde::Serialize;

use crate::errors::AppError;
use crate::models::Entity;
use crate::store::{decode_row, ChangeEvent, ChangeKind, Query, Row};

/// Lifecycle of a sync hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStatus {
    Uninitialized,
    Loading,
    Ready,
    Error,
}

/// Cached collection of one entity plus load status.
#[derive(Debug, Clone)]
pub struct SyncState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub status: HookStatus,
    /// Equality filters and ordering of the last load. Change events are
    /// matched against these filters.
    pub filter: Query,
}

impl<T: Entity> SyncState<T> {
    pub fn new(filter: Query) -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            status: HookStatus::Uninitialized,
            filter,
        }
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
        self.status = HookStatus::Loading;
    }

    /// Replace the collection with a fresh load; server order is kept.
    pub fn finish_load(&mut self, items: Vec<T>) {
        self.items = items
            .into_iter()
            .map(|item| {
                let existing = self.items.iter().find(|e| e.id() == item.id());
                T::reconcile(item, existing)
            })
            .collect();
        self.loading = false;
        self.error = None;
        self.status = HookStatus::Ready;
    }

    /// Record a failed load; the previous collection stays.
    pub fn fail_load(&mut self, error: &AppError) {
        self.loading = false;
        self.error = Some(error.message());
        self.status = HookStatus::Error;
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    /// Prepend `item` unless a record with its id is already present.
    pub fn insert(&mut self, item: T) -> bool {
        if self.get(item.id()).is_some() {
            return false;
        }
        self.items.insert(0, T::reconcile(item, None));
        true
    }

    /// Replace the record with the same id, if present.
    pub fn replace(&mut self, item: T) -> bool {
        match self.items.iter().position(|e| e.id() == item.id()) {
            Some(index) => {
                let merged = T::reconcile(item, Some(&self.items[index]));
                self.items[index] = merged;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }

    /// Fold a row written by the store into the collection and return it decoded.
    ///
    /// Rows that do not satisfy the active filters are dropped from the
    /// collection. On a filtered collection an update of an absent row means
    /// the row has moved into view, so it is prepended.
    pub fn apply_row(&mut self, kind: ChangeKind, row: Row) -> Result<T, AppError> {
        let visible = self.filter.matches(&row);
        let item: T = decode_row(T::TABLE, row)?;

        if !visible || kind == ChangeKind::Delete {
            self.remove(item.id());
            return Ok(item);
        }

        match kind {
            ChangeKind::Insert => {
                self.insert(item.clone());
            }
            ChangeKind::Update => {
                if !self.replace(item.clone()) && self.filter.is_filtered() {
                    self.insert(item.clone());
                }
            }
            ChangeKind::Delete => {}
        }
        Ok(item)
    }

    /// Reconcile one change feed notification.
    pub fn apply_event(&mut self, event: &ChangeEvent) -> Result<(), AppError> {
        match (event.kind, &event.new) {
            (ChangeKind::Delete, _) => {
                if let Some(id) = event.row_id() {
                    self.remove(id);
                }
                Ok(())
            }
            (kind, Some(row)) => self.apply_row(kind, row.clone()).map(|_| ()),
            (_, None) => Ok(()),
        }
    }
}
