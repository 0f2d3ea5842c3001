//! Data models for the department site.
//!
//! Field names match the store's snake_case columns. Each entity names its table,
//! the payload accepted on create and the partial payload accepted on update.

mod coordinator;
mod event;
mod faculty;
mod gallery;
mod material;
mod news;
mod program;

pub use coordinator::*;
pub use event::*;
pub use faculty::*;
pub use gallery::*;
pub use material::*;
pub use news::*;
pub use program::*;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::errors::AppError;
use crate::store::Order;

/// A record type kept in one store table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Store table holding this entity.
    const TABLE: &'static str;

    /// Fields accepted on create; identifier and timestamps are server-assigned.
    type Create: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Partial fields accepted on update. `None` fields are left untouched.
    type Update: Serialize + DeserializeOwned + Send + Sync + 'static;

    fn id(&self) -> &str;

    /// Ordering used when the whole table is listed.
    fn default_order() -> Order {
        Order::desc("created_at")
    }

    /// Reject a create payload before it reaches the store.
    fn validate_create(_request: &Self::Create) -> Result<(), AppError> {
        Ok(())
    }

    /// Reject a partial update before it reaches the store. Only fields that
    /// are present are checked.
    fn validate_update(_request: &Self::Update) -> Result<(), AppError> {
        Ok(())
    }

    /// Merge a row coming from the store with the locally cached version of it.
    ///
    /// Only client-derived attributes need carrying over; everything else comes
    /// from the store.
    fn reconcile(incoming: Self, _existing: Option<&Self>) -> Self {
        incoming
    }
}

/// Require a non-blank string field.
pub(crate) fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Require a non-blank string field when an update sets it.
pub(crate) fn require_if_set(field: &str, value: &Option<String>) -> Result<(), AppError> {
    match value {
        Some(value) => require(field, value),
        None => Ok(()),
    }
}

/// Deserialize an updatable nullable column: absent is `None`, `null` is
/// `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}
