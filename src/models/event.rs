//! Department event model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, require, require_if_set, Entity};
use crate::errors::AppError;
use crate::store::Order;

/// Lifecycle of an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Ongoing => "ongoing",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

/// An event listed on the Events page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date_time: DateTime<Utc>,
    pub venue: String,
    pub category: String,
    pub status: EventStatus,
    #[serde(default)]
    pub is_featured: bool,
    /// `None` means registrations are unbounded.
    #[serde(default)]
    pub max_registrations: Option<i64>,
    #[serde(default)]
    pub current_registrations: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_full(&self) -> bool {
        self.max_registrations
            .is_some_and(|max| self.current_registrations >= max)
    }
}

/// Request body for creating an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub date_time: DateTime<Utc>,
    pub venue: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_registrations: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

/// Request body for updating an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_registrations: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub contact_email: Option<Option<String>>,
}

impl Entity for Event {
    const TABLE: &'static str = "events";
    type Create = CreateEventRequest;
    type Update = UpdateEventRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn default_order() -> Order {
        Order::asc("date_time")
    }

    fn validate_create(request: &CreateEventRequest) -> Result<(), AppError> {
        require("Title", &request.title)?;
        require("Venue", &request.venue)?;
        require("Category", &request.category)?;
        if request.max_registrations.is_some_and(|max| max < 0) {
            return Err(AppError::Validation(
                "Max registrations cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_update(request: &UpdateEventRequest) -> Result<(), AppError> {
        require_if_set("Title", &request.title)?;
        require_if_set("Venue", &request.venue)?;
        require_if_set("Category", &request.category)?;
        if request.max_registrations.flatten().is_some_and(|max| max < 0) {
            return Err(AppError::Validation(
                "Max registrations cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}
