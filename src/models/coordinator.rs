//! Coordinator's message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{default_true, nullable, require, require_if_set, Entity};
use crate::errors::AppError;

/// The message shown on the home page. At most one is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinatorMessage {
    pub id: String,
    pub name: String,
    pub designation: String,
    pub message: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCoordinatorMessageRequest {
    pub name: String,
    pub designation: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCoordinatorMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<Option<String>>,
}

impl Entity for CoordinatorMessage {
    const TABLE: &'static str = "coordinator_message";
    type Create = CreateCoordinatorMessageRequest;
    type Update = UpdateCoordinatorMessageRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_create(request: &CreateCoordinatorMessageRequest) -> Result<(), AppError> {
        require("Name", &request.name)?;
        require("Designation", &request.designation)?;
        require("Message", &request.message)
    }

    fn validate_update(request: &UpdateCoordinatorMessageRequest) -> Result<(), AppError> {
        require_if_set("Name", &request.name)?;
        require_if_set("Designation", &request.designation)?;
        require_if_set("Message", &request.message)
    }
}
