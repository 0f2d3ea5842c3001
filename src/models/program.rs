//! Academic program model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, require, require_if_set, Entity};
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    pub id: String,
    pub title: String,
    pub duration: String,
    pub description: String,
    #[serde(default)]
    pub eligibility: Option<String>,
    #[serde(default)]
    pub curriculum: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProgramRequest {
    pub title: String,
    pub duration: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curriculum: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProgramRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub eligibility: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub curriculum: Option<Option<String>>,
}

impl Entity for Program {
    const TABLE: &'static str = "programs";
    type Create = CreateProgramRequest;
    type Update = UpdateProgramRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_create(request: &CreateProgramRequest) -> Result<(), AppError> {
        require("Title", &request.title)?;
        require("Duration", &request.duration)
    }

    fn validate_update(request: &UpdateProgramRequest) -> Result<(), AppError> {
        require_if_set("Title", &request.title)?;
        require_if_set("Duration", &request.duration)
    }
}
