//! Faculty member model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, require, require_if_set, Entity};
use crate::errors::AppError;

/// A faculty member shown on the Faculty page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Faculty {
    pub id: String,
    pub name: String,
    pub designation: String,
    #[serde(default)]
    pub specialization: Vec<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub publications: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a faculty member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFacultyRequest {
    pub name: String,
    pub designation: String,
    #[serde(default)]
    pub specialization: Vec<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

/// Request body for updating a faculty member.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFacultyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub experience: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub education: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub publications: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub bio: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

impl Entity for Faculty {
    const TABLE: &'static str = "faculty";
    type Create = CreateFacultyRequest;
    type Update = UpdateFacultyRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_create(request: &CreateFacultyRequest) -> Result<(), AppError> {
        require("Name", &request.name)?;
        require("Designation", &request.designation)?;
        require("Email", &request.email)
    }

    fn validate_update(request: &UpdateFacultyRequest) -> Result<(), AppError> {
        require_if_set("Name", &request.name)?;
        require_if_set("Designation", &request.designation)?;
        require_if_set("Email", &request.email)
    }
}
