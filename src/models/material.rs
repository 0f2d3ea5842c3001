//! Study material model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, require, require_if_set, Entity};
use crate::errors::AppError;

/// A downloadable study resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyMaterial {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub course: String,
    pub subject: String,
    #[serde(default)]
    pub semester: Option<String>,
    /// Free-form kind tag such as "notes", "syllabus" or "question-paper".
    #[serde(rename = "type")]
    pub kind: String,
    pub file_url: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    pub uploaded_by: String,
    #[serde(default)]
    pub downloads: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudyMaterialRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub course: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    pub uploaded_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStudyMaterialRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub semester: Option<Option<String>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_size: Option<Option<i64>>,
}

impl Entity for StudyMaterial {
    const TABLE: &'static str = "study_materials";
    type Create = CreateStudyMaterialRequest;
    type Update = UpdateStudyMaterialRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_create(request: &CreateStudyMaterialRequest) -> Result<(), AppError> {
        require("Title", &request.title)?;
        require("Course", &request.course)?;
        require("Subject", &request.subject)?;
        require("File URL", &request.file_url)
    }

    fn validate_update(request: &UpdateStudyMaterialRequest) -> Result<(), AppError> {
        require_if_set("Title", &request.title)?;
        require_if_set("Course", &request.course)?;
        require_if_set("Subject", &request.subject)?;
        require_if_set("File URL", &request.file_url)
    }
}
