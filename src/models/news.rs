//! News article model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, require, require_if_set, Entity};
use crate::errors::AppError;

/// Publication state of an article.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NewsStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl NewsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsStatus::Draft => "draft",
            NewsStatus::Published => "published",
            NewsStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct News {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
    pub status: NewsStatus,
    #[serde(default)]
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNewsRequest {
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NewsStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNewsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NewsStatus>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub excerpt: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<Option<String>>,
}

impl Entity for News {
    const TABLE: &'static str = "news";
    type Create = CreateNewsRequest;
    type Update = UpdateNewsRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_create(request: &CreateNewsRequest) -> Result<(), AppError> {
        require("Title", &request.title)?;
        require("Content", &request.content)?;
        require("Author", &request.author)
    }

    fn validate_update(request: &UpdateNewsRequest) -> Result<(), AppError> {
        require_if_set("Title", &request.title)?;
        require_if_set("Content", &request.content)?;
        require_if_set("Author", &request.author)
    }
}
