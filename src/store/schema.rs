//! Table definitions for the row store: writable columns, required columns,
//! column defaults and parent relations.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::Row;
use crate::errors::AppError;

/// Columns the store manages itself.
pub const SYSTEM_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

#[derive(Debug, Clone, Copy)]
pub enum ColumnDefault {
    Bool(bool),
    Int(i64),
    Text(&'static str),
    EmptyList,
}

impl ColumnDefault {
    fn value(&self) -> Value {
        match self {
            ColumnDefault::Bool(b) => Value::Bool(*b),
            ColumnDefault::Int(i) => Value::from(*i),
            ColumnDefault::Text(s) => Value::from(*s),
            ColumnDefault::EmptyList => Value::Array(Vec::new()),
        }
    }
}

/// A child column referencing a parent table's `id`. Deleting the parent deletes the child.
#[derive(Debug, Clone, Copy)]
pub struct ParentRef {
    pub column: &'static str,
    pub table: &'static str,
}

#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub required: &'static [&'static str],
    pub defaults: &'static [(&'static str, ColumnDefault)],
    /// Columns holding instants; stored in one fixed-width UTC form so text order is time order.
    pub timestamps: &'static [&'static str],
    pub parent: Option<ParentRef>,
}

/// The stored form of every instant: UTC, microsecond precision, `Z` suffix.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub static TABLES: &[TableSpec] = &[
    TableSpec {
        name: "faculty",
        columns: &[
            "name",
            "designation",
            "specialization",
            "email",
            "phone",
            "experience",
            "education",
            "publications",
            "photo_url",
            "bio",
            "is_featured",
        ],
        required: &["name", "designation", "email"],
        defaults: &[
            ("specialization", ColumnDefault::EmptyList),
            ("is_featured", ColumnDefault::Bool(false)),
        ],
        timestamps: &[],
        parent: None,
    },
    TableSpec {
        name: "events",
        columns: &[
            "title",
            "description",
            "date_time",
            "venue",
            "category",
            "status",
            "is_featured",
            "max_registrations",
            "current_registrations",
            "image_url",
            "contact_email",
        ],
        required: &["title", "description", "date_time", "venue", "category"],
        defaults: &[
            ("status", ColumnDefault::Text("upcoming")),
            ("is_featured", ColumnDefault::Bool(false)),
            ("current_registrations", ColumnDefault::Int(0)),
        ],
        timestamps: &["date_time"],
        parent: None,
    },
    TableSpec {
        name: "news",
        columns: &[
            "title",
            "content",
            "author",
            "category",
            "status",
            "publish_date",
            "views",
            "excerpt",
            "image_url",
        ],
        required: &["title", "content", "author", "category"],
        defaults: &[
            ("status", ColumnDefault::Text("draft")),
            ("views", ColumnDefault::Int(0)),
        ],
        timestamps: &["publish_date"],
        parent: None,
    },
    TableSpec {
        name: "programs",
        columns: &[
            "title",
            "duration",
            "description",
            "eligibility",
            "curriculum",
        ],
        required: &["title", "duration", "description"],
        defaults: &[],
        timestamps: &[],
        parent: None,
    },
    TableSpec {
        name: "study_materials",
        columns: &[
            "title",
            "description",
            "course",
            "subject",
            "semester",
            "type",
            "file_url",
            "file_size",
            "uploaded_by",
            "downloads",
        ],
        required: &["title", "course", "subject", "type", "file_url", "uploaded_by"],
        defaults: &[("downloads", ColumnDefault::Int(0))],
        timestamps: &[],
        parent: None,
    },
    TableSpec {
        name: "gallery_albums",
        columns: &[
            "name",
            "description",
            "category",
            "status",
            "cover_image_url",
        ],
        required: &["name"],
        defaults: &[
            ("category", ColumnDefault::Text("General")),
            ("status", ColumnDefault::Text("draft")),
        ],
        timestamps: &[],
        parent: None,
    },
    TableSpec {
        name: "gallery_photos",
        columns: &[
            "album_id",
            "title",
            "description",
            "image_url",
            "file_size",
            "uploaded_by",
        ],
        required: &["album_id", "image_url"],
        defaults: &[("uploaded_by", ColumnDefault::Text("admin"))],
        timestamps: &[],
        parent: Some(ParentRef {
            column: "album_id",
            table: "gallery_albums",
        }),
    },
    TableSpec {
        name: "coordinator_message",
        columns: &["name", "designation", "message", "photo_url", "is_active"],
        required: &["name", "designation", "message"],
        defaults: &[("is_active", ColumnDefault::Bool(true))],
        timestamps: &[],
        parent: None,
    },
];

/// Look up a table by name.
pub fn table_spec(name: &str) -> Result<&'static TableSpec, AppError> {
    TABLES
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| AppError::Remote(format!("relation \"{}\" does not exist", name)))
}

impl TableSpec {
    /// Whether `column` can appear in filters and ordering.
    pub fn knows(&self, column: &str) -> bool {
        SYSTEM_COLUMNS.contains(&column) || self.columns.contains(&column)
    }

    pub fn check_column(&self, column: &str) -> Result<(), AppError> {
        if self.knows(column) {
            Ok(())
        } else {
            Err(self.unknown_column(column))
        }
    }

    /// Tables whose rows reference this one.
    pub fn children(&self) -> impl Iterator<Item = (&'static TableSpec, ParentRef)> + '_ {
        TABLES.iter().filter_map(move |spec| {
            spec.parent
                .filter(|parent| parent.table == self.name)
                .map(|parent| (spec, parent))
        })
    }

    /// Validate insert fields and fill in defaults and absent nullable columns.
    pub fn prepare_insert(&self, mut fields: Row) -> Result<Row, AppError> {
        for column in fields.keys() {
            if !self.columns.contains(&column.as_str()) {
                return Err(self.unknown_column(column));
            }
        }
        self.normalize_timestamps(&mut fields)?;

        for (column, default) in self.defaults {
            if fields.get(*column).map_or(true, Value::is_null) {
                fields.insert(column.to_string(), default.value());
            }
        }

        for column in self.required {
            if fields.get(*column).map_or(true, Value::is_null) {
                return Err(self.not_null_violation(column));
            }
        }

        for column in self.columns {
            fields.entry(column.to_string()).or_insert(Value::Null);
        }

        Ok(fields)
    }

    /// Validate a partial update.
    pub fn check_patch(&self, fields: &Row) -> Result<(), AppError> {
        for (column, value) in fields {
            if SYSTEM_COLUMNS.contains(&column.as_str()) {
                return Err(AppError::Remote(format!(
                    "column \"{}\" of relation \"{}\" can only be set by the server",
                    column, self.name
                )));
            }
            if !self.columns.contains(&column.as_str()) {
                return Err(self.unknown_column(column));
            }
            if value.is_null() && self.required.contains(&column.as_str()) {
                return Err(self.not_null_violation(column));
            }
        }
        Ok(())
    }

    /// Rewrite present timestamp columns into the stored form.
    pub fn normalize_timestamps(&self, fields: &mut Row) -> Result<(), AppError> {
        for column in self.timestamps {
            let Some(Value::String(text)) = fields.get(*column) else {
                continue;
            };
            let instant = DateTime::parse_from_rfc3339(text).map_err(|_| {
                AppError::Remote(format!(
                    "invalid input syntax for type timestamp with time zone: \"{}\"",
                    text
                ))
            })?;
            let stored = format_timestamp(instant.with_timezone(&Utc));
            fields.insert(column.to_string(), Value::from(stored));
        }
        Ok(())
    }

    fn unknown_column(&self, column: &str) -> AppError {
        AppError::Remote(format!(
            "column \"{}\" of relation \"{}\" does not exist",
            column, self.name
        ))
    }

    fn not_null_violation(&self, column: &str) -> AppError {
        AppError::Remote(format!(
            "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
            column, self.name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unknown_table() {
        assert!(matches!(table_spec("topics"), Err(AppError::Remote(_))));
    }

    #[test]
    fn test_prepare_insert_applies_defaults_and_nulls() {
        let spec = table_spec("news").unwrap();
        let prepared = spec
            .prepare_insert(row(json!({
                "title": "Convocation", "content": "...", "author": "Office", "category": "Academic"
            })))
            .unwrap();

        assert_eq!(prepared["status"], json!("draft"));
        assert_eq!(prepared["views"], json!(0));
        assert_eq!(prepared["excerpt"], Value::Null);
    }

    #[test]
    fn test_prepare_insert_rejects_missing_required_and_unknown_columns() {
        let spec = table_spec("programs").unwrap();
        let missing = spec
            .prepare_insert(row(json!({ "title": "MCA", "duration": "2 years" })))
            .unwrap_err();
        assert!(missing.message().contains("\"description\""));

        let unknown = spec
            .prepare_insert(row(json!({
                "title": "MCA", "duration": "2 years", "description": "x", "fees": 10
            })))
            .unwrap_err();
        assert!(unknown.message().contains("\"fees\""));
    }

    #[test]
    fn test_check_patch_rejects_system_columns() {
        let spec = table_spec("faculty").unwrap();
        assert!(spec.check_patch(&row(json!({ "id": "other" }))).is_err());
        assert!(spec.check_patch(&row(json!({ "name": null }))).is_err());
        assert!(spec.check_patch(&row(json!({ "phone": null }))).is_ok());
    }

    #[test]
    fn test_children() {
        let albums = table_spec("gallery_albums").unwrap();
        let children: Vec<_> = albums.children().map(|(spec, _)| spec.name).collect();
        assert_eq!(children, vec!["gallery_photos"]);
    }

    #[test]
    fn test_timestamps_are_stored_in_one_form() {
        let spec = table_spec("events").unwrap();
        let mut fields = row(json!({
            "date_time": "2030-01-01T15:30:00.5+05:30",
            "title": "2030-01-01T10:00:00Z"
        }));
        spec.normalize_timestamps(&mut fields).unwrap();
        assert_eq!(fields["date_time"], json!("2030-01-01T10:00:00.500000Z"));
        assert_eq!(fields["title"], json!("2030-01-01T10:00:00Z"));

        let mut bad = row(json!({ "date_time": "next tuesday" }));
        assert!(matches!(
            spec.normalize_timestamps(&mut bad),
            Err(AppError::Remote(_))
        ));
    }
}
