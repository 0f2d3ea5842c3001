//! SQLite-backed row store.
//!
//! Each table keeps its rows as JSON documents next to the system columns, which
//! lets one code path serve every entity. Mutations publish change events once
//! their transaction has committed.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row as _, Sqlite, SqliteConnection};
use tokio::sync::{broadcast, Mutex, MutexGuard};

use super::schema::{format_timestamp, table_spec, TableSpec, TABLES};
use super::{ChangeEvent, ChangeHub, Query, RemoteStore, Row};
use crate::errors::AppError;

type SqlQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Create one document table per entity.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for spec in TABLES {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table}(created_at);
            "#,
            table = spec.name
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Row store over a SQLite pool with an in-process change feed.
pub struct SqliteStore {
    pool: SqlitePool,
    hub: ChangeHub,
    /// Held for the whole of a write transaction. SQLite cannot upgrade two
    /// readers to writers at once, so writers queue here instead.
    writes: Mutex<()>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hub: ChangeHub::new(),
            writes: Mutex::new(()),
        }
    }

    /// Open (or create) the database file and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, AppError> {
        let pool = init_database(db_path).await?;
        Ok(Self::new(pool))
    }

    async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    /// Patch one row inside an open transaction. Returns `(old, new)`.
    async fn patch_row(
        conn: &mut SqliteConnection,
        spec: &TableSpec,
        existing: Row,
        fields: &Row,
    ) -> Result<(Row, Row), AppError> {
        let id = row_id(&existing)?;
        let now = timestamp();
        let mut updated = existing.clone();
        for (column, value) in fields {
            updated.insert(column.clone(), value.clone());
        }
        updated.insert("updated_at".to_string(), Value::from(now.clone()));

        sqlx::query(&format!(
            "UPDATE {} SET updated_at = ?, data = ? WHERE id = ?",
            spec.name
        ))
        .bind(&now)
        .bind(serde_json::to_string(&updated)?)
        .bind(&id)
        .execute(&mut *conn)
        .await?;

        Ok((existing, updated))
    }

    async fn check_parent(
        conn: &mut SqliteConnection,
        spec: &TableSpec,
        fields: &Row,
    ) -> Result<(), AppError> {
        let Some(parent) = spec.parent else {
            return Ok(());
        };
        let Some(value) = fields.get(parent.column) else {
            return Ok(());
        };
        let exists = match value.as_str() {
            Some(parent_id) => {
                sqlx::query(&format!("SELECT 1 FROM {} WHERE id = ?", parent.table))
                    .bind(parent_id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .is_some()
            }
            None => false,
        };
        if !exists {
            return Err(AppError::Remote(format!(
                "insert or update on table \"{}\" violates foreign key constraint on \"{}\"",
                spec.name, parent.column
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, AppError> {
        let spec = table_spec(table)?;
        let (clause, binds) = where_clause(spec, query)?;
        let mut sql = format!("SELECT data FROM {}{}", spec.name, clause);

        if let Some(order) = &query.order {
            spec.check_column(&order.column)?;
            let direction = if order.ascending { "ASC" } else { "DESC" };
            sql.push_str(&format!(
                " ORDER BY json_extract(data, '$.{}') {dir}, rowid {dir}",
                order.column,
                dir = direction
            ));
        }
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut statement = bind_all(sqlx::query(&sql), &binds);
        if let Some(limit) = query.limit {
            statement = statement.bind(limit);
        }

        let records = statement.fetch_all(&self.pool).await?;
        records.iter().map(row_from_record).collect()
    }

    async fn insert(&self, table: &str, fields: Row) -> Result<Row, AppError> {
        let spec = table_spec(table)?;
        let mut row = spec.prepare_insert(fields)?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();
        row.insert("id".to_string(), Value::from(id.clone()));
        row.insert("created_at".to_string(), Value::from(now.clone()));
        row.insert("updated_at".to_string(), Value::from(now.clone()));

        let _writer = self.write_lock().await;
        let mut tx = self.pool.begin().await?;
        Self::check_parent(&mut tx, spec, &row).await?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, created_at, updated_at, data) VALUES (?, ?, ?, ?)",
            spec.name
        ))
        .bind(&id)
        .bind(&now)
        .bind(&now)
        .bind(serde_json::to_string(&row)?)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(table, id = %id, "Inserted row");
        self.hub.publish(ChangeEvent::insert(spec.name, row.clone()));
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, mut fields: Row) -> Result<Row, AppError> {
        let spec = table_spec(table)?;
        spec.check_patch(&fields)?;
        spec.normalize_timestamps(&mut fields)?;

        let _writer = self.write_lock().await;
        let mut tx = self.pool.begin().await?;
        let existing = fetch_by_id(&mut tx, spec, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} row {} not found", spec.name, id)))?;
        Self::check_parent(&mut tx, spec, &fields).await?;
        let (old, new) = Self::patch_row(&mut tx, spec, existing, &fields).await?;
        tx.commit().await?;

        tracing::debug!(table, id, "Updated row");
        self.hub
            .publish(ChangeEvent::update(spec.name, old, new.clone()));
        Ok(new)
    }

    async fn update_where(
        &self,
        table: &str,
        query: &Query,
        mut fields: Row,
    ) -> Result<Vec<Row>, AppError> {
        let spec = table_spec(table)?;
        spec.check_patch(&fields)?;
        spec.normalize_timestamps(&mut fields)?;
        let (clause, binds) = where_clause(spec, query)?;
        let sql = format!("SELECT data FROM {}{}", spec.name, clause);

        let _writer = self.write_lock().await;
        let mut tx = self.pool.begin().await?;
        Self::check_parent(&mut tx, spec, &fields).await?;
        let records = bind_all(sqlx::query(&sql), &binds)
            .fetch_all(&mut *tx)
            .await?;

        let mut changes = Vec::with_capacity(records.len());
        for record in &records {
            let existing = row_from_record(record)?;
            changes.push(Self::patch_row(&mut tx, spec, existing, &fields).await?);
        }
        tx.commit().await?;

        tracing::debug!(table, rows = changes.len(), "Updated matching rows");
        let mut updated = Vec::with_capacity(changes.len());
        for (old, new) in changes {
            self.hub
                .publish(ChangeEvent::update(spec.name, old, new.clone()));
            updated.push(new);
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError> {
        let spec = table_spec(table)?;

        let _writer = self.write_lock().await;
        let mut tx = self.pool.begin().await?;
        let existing = fetch_by_id(&mut tx, spec, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} row {} not found", spec.name, id)))?;

        let mut removed = Vec::new();
        for (child, parent) in spec.children() {
            let records = sqlx::query(&format!(
                "SELECT data FROM {} WHERE json_extract(data, '$.{}') = ?",
                child.name, parent.column
            ))
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
            sqlx::query(&format!(
                "DELETE FROM {} WHERE json_extract(data, '$.{}') = ?",
                child.name, parent.column
            ))
            .bind(id)
            .execute(&mut *tx)
            .await?;
            for record in &records {
                removed.push(ChangeEvent::delete(child.name, row_from_record(record)?));
            }
        }

        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", spec.name))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(table, id, cascaded = removed.len(), "Deleted row");
        for event in removed {
            self.hub.publish(event);
        }
        self.hub.publish(ChangeEvent::delete(spec.name, existing));
        Ok(())
    }

    async fn count(&self, table: &str, query: &Query) -> Result<i64, AppError> {
        let spec = table_spec(table)?;
        let (clause, binds) = where_clause(spec, query)?;
        let sql = format!("SELECT COUNT(*) AS count FROM {}{}", spec.name, clause);
        let record = bind_all(sqlx::query(&sql), &binds)
            .fetch_one(&self.pool)
            .await?;
        Ok(record.get("count"))
    }

    fn changes(&self, table: &str) -> broadcast::Receiver<ChangeEvent> {
        self.hub.subscribe(table)
    }
}

// Helper functions for row conversion

fn timestamp() -> String {
    format_timestamp(Utc::now())
}

fn row_id(row: &Row) -> Result<String, AppError> {
    row.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Decode("Stored row has no id".to_string()))
}

fn row_from_record(record: &SqliteRow) -> Result<Row, AppError> {
    let data: String = record.get("data");
    match serde_json::from_str(&data)? {
        Value::Object(row) => Ok(row),
        _ => Err(AppError::Decode("Stored row is not an object".to_string())),
    }
}

async fn fetch_by_id(
    conn: &mut SqliteConnection,
    spec: &TableSpec,
    id: &str,
) -> Result<Option<Row>, AppError> {
    let record = sqlx::query(&format!("SELECT data FROM {} WHERE id = ?", spec.name))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    record.as_ref().map(row_from_record).transpose()
}

/// Build the `WHERE` clause for the query's equality filters.
fn where_clause(spec: &TableSpec, query: &Query) -> Result<(String, Vec<Value>), AppError> {
    if query.filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut conditions = Vec::with_capacity(query.filters.len());
    let mut binds = Vec::new();
    for (column, value) in &query.filters {
        spec.check_column(column)?;
        if value.is_null() {
            conditions.push(format!("json_extract(data, '$.{}') IS NULL", column));
        } else {
            conditions.push(format!("json_extract(data, '$.{}') = ?", column));
            binds.push(value.clone());
        }
    }

    Ok((format!(" WHERE {}", conditions.join(" AND ")), binds))
}

fn bind_all<'q>(mut statement: SqlQuery<'q>, values: &[Value]) -> SqlQuery<'q> {
    for value in values {
        statement = match value {
            Value::Bool(b) => statement.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => statement.bind(i),
                None => statement.bind(n.as_f64()),
            },
            Value::String(s) => statement.bind(s.clone()),
            other => statement.bind(other.to_string()),
        };
    }
    statement
}
