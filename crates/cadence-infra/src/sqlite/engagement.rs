//! SQLite engagement event store and fetch cursors.
//!
//! Events are written with `INSERT OR IGNORE` so re-fetching a page is
//! harmless. The unanswered backlog is every stored event without a
//! conversation record, narrowed by kind and rejected-post count in SQL so
//! the `LIMIT` only ever counts candidates.

use cadence_core::repository::{BacklogFilter, EngagementRepository};
use cadence_types::engagement::{EngagementEvent, EngagementKind};
use cadence_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of [`EngagementRepository`].
pub struct SqliteEngagementRepository {
    pool: DatabasePool,
}

impl SqliteEngagementRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Total stored events (status output).
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM engagement_events")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(count)
    }
}

struct EventRow {
    external_id: String,
    kind: String,
    actor_id: String,
    actor_handle: String,
    text: Option<String>,
    conversation_id: Option<String>,
    parent_event_id: Option<String>,
    created_at: String,
}

impl EventRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            external_id: row.try_get("external_id")?,
            kind: row.try_get("kind")?,
            actor_id: row.try_get("actor_id")?,
            actor_handle: row.try_get("actor_handle")?,
            text: row.try_get("text")?,
            conversation_id: row.try_get("conversation_id")?,
            parent_event_id: row.try_get("parent_event_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_event(self) -> Result<EngagementEvent, RepositoryError> {
        let kind: EngagementKind = self.kind.parse().map_err(RepositoryError::Query)?;
        Ok(EngagementEvent {
            external_id: self.external_id,
            kind,
            actor_id: self.actor_id,
            actor_handle: self.actor_handle,
            text: self.text,
            created_at: parse_datetime(&self.created_at)?,
            conversation_id: self.conversation_id,
            parent_event_id: self.parent_event_id,
        })
    }
}

impl EngagementRepository for SqliteEngagementRepository {
    async fn save_events(&self, events: &[EngagementEvent]) -> Result<u64, RepositoryError> {
        if events.is_empty() {
            return Ok(0);
        }

        let fetched_at = format_datetime(&Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        let mut inserted = 0;

        for event in events {
            let result = sqlx::query(
                r#"INSERT OR IGNORE INTO engagement_events (external_id, kind, actor_id, actor_handle, text, conversation_id, parent_event_id, created_at, fetched_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&event.external_id)
            .bind(event.kind.to_string())
            .bind(&event.actor_id)
            .bind(&event.actor_handle)
            .bind(&event.text)
            .bind(&event.conversation_id)
            .bind(&event.parent_event_id)
            .bind(format_datetime(&event.created_at))
            .bind(&fetched_at)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(query_error)?;
        Ok(inserted)
    }

    async fn get(&self, external_id: &str) -> Result<Option<EngagementEvent>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM engagement_events WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|row| EventRow::from_row(&row).map_err(query_error)?.into_event())
            .transpose()
    }

    async fn unanswered(&self, filter: &BacklogFilter) -> Result<Vec<EngagementEvent>, RepositoryError> {
        if filter.kinds.is_empty() {
            return Ok(Vec::new());
        }

        let kind_params = vec!["?"; filter.kinds.len()].join(", ");
        let sql = format!(
            r#"SELECT e.* FROM engagement_events e
               LEFT JOIN conversation_records c ON c.source_event_id = e.external_id
               WHERE c.source_event_id IS NULL
                 AND e.created_at > ?
                 AND e.post_failures < ?
                 AND e.kind IN ({kind_params})
               ORDER BY e.created_at ASC
               LIMIT ?"#
        );

        let mut query = sqlx::query(&sql)
            .bind(format_datetime(&filter.since))
            .bind(i64::from(filter.max_failures));
        for kind in &filter.kinds {
            query = query.bind(kind.to_string());
        }
        let rows = query
            .bind(filter.limit)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            events.push(EventRow::from_row(row).map_err(query_error)?.into_event()?);
        }
        Ok(events)
    }

    async fn record_failure(&self, external_id: &str, error: &str) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            r#"UPDATE engagement_events
               SET post_failures = post_failures + 1, last_post_error = ?
               WHERE external_id = ?
               RETURNING post_failures"#,
        )
        .bind(error)
        .bind(external_id)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(query_error)?;

        match row {
            Some(row) => {
                let failures: i64 = row.try_get("post_failures").map_err(query_error)?;
                Ok(failures as u32)
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn load_cursor(&self, source: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT since_id FROM engagement_cursors WHERE source = ?")
            .bind(source)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|r| r.try_get::<String, _>("since_id").map_err(query_error))
            .transpose()
    }

    async fn save_cursor(&self, source: &str, since_id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO engagement_cursors (source, since_id, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (source) DO UPDATE SET
                   since_id = excluded.since_id,
                   updated_at = excluded.updated_at"#,
        )
        .bind(source)
        .bind(since_id)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }
}
