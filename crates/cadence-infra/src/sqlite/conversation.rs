//! SQLite conversation record repository.

use cadence_core::repository::ConversationRepository;
use cadence_types::conversation::ConversationRecord;
use cadence_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of [`ConversationRepository`].
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Intermediate row type for mapping SQLite rows.
struct ConversationRow {
    source_event_id: String,
    conversation_id: String,
    actor_id: String,
    actor_handle: String,
    source_text: String,
    response_event_id: Option<String>,
    response_text: Option<String>,
    is_processed: bool,
    created_at: String,
    responded_at: Option<String>,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            source_event_id: row.try_get("source_event_id")?,
            conversation_id: row.try_get("conversation_id")?,
            actor_id: row.try_get("actor_id")?,
            actor_handle: row.try_get("actor_handle")?,
            source_text: row.try_get("source_text")?,
            response_event_id: row.try_get("response_event_id")?,
            response_text: row.try_get("response_text")?,
            is_processed: row.try_get("is_processed")?,
            created_at: row.try_get("created_at")?,
            responded_at: row.try_get("responded_at")?,
        })
    }

    fn into_record(self) -> Result<ConversationRecord, RepositoryError> {
        Ok(ConversationRecord {
            source_event_id: self.source_event_id,
            conversation_id: self.conversation_id,
            actor_id: self.actor_id,
            actor_handle: self.actor_handle,
            source_text: self.source_text,
            response_event_id: self.response_event_id,
            response_text: self.response_text,
            is_processed: self.is_processed,
            created_at: parse_datetime(&self.created_at)?,
            responded_at: self.responded_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

fn rows_to_records(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ConversationRecord>, RepositoryError> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let r = ConversationRow::from_row(row).map_err(query_error)?;
        records.push(r.into_record()?);
    }
    Ok(records)
}

impl ConversationRepository for SqliteConversationRepository {
    async fn exists(&self, source_event_id: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM conversation_records WHERE source_event_id = ?")
            .bind(source_event_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        Ok(row.is_some())
    }

    async fn insert(&self, record: &ConversationRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO conversation_records (source_event_id, conversation_id, actor_id, actor_handle, source_text, response_event_id, response_text, is_processed, created_at, responded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.source_event_id)
        .bind(&record.conversation_id)
        .bind(&record.actor_id)
        .bind(&record.actor_handle)
        .bind(&record.source_text)
        .bind(&record.response_event_id)
        .bind(&record.response_text)
        .bind(record.is_processed)
        .bind(format_datetime(&record.created_at))
        .bind(record.responded_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "source event '{}' already recorded",
                    record.source_event_id
                )))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("CHECK") => Err(
                RepositoryError::Invalid(format!(
                    "processed record for '{}' has no response id",
                    record.source_event_id
                )),
            ),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn get(&self, source_event_id: &str) -> Result<Option<ConversationRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversation_records WHERE source_event_id = ?")
            .bind(source_event_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = ConversationRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn recent_for_actor(
        &self,
        actor_id: &str,
        limit: i64,
    ) -> Result<Vec<ConversationRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_records WHERE actor_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(actor_id)
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows_to_records(&rows)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ConversationRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_records ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows_to_records(&rows)
    }

    async fn count_processed(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM conversation_records WHERE is_processed = 1")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_error)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::sqlite::test_pool;

    fn answered(source_id: &str, actor_id: &str) -> ConversationRecord {
        ConversationRecord {
            source_event_id: source_id.to_string(),
            conversation_id: source_id.to_string(),
            actor_id: actor_id.to_string(),
            actor_handle: format!("{actor_id}-handle"),
            source_text: "@agent hi".to_string(),
            response_event_id: Some(format!("r-{source_id}")),
            response_text: Some("hello".to_string()),
            is_processed: true,
            created_at: Utc::now(),
            responded_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let record = answered("100", "u1");

        repo.insert(&record).await.unwrap();

        assert!(repo.exists("100").await.unwrap());
        assert!(!repo.exists("101").await.unwrap());
        let loaded = repo.get("100").await.unwrap().unwrap();
        assert_eq!(loaded.response_event_id.as_deref(), Some("r-100"));
        assert!(loaded.is_processed);
        assert_eq!(loaded.created_at, record.created_at);
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        repo.insert(&answered("100", "u1")).await.unwrap();
        let err = repo.insert(&answered("100", "u1")).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.count_processed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_processed_without_response_is_rejected() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let mut record = answered("100", "u1");
        record.response_event_id = None;

        let err = repo.insert(&record).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Invalid(_)));
        assert!(!repo.exists("100").await.unwrap());
    }

    #[tokio::test]
    async fn test_recent_for_actor_newest_first() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        repo.insert(&answered("1", "u1")).await.unwrap();
        repo.insert(&answered("2", "u2")).await.unwrap();
        repo.insert(&answered("3", "u1")).await.unwrap();

        let records = repo.recent_for_actor("u1", 10).await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.source_event_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);

        let limited = repo.recent(2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].source_event_id, "3");
    }
}
