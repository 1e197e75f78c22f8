//! Relational store for outreach tasks and sync logs.
//!
//! The CRM owns these tables; this service only reads one task row, bumps
//! its calendar sequence, writes back the generated ICS, and appends audit
//! rows. Queries use the runtime sqlx API so no prepared metadata is needed
//! at build time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use rel8_core::{ChannelDetails, OutreachChannel, Priority, DEFAULT_LOCATION};

use crate::config::ServerConfig;

pub async fn connect(config: &ServerConfig) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
}

/// Create the tables this service touches. Idempotent; the CRM may already
/// have created them with a wider schema.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rms_outreach (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            due_date TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'medium',
            outreach_channel TEXT,
            channel_details TEXT,
            calendar_event_sequence INTEGER,
            raw_ics TEXT,
            last_calendar_update TEXT,
            system_email TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rms_contacts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rms_outreach_contacts (
            outreach_id TEXT NOT NULL,
            contact_id TEXT NOT NULL,
            PRIMARY KEY (outreach_id, contact_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rms_calendar_sync_logs (
            id TEXT PRIMARY KEY,
            outreach_id TEXT NOT NULL,
            direction TEXT NOT NULL,
            sequence_number INTEGER NOT NULL,
            status TEXT NOT NULL,
            change_description TEXT,
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sync_logs_outreach
         ON rms_calendar_sync_logs(outreach_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS formula_settings (
            category TEXT NOT NULL,
            key TEXT NOT NULL,
            value REAL NOT NULL,
            PRIMARY KEY (category, key)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One outreach task row, as the calendar sync sees it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OutreachTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: String,
    pub outreach_channel: Option<String>,
    /// Raw JSON bag of channel-specific fields
    pub channel_details: Option<String>,
    pub calendar_event_sequence: Option<i64>,
    pub raw_ics: Option<String>,
    pub last_calendar_update: Option<DateTime<Utc>>,
    pub system_email: Option<String>,
}

impl OutreachTask {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, OutreachTask>(
            "SELECT id, title, description, due_date, priority, outreach_channel,
                    channel_details, calendar_event_sequence, raw_ics,
                    last_calendar_update, system_email
             FROM rms_outreach
             WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Names of the linked contacts, in the order they were linked.
    pub async fn contact_names(pool: &SqlitePool, id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT c.name
             FROM rms_outreach_contacts oc
             JOIN rms_contacts c ON c.id = oc.contact_id
             WHERE oc.outreach_id = ?1
             ORDER BY oc.rowid",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    /// Atomically reserve the next calendar SEQUENCE for this task.
    ///
    /// The increment happens inside the database, so concurrent callers each
    /// get a distinct value and the durable record never lags behind what is
    /// about to be sent. Returns `None` if the row no longer exists.
    pub async fn reserve_next_sequence(
        pool: &SqlitePool,
        id: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE rms_outreach
             SET calendar_event_sequence = COALESCE(calendar_event_sequence, 0) + 1
             WHERE id = ?1
             RETURNING calendar_event_sequence",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Record the invitation that was actually sent.
    pub async fn record_sent_invite(
        pool: &SqlitePool,
        id: &str,
        raw_ics: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rms_outreach
             SET raw_ics = ?2, last_calendar_update = ?3
             WHERE id = ?1",
        )
        .bind(id)
        .bind(raw_ics)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub fn priority(&self) -> Priority {
        self.priority.parse().unwrap_or(Priority::Medium)
    }

    pub fn channel(&self) -> Option<OutreachChannel> {
        self.outreach_channel.as_deref().and_then(|s| s.parse().ok())
    }

    /// Event LOCATION derived from the channel and its details bag.
    pub fn location(&self) -> String {
        let Some(channel) = self.channel() else {
            return DEFAULT_LOCATION.to_string();
        };

        let raw = self
            .channel_details
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(serde_json::Value::Null);

        ChannelDetails::from_raw(channel, &raw).location()
    }
}

/// Append-only audit record, one per orchestration run.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub outreach_id: String,
    pub direction: String,
    pub sequence_number: i64,
    pub status: String,
    pub change_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SyncLogEntry {
    pub async fn append(
        pool: &SqlitePool,
        outreach_id: &str,
        sequence_number: i64,
        status: &str,
        change_description: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO rms_calendar_sync_logs
                (id, outreach_id, direction, sequence_number, status,
                 change_description, created_at)
             VALUES (?1, ?2, 'outbound', ?3, ?4, ?5, ?6)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(outreach_id)
        .bind(sequence_number)
        .bind(status)
        .bind(change_description)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_outreach_id(
        pool: &SqlitePool,
        outreach_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SyncLogEntry>(
            "SELECT id, outreach_id, direction, sequence_number, status,
                    change_description, created_at
             FROM rms_calendar_sync_logs
             WHERE outreach_id = ?1
             ORDER BY created_at DESC",
        )
        .bind(outreach_id)
        .fetch_all(pool)
        .await
    }
}

/// Stored formula overrides, merged over defaults at startup.
pub async fn load_formula_overrides(
    pool: &SqlitePool,
) -> Result<Vec<(String, String, f64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String, f64)>(
        "SELECT category, key, value FROM formula_settings",
    )
    .fetch_all(pool)
    .await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// In-memory pool. One connection: each sqlite :memory: connection is
    /// its own database.
    pub(crate) async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        migrate(&pool).await.expect("migrate");
        pool
    }

    pub(crate) async fn insert_task(pool: &SqlitePool, task: &OutreachTask) {
        sqlx::query(
            "INSERT INTO rms_outreach
                (id, title, description, due_date, priority, outreach_channel,
                 channel_details, calendar_event_sequence, system_email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .bind(&task.priority)
        .bind(&task.outreach_channel)
        .bind(&task.channel_details)
        .bind(task.calendar_event_sequence)
        .bind(&task.system_email)
        .execute(pool)
        .await
        .expect("insert task");
    }

    pub(crate) fn sample_task() -> OutreachTask {
        OutreachTask {
            id: "11112222-3333-4444-5555-666677778888".to_string(),
            title: "Coffee chat".to_string(),
            description: Some("Catch up over coffee".to_string()),
            due_date: Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap(),
            priority: "high".to_string(),
            outreach_channel: Some("irl".to_string()),
            channel_details: Some(r#"{"address":"123 Main St"}"#.to_string()),
            calendar_event_sequence: Some(2),
            raw_ics: None,
            last_calendar_update: None,
            system_email: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_id_roundtrip() {
        let pool = test_pool().await;
        let task = sample_task();
        insert_task(&pool, &task).await;

        let loaded = OutreachTask::find_by_id(&pool, &task.id)
            .await
            .unwrap()
            .expect("task should exist");
        assert_eq!(loaded.title, "Coffee chat");
        assert_eq!(loaded.due_date, task.due_date);
        assert_eq!(loaded.calendar_event_sequence, Some(2));
        assert_eq!(loaded.priority().ics_rank(), 1);
        assert_eq!(loaded.location(), "123 Main St");

        let missing = OutreachTask::find_by_id(&pool, "nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_reserve_starts_at_one_for_null_sequence() {
        let pool = test_pool().await;
        let mut task = sample_task();
        task.calendar_event_sequence = None;
        insert_task(&pool, &task).await;

        let first = OutreachTask::reserve_next_sequence(&pool, &task.id)
            .await
            .unwrap();
        assert_eq!(first, Some(1));
        let second = OutreachTask::reserve_next_sequence(&pool, &task.id)
            .await
            .unwrap();
        assert_eq!(second, Some(2));
    }

    #[tokio::test]
    async fn test_reserve_on_missing_row_returns_none() {
        let pool = test_pool().await;
        let reserved = OutreachTask::reserve_next_sequence(&pool, "nope")
            .await
            .unwrap();
        assert_eq!(reserved, None);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_are_distinct_and_gapless() {
        let pool = test_pool().await;
        let task = sample_task();
        insert_task(&pool, &task).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pool = pool.clone();
            let id = task.id.clone();
            handles.push(tokio::spawn(async move {
                OutreachTask::reserve_next_sequence(&pool, &id)
                    .await
                    .unwrap()
                    .unwrap()
            }));
        }

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();
        // Started at 2, so ten reservations yield exactly 3..=12
        assert_eq!(seen, (3..=12).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_contact_names_preserve_link_order() {
        let pool = test_pool().await;
        let task = sample_task();
        insert_task(&pool, &task).await;

        for (id, name) in [("c2", "Maya"), ("c1", "Arun")] {
            sqlx::query("INSERT INTO rms_contacts (id, name) VALUES (?1, ?2)")
                .bind(id)
                .bind(name)
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query(
                "INSERT INTO rms_outreach_contacts (outreach_id, contact_id) VALUES (?1, ?2)",
            )
            .bind(&task.id)
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        }

        let names = OutreachTask::contact_names(&pool, &task.id).await.unwrap();
        assert_eq!(names, vec!["Maya".to_string(), "Arun".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_log_append_and_list() {
        let pool = test_pool().await;
        SyncLogEntry::append(&pool, "task-1", 3, "sent", "update (sequence 3)")
            .await
            .unwrap();
        SyncLogEntry::append(&pool, "task-1", 4, "failed", "cancel (sequence 4)")
            .await
            .unwrap();
        SyncLogEntry::append(&pool, "task-2", 1, "sent", "update (sequence 1)")
            .await
            .unwrap();

        let logs = SyncLogEntry::find_by_outreach_id(&pool, "task-1")
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.direction == "outbound"));
        assert!(logs.iter().any(|l| l.status == "failed" && l.sequence_number == 4));
    }

    #[tokio::test]
    async fn test_formula_overrides_load() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO formula_settings (category, key, value) VALUES ('recency', 'half_life_days', 14.0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let rows = load_formula_overrides(&pool).await.unwrap();
        assert_eq!(
            rows,
            vec![("recency".to_string(), "half_life_days".to_string(), 14.0)]
        );
    }
}
