//! # Offline Action Queue
//!
//! Durable, ordered record of mutations made while disconnected.
//!
//! ## Lifecycle of an Action
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UI (offline): "Send inquiry"                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  add_offline_action()  → INSERT, id assigned, retry_count = 0           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  get_pending_actions() → ORDER BY created_at, id   (FIFO)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  replay against the API                                                 │
//! │       │                                                                 │
//! │       ├── 2xx     → remove_action(id)          row deleted              │
//! │       └── failure → increment_retry(id, err)   retry_count += 1,        │
//! │                                                last_error, attempt time │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A row is deleted only after the API confirmed it. Nothing here talks to
//! the network; replay lives in `haven-sync`.

use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, info, warn};

use haven_core::validation::validate_action;
use haven_core::{ActionType, NewOfflineAction, OfflineAction};

use super::{from_millis, stored_precision, to_millis};
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::store::{Table, TxMode};

const SELECT_ACTION: &str = r#"
    SELECT id, action_type, payload, endpoint, created_at,
           retry_count, last_error, last_attempt_at
    FROM offline_actions
"#;

/// Repository over `offline_actions`.
#[derive(Debug, Clone)]
pub struct ActionQueue {
    db: Database,
}

impl ActionQueue {
    pub fn new(db: Database) -> Self {
        ActionQueue { db }
    }

    /// Persists a new action with `retry_count = 0`.
    ///
    /// ## Errors
    /// - `Invalid` when the endpoint is an absolute URL
    /// - `StoreUnavailable` / `QuotaExceeded` from the store
    pub async fn add_offline_action(&self, action: NewOfflineAction) -> DbResult<OfflineAction> {
        validate_action(&action)?;

        let payload = serde_json::to_string(&action.payload)?;
        let created_at = stored_precision(self.db.clock().now());

        let mut tx = self
            .db
            .transaction(&[Table::Actions], TxMode::ReadWrite)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO offline_actions (action_type, payload, endpoint, created_at, retry_count)
            VALUES (?1, ?2, ?3, ?4, 0)
            "#,
        )
        .bind(action.action_type.as_str())
        .bind(payload)
        .bind(&action.endpoint)
        .bind(to_millis(created_at))
        .execute(tx.writer(Table::Actions)?)
        .await?;

        tx.commit().await?;

        let id = result.last_insert_rowid();
        info!(
            id,
            action_type = %action.action_type,
            endpoint = %action.endpoint,
            "Queued offline action"
        );

        Ok(OfflineAction {
            id,
            action_type: action.action_type,
            payload: action.payload,
            endpoint: action.endpoint,
            created_at,
            retry_count: 0,
            last_error: None,
            last_attempt_at: None,
        })
    }

    /// Every queued action, oldest first.
    ///
    /// Rows that cannot be decoded are skipped with a warning so one bad row
    /// never blocks the rest of the queue.
    pub async fn get_pending_actions(&self) -> DbResult<Vec<OfflineAction>> {
        let mut tx = self
            .db
            .transaction(&[Table::Actions], TxMode::ReadOnly)
            .await?;

        let sql = format!("{} ORDER BY created_at ASC, id ASC", SELECT_ACTION);
        let rows = sqlx::query(&sql)
            .fetch_all(tx.reader(Table::Actions)?)
            .await?;
        tx.commit().await?;

        let mut actions = Vec::with_capacity(rows.len());
        for row in &rows {
            match action_from_row(row) {
                Ok(action) => actions.push(action),
                Err(e) => warn!(error = %e, "Skipping undecodable offline action"),
            }
        }

        debug!(count = actions.len(), "Loaded pending actions");
        Ok(actions)
    }

    /// One queued action.
    pub async fn get(&self, id: i64) -> DbResult<OfflineAction> {
        let mut tx = self
            .db
            .transaction(&[Table::Actions], TxMode::ReadOnly)
            .await?;

        let sql = format!("{} WHERE id = ?1", SELECT_ACTION);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(tx.reader(Table::Actions)?)
            .await?;
        tx.commit().await?;

        match row {
            Some(row) => action_from_row(&row),
            None => Err(DbError::not_found("OfflineAction", id.to_string())),
        }
    }

    /// Deletes an action after the API confirmed it.
    pub async fn remove_action(&self, id: i64) -> DbResult<()> {
        let mut tx = self
            .db
            .transaction(&[Table::Actions], TxMode::ReadWrite)
            .await?;

        let result = sqlx::query("DELETE FROM offline_actions WHERE id = ?1")
            .bind(id)
            .execute(tx.writer(Table::Actions)?)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OfflineAction", id.to_string()));
        }

        tx.commit().await?;
        debug!(id, "Removed replayed action");
        Ok(())
    }

    /// Records a failed replay attempt. Returns the updated action.
    pub async fn increment_retry(&self, id: i64, error: &str) -> DbResult<OfflineAction> {
        let attempted_at = to_millis(self.db.clock().now());

        let mut tx = self
            .db
            .transaction(&[Table::Actions], TxMode::ReadWrite)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE offline_actions SET
                retry_count = retry_count + 1,
                last_error = ?2,
                last_attempt_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(attempted_at)
        .execute(tx.writer(Table::Actions)?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OfflineAction", id.to_string()));
        }

        let sql = format!("{} WHERE id = ?1", SELECT_ACTION);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_one(tx.reader(Table::Actions)?)
            .await?;
        tx.commit().await?;

        let action = action_from_row(&row)?;
        warn!(
            id,
            retry_count = action.retry_count,
            error = %error,
            "Offline action replay failed"
        );
        Ok(action)
    }

    /// Number of queued actions.
    pub async fn count(&self) -> DbResult<u64> {
        let mut tx = self
            .db
            .transaction(&[Table::Actions], TxMode::ReadOnly)
            .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_actions")
            .fetch_one(tx.reader(Table::Actions)?)
            .await?;
        tx.commit().await?;

        Ok(count.max(0) as u64)
    }
}

fn action_from_row(row: &SqliteRow) -> DbResult<OfflineAction> {
    let action_type: String = row.try_get("action_type")?;
    let payload: String = row.try_get("payload")?;
    let retry_count: i64 = row.try_get("retry_count")?;
    let last_attempt_at: Option<i64> = row.try_get("last_attempt_at")?;

    Ok(OfflineAction {
        id: row.try_get("id")?,
        action_type: action_type.parse::<ActionType>()?,
        payload: serde_json::from_str::<Value>(&payload)?,
        endpoint: row.try_get("endpoint")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        retry_count: retry_count.clamp(0, u32::MAX as i64) as u32,
        last_error: row.try_get("last_error")?,
        last_attempt_at: last_attempt_at.map(from_millis).transpose()?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use chrono::{Duration, Utc};
    use haven_core::{Clock, ManualClock};
    use serde_json::json;
    use std::sync::Arc;

    async fn queue() -> (ActionQueue, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (db.actions(), clock)
    }

    fn inquiry(message: &str) -> NewOfflineAction {
        NewOfflineAction::new(
            ActionType::SendInquiry,
            "/inquiries",
            json!({"property_id": "p-3", "message": message}),
        )
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_zero_retries() {
        let (queue, _clock) = queue().await;

        let first = queue.add_offline_action(inquiry("a")).await.unwrap();
        let second = queue.add_offline_action(inquiry("b")).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.retry_count, 0);
        assert!(first.last_error.is_none());
        assert_eq!(queue.get(first.id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_pending_is_fifo_after_removals() {
        let (queue, clock) = queue().await;

        let mut ids = Vec::new();
        for i in 0..5 {
            // Two actions share each timestamp; id breaks the tie.
            if i % 2 == 0 {
                clock.advance(Duration::milliseconds(5));
            }
            ids.push(queue.add_offline_action(inquiry(&i.to_string())).await.unwrap().id);
        }

        let pending: Vec<i64> = queue
            .get_pending_actions()
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(pending, ids);

        queue.remove_action(ids[1]).await.unwrap();
        queue.remove_action(ids[3]).await.unwrap();

        let pending: Vec<i64> = queue
            .get_pending_actions()
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(pending, vec![ids[0], ids[2], ids[4]]);
    }

    #[tokio::test]
    async fn test_three_failures_keep_the_action() {
        let (queue, clock) = queue().await;
        let action = queue.add_offline_action(inquiry("hello")).await.unwrap();

        for attempt in 1..=3 {
            clock.advance(Duration::seconds(1));
            let updated = queue
                .increment_retry(action.id, &format!("HTTP 503 (attempt {})", attempt))
                .await
                .unwrap();
            assert_eq!(updated.retry_count, attempt);
        }

        let stored = queue.get(action.id).await.unwrap();
        assert_eq!(stored.retry_count, 3);
        assert_eq!(stored.last_error.as_deref(), Some("HTTP 503 (attempt 3)"));
        assert_eq!(stored.last_attempt_at, Some(stored_precision(clock.now())));
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let (queue, _clock) = queue().await;

        assert!(matches!(
            queue.remove_action(42).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            queue.increment_retry(42, "boom").await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(queue.get(42).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_rejected() {
        let (queue, _clock) = queue().await;
        let bad = NewOfflineAction::new(ActionType::SaveSearch, "https://evil.example/steal", json!({}));

        assert!(matches!(
            queue.add_offline_action(bad).await,
            Err(DbError::Invalid(_))
        ));
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_relative_endpoints_are_queued() {
        let (queue, _clock) = queue().await;

        let bare = queue
            .add_offline_action(NewOfflineAction::new(
                ActionType::SendInquiry,
                "inquiries",
                json!({"property_id": "p-3"}),
            ))
            .await
            .unwrap();
        let with_query = queue
            .add_offline_action(NewOfflineAction::new(
                ActionType::SaveSearch,
                "/searches?next=https://x",
                json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(bare.endpoint, "inquiries");
        assert_eq!(with_query.endpoint, "/searches?next=https://x");
        assert_eq!(queue.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let db = Database::new(DbConfig::in_memory().max_size_bytes(64 * 4096))
            .await
            .unwrap();
        let queue = db.actions();
        let big = "x".repeat(4096);

        let mut last_err = None;
        let mut written = 0;
        for _ in 0..500 {
            match queue.add_offline_action(inquiry(&big)).await {
                Ok(_) => written += 1,
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }

        assert!(written > 0);
        assert!(matches!(last_err, Some(DbError::QuotaExceeded(_))));
        assert_eq!(queue.count().await.unwrap(), written);
    }
}
