//! Durable record of delivered notifications.

use async_trait::async_trait;
use npscan_core::db::{DatabaseError, unix_timestamp};

use super::NotificationError;

npscan_core::define_database!(
    NotificationDatabase,
    "./migrations/notifications",
    "Notification database migrations complete"
);

/// Set of notification ids that were delivered. Entries are never removed.
#[async_trait]
pub trait NotificationGuard: Send + Sync {
    async fn check_sent(&self, id: &str) -> Result<bool, NotificationError>;

    async fn record_sent(&self, id: &str) -> Result<(), NotificationError>;
}

impl NotificationDatabase {
    pub async fn has_sent_record(&self, id: &str) -> Result<bool, DatabaseError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sent_notifications WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(found.is_some())
    }

    /// Insert a delivery record. Recording the same id twice is a no-op.
    pub async fn put_sent_record(&self, id: &str) -> Result<(), DatabaseError> {
        sqlx::query("INSERT OR IGNORE INTO sent_notifications (id, sent_at) VALUES (?, ?)")
            .bind(id)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationGuard for NotificationDatabase {
    async fn check_sent(&self, id: &str) -> Result<bool, NotificationError> {
        Ok(self.has_sent_record(id).await?)
    }

    async fn record_sent(&self, id: &str) -> Result<(), NotificationError> {
        Ok(self.put_sent_record(id).await?)
    }
}
