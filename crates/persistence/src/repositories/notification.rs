//! Notification repository.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::notification::{NewNotification, Notification};
use domain::services::notification::NotificationSink;
use domain::DomainError;

use crate::entities::NotificationEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent notifications for a user.
    pub async fn find_recent(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Notification>, DomainError> {
        let timer = QueryTimer::new("find_recent_notifications");
        let result = sqlx::query_as::<_, NotificationEntity>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);

        result?.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl NotificationSink for NotificationRepository {
    async fn create(&self, notification: NewNotification) -> Result<Notification, DomainError> {
        notification.validate_fields()?;
        let record = notification.into_notification();

        let timer = QueryTimer::new("insert_notification");
        let result = sqlx::query_as::<_, NotificationEntity>(
            r#"
            INSERT INTO notifications (id, user_id, type, title, message, is_read,
                                       priority, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(record.notification_type.as_str())
        .bind(&record.title)
        .bind(&record.message)
        .bind(record.is_read)
        .bind(record.priority.as_str())
        .bind(&record.data)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);

        result?.try_into()
    }
}
