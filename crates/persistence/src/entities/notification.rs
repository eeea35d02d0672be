//! Notification entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::notification::{Notification, NotificationPriority, NotificationType};
use domain::DomainError;

use super::corrupt;

/// Database row mapping for the notifications table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationEntity {
    pub id: Uuid,
    pub user_id: String,
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub priority: String,
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationEntity> for Notification {
    type Error = DomainError;

    fn try_from(entity: NotificationEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            notification_type: NotificationType::parse(&entity.notification_type)
                .ok_or_else(|| corrupt("type", &entity.notification_type))?,
            priority: NotificationPriority::parse(&entity.priority)
                .ok_or_else(|| corrupt("priority", &entity.priority))?,
            id: entity.id,
            user_id: entity.user_id,
            title: entity.title,
            message: entity.message,
            is_read: entity.is_read,
            data: entity.data,
            created_at: entity.created_at,
        })
    }
}
