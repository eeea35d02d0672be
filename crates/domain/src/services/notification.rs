//! Notification emission.
//!
//! [`NotificationSink`] is the persistence boundary for user-facing alerts.
//! Callers go through [`NotificationEmitter`], which validates the payload
//! before the sink is ever reached.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics::counter;

use crate::error::DomainError;
use crate::models::notification::{NewNotification, Notification};
use crate::retry::{with_retry, RetryPolicy};

/// Stores notifications for later delivery to the user.
///
/// Implementations must reject a notification whose `user_id` is empty.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create(&self, notification: NewNotification) -> Result<Notification, DomainError>;
}

/// Result of an emission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationResult {
    /// Notification was persisted.
    Sent(Notification),
    /// No recipient; nothing was written.
    Skipped,
}

impl NotificationResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationResult::Sent(_))
    }
}

/// Validating front door to a [`NotificationSink`].
#[derive(Clone)]
pub struct NotificationEmitter {
    sink: Arc<dyn NotificationSink>,
    retry: RetryPolicy,
}

impl NotificationEmitter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Emits a notification.
    ///
    /// A missing recipient is logged and skipped. Any other invalid field is
    /// an error, as is a sink failure that survives the retry policy.
    pub async fn emit(&self, notification: NewNotification) -> Result<NotificationResult, DomainError> {
        if !notification.has_recipient() {
            tracing::warn!(
                notification_type = %notification.notification_type,
                title = %notification.title,
                "Skipping notification without a user id"
            );
            counter!("notifications_skipped_total").increment(1);
            return Ok(NotificationResult::Skipped);
        }

        notification.validate_fields()?;

        let created = with_retry(&self.retry, "create_notification", || {
            self.sink.create(notification.clone())
        })
        .await?;

        tracing::debug!(
            user_id = %created.user_id,
            notification_id = %created.id,
            notification_type = %created.notification_type,
            "Notification created"
        );

        Ok(NotificationResult::Sent(created))
    }
}

/// In-memory sink for development and testing.
#[derive(Default)]
pub struct InMemoryNotificationSink {
    notifications: Mutex<Vec<Notification>>,
    failing_titles: Vec<String>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that fails with an infrastructure error for any notification
    /// whose title equals one of `titles`.
    pub fn failing_on_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            notifications: Mutex::new(Vec::new()),
            failing_titles: titles.into_iter().map(Into::into).collect(),
        }
    }

    /// Snapshot of everything persisted so far.
    pub fn all(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    pub fn for_user(&self, user_id: &str) -> Vec<Notification> {
        self.lock()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn titles_for(&self, user_id: &str) -> Vec<String> {
        self.for_user(user_id).into_iter().map(|n| n.title).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.notifications
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn create(&self, notification: NewNotification) -> Result<Notification, DomainError> {
        notification.validate_fields()?;

        if self.failing_titles.iter().any(|t| *t == notification.title) {
            return Err(DomainError::Infrastructure(format!(
                "Simulated failure for '{}'",
                notification.title
            )));
        }

        let created = notification.into_notification();
        self.lock().push(created.clone());
        Ok(created)
    }
}
