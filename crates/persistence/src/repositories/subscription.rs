//! Subscription repository.
//!
//! Quota reservation is a single conditional `UPDATE`, so the limit check
//! and the increment cannot interleave with another reservation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domain::models::subscription::Subscription;
use domain::services::quota::SubscriptionStore;
use domain::DomainError;

use crate::entities::SubscriptionEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<Subscription>, DomainError> {
        let timer = QueryTimer::new("find_subscription_by_user");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            SELECT * FROM subscriptions WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        result?.map(TryInto::try_into).transpose()
    }

    async fn try_reserve_request(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, DomainError> {
        let timer = QueryTimer::new("reserve_subscription_request");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            UPDATE subscriptions
            SET requests_used = requests_used + 1, updated_at = $2
            WHERE user_id = $1
              AND status = 'active'
              AND (end_date IS NULL OR end_date > $2)
              AND (requests_limit = -1 OR requests_used < requests_limit)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        result?.map(TryInto::try_into).transpose()
    }

    async fn release_request(&self, user_id: &str) -> Result<(), DomainError> {
        let timer = QueryTimer::new("release_subscription_request");
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET requests_used = GREATEST(requests_used - 1, 0), updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await;
        timer.finish(&result);

        result?;
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        subscription: Subscription,
    ) -> Result<Subscription, DomainError> {
        let timer = QueryTimer::new("insert_subscription_if_absent");
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, plan, status, start_date, end_date,
                                       requests_used, requests_limit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(&subscription.user_id)
        .bind(subscription.plan.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.requests_used)
        .bind(subscription.requests_limit)
        .execute(&self.pool)
        .await;
        timer.finish(&result);
        result?;

        self.find_by_user(&subscription.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Subscription for user {}", subscription.user_id)))
    }

    async fn upsert(&self, subscription: Subscription) -> Result<Subscription, DomainError> {
        let timer = QueryTimer::new("upsert_subscription");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            INSERT INTO subscriptions (user_id, plan, status, start_date, end_date,
                                       requests_used, requests_limit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE
            SET plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                requests_used = EXCLUDED.requests_used,
                requests_limit = EXCLUDED.requests_limit,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&subscription.user_id)
        .bind(subscription.plan.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.requests_used)
        .bind(subscription.requests_limit)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);

        result?.try_into()
    }
}
