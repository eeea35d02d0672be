//! Subscription eligibility and request quota.
//!
//! The check and the usage increment are one atomic operation in the store
//! ([`SubscriptionStore::try_reserve_request`]), so concurrent request
//! creation for the same user can never exceed the plan limit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::error::DomainError;
use crate::models::subscription::{RequestEligibility, Subscription, SubscriptionStatus};
use crate::retry::{with_retry, RetryPolicy};

pub const REASON_LIMIT_EXCEEDED: &str = "Monthly request limit exceeded";
pub const REASON_INACTIVE: &str = "Subscription is not active";
pub const REASON_EXPIRED: &str = "Subscription expired";

/// Persistence boundary for subscriptions and their usage counters.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<Subscription>, DomainError>;

    /// Increments `requests_used` only if the subscription is active,
    /// unexpired at `now`, and below its limit (or unlimited). Returns the
    /// updated record, or `None` when nothing was reserved.
    async fn try_reserve_request(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Gives back one reserved request. Never drops below zero.
    async fn release_request(&self, user_id: &str) -> Result<(), DomainError>;

    /// Stores `subscription` unless the user already has one; returns the
    /// record that is stored afterwards.
    async fn insert_if_absent(
        &self,
        subscription: Subscription,
    ) -> Result<Subscription, DomainError>;

    async fn upsert(&self, subscription: Subscription) -> Result<Subscription, DomainError>;
}

/// In-memory subscription store for development and testing.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<Subscription>, DomainError> {
        Ok(self.lock().get(user_id).cloned())
    }

    async fn try_reserve_request(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, DomainError> {
        let mut subscriptions = self.lock();
        let Some(sub) = subscriptions.get_mut(user_id) else {
            return Ok(None);
        };
        if sub.status != SubscriptionStatus::Active || sub.is_expired_at(now) || !sub.has_capacity()
        {
            return Ok(None);
        }
        sub.requests_used += 1;
        Ok(Some(sub.clone()))
    }

    async fn release_request(&self, user_id: &str) -> Result<(), DomainError> {
        if let Some(sub) = self.lock().get_mut(user_id) {
            sub.requests_used = (sub.requests_used - 1).max(0);
        }
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        subscription: Subscription,
    ) -> Result<Subscription, DomainError> {
        Ok(self
            .lock()
            .entry(subscription.user_id.clone())
            .or_insert(subscription)
            .clone())
    }

    async fn upsert(&self, subscription: Subscription) -> Result<Subscription, DomainError> {
        self.lock()
            .insert(subscription.user_id.clone(), subscription.clone());
        Ok(subscription)
    }
}

/// Decides whether a user may open another emergency request.
#[derive(Clone)]
pub struct QuotaService {
    store: Arc<dyn SubscriptionStore>,
    retry: RetryPolicy,
}

impl QuotaService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The user's subscription, creating a basic one on first use.
    pub async fn ensure_subscription(&self, user_id: &str) -> Result<Subscription, DomainError> {
        if let Some(existing) = self.find(user_id).await? {
            return Ok(existing);
        }
        tracing::info!(user_id = %user_id, "Creating default basic subscription");
        self.store
            .insert_if_absent(Subscription::new_basic(user_id))
            .await
    }

    /// Read-only authorization check. Does not consume quota.
    pub async fn authorize_new_request(&self, user_id: &str) -> Result<(), DomainError> {
        let subscription = self.require(user_id).await?;
        Self::evaluate(&subscription, Utc::now())
    }

    /// Non-failing variant for UI decisions.
    pub async fn can_make_request(&self, user_id: &str) -> Result<RequestEligibility, DomainError> {
        let subscription = self.ensure_subscription(user_id).await?;
        Ok(Self::eligibility(&subscription, Utc::now()))
    }

    /// Atomically checks and consumes one request from the user's quota.
    pub async fn reserve_request(&self, user_id: &str) -> Result<Subscription, DomainError> {
        let now = Utc::now();
        if let Some(reserved) = self.store.try_reserve_request(user_id, now).await? {
            tracing::debug!(
                user_id = %user_id,
                requests_used = reserved.requests_used,
                requests_limit = reserved.requests_limit,
                "Request quota reserved"
            );
            return Ok(reserved);
        }

        // Nothing was reserved; explain why from the current record.
        let subscription = self.require(user_id).await?;
        let err = match Self::evaluate(&subscription, now) {
            Err(err) => err,
            Ok(()) => DomainError::Conflict("Request quota changed concurrently".into()),
        };
        if matches!(err, DomainError::QuotaExceeded { .. }) {
            counter!("quota_rejections_total").increment(1);
        }
        Err(err)
    }

    /// Returns a reservation after a failed request creation.
    pub async fn release_request(&self, user_id: &str) -> Result<(), DomainError> {
        with_retry(&self.retry, "release_request_quota", || {
            self.store.release_request(user_id)
        })
        .await
    }

    /// Pure decision over a subscription snapshot.
    pub fn evaluate(subscription: &Subscription, now: DateTime<Utc>) -> Result<(), DomainError> {
        if subscription.status != SubscriptionStatus::Active {
            return Err(DomainError::SubscriptionInactive(REASON_INACTIVE.into()));
        }
        if subscription.is_expired_at(now) {
            return Err(DomainError::SubscriptionInactive(REASON_EXPIRED.into()));
        }
        if !subscription.has_capacity() {
            return Err(DomainError::QuotaExceeded {
                used: subscription.requests_used,
                limit: subscription.requests_limit,
            });
        }
        Ok(())
    }

    pub fn eligibility(subscription: &Subscription, now: DateTime<Utc>) -> RequestEligibility {
        match Self::evaluate(subscription, now) {
            Ok(()) => RequestEligibility::allowed(subscription.remaining_requests()),
            Err(DomainError::QuotaExceeded { .. }) => RequestEligibility::denied(
                REASON_LIMIT_EXCEEDED,
                Some(subscription.remaining_requests()),
            ),
            Err(err) => RequestEligibility::denied(err.to_string(), None),
        }
    }

    async fn find(&self, user_id: &str) -> Result<Option<Subscription>, DomainError> {
        with_retry(&self.retry, "find_subscription", || {
            self.store.find_by_user(user_id)
        })
        .await
    }

    async fn require(&self, user_id: &str) -> Result<Subscription, DomainError> {
        self.find(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Subscription for user {user_id}")))
    }
}
