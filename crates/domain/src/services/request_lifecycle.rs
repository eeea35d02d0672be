//! Emergency request lifecycle.
//!
//! Owns the status state machine, who may drive it, and the notification
//! sent to the requester on every successful transition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;
use crate::models::actor::Actor;
use crate::models::emergency_request::{
    AssignedProvider, CreateEmergencyRequest, EmergencyRequest, RequestStatus,
};
use crate::models::notification::{NewNotification, NotificationPriority, NotificationType};
use crate::models::user_zone_state::PricingTier;
use crate::retry::{with_retry, RetryPolicy};
use crate::services::notification::NotificationEmitter;

/// A validated status change, applied by the store only if the stored status
/// still equals `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub assigned_provider: Option<AssignedProvider>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(from: RequestStatus, to: RequestStatus) -> Self {
        let now = Utc::now();
        Self {
            from,
            to,
            assigned_provider: None,
            estimated_arrival: None,
            actual_arrival: (to == RequestStatus::InProgress).then_some(now),
            updated_at: now,
        }
    }

    /// Writes the change onto an in-memory copy of the request.
    pub fn apply_to(&self, request: &mut EmergencyRequest) {
        request.status = self.to;
        request.updated_at = self.updated_at;
        if let Some(provider) = &self.assigned_provider {
            request.assigned_provider = Some(provider.clone());
        }
        if self.estimated_arrival.is_some() {
            request.estimated_arrival = self.estimated_arrival;
        }
        if self.actual_arrival.is_some() {
            request.actual_arrival = self.actual_arrival;
        }
    }
}

/// Persistence boundary for emergency requests.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: EmergencyRequest) -> Result<EmergencyRequest, DomainError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<EmergencyRequest>, DomainError>;

    /// Requests owned by `user_id`, newest first.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<EmergencyRequest>, DomainError>;

    /// Compare-and-swap status update. Returns `None` when the request is
    /// missing or its stored status is no longer `change.from`.
    async fn apply_status_change(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Option<EmergencyRequest>, DomainError>;

    async fn set_rating(
        &self,
        id: Uuid,
        rating: i32,
        feedback: Option<String>,
    ) -> Result<Option<EmergencyRequest>, DomainError>;
}

/// In-memory request store for development and testing.
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: Mutex<HashMap<Uuid, EmergencyRequest>>,
    fail_inserts: AtomicBool,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent insert fail with an infrastructure error.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, EmergencyRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: EmergencyRequest) -> Result<EmergencyRequest, DomainError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(DomainError::Infrastructure("request store unavailable".into()));
        }
        let mut requests = self.lock();
        if requests.contains_key(&request.id) {
            return Err(DomainError::Conflict(format!(
                "Request {} already exists",
                request.id
            )));
        }
        requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<EmergencyRequest>, DomainError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<EmergencyRequest>, DomainError> {
        let mut requests: Vec<_> = self
            .lock()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(requests)
    }

    async fn apply_status_change(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Option<EmergencyRequest>, DomainError> {
        let mut requests = self.lock();
        match requests.get_mut(&id) {
            Some(request) if request.status == change.from => {
                change.apply_to(request);
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_rating(
        &self,
        id: Uuid,
        rating: i32,
        feedback: Option<String>,
    ) -> Result<Option<EmergencyRequest>, DomainError> {
        let mut requests = self.lock();
        Ok(requests.get_mut(&id).map(|request| {
            request.rating = Some(rating);
            request.feedback = feedback;
            request.updated_at = Utc::now();
            request.clone()
        }))
    }
}

/// Drives emergency requests through their status lifecycle.
#[derive(Clone)]
pub struct RequestLifecycleManager {
    store: Arc<dyn RequestStore>,
    notifications: NotificationEmitter,
    retry: RetryPolicy,
}

impl RequestLifecycleManager {
    pub fn new(store: Arc<dyn RequestStore>, notifications: NotificationEmitter) -> Self {
        Self {
            store,
            notifications,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Persists a new `pending` request priced at `pricing_tier`. Quota is
    /// the caller's concern.
    pub async fn create(
        &self,
        payload: CreateEmergencyRequest,
        user_id: &str,
        pricing_tier: PricingTier,
    ) -> Result<EmergencyRequest, DomainError> {
        if user_id.trim().is_empty() {
            return Err(DomainError::validation("User id is required"));
        }
        let mut request = payload.into_request(user_id)?;
        request.pricing_tier = pricing_tier;
        let created = self.store.insert(request).await?;

        tracing::info!(
            request_id = %created.id,
            user_id = %created.user_id,
            request_type = %created.request_type.as_str(),
            "Emergency request created"
        );

        Ok(created)
    }

    /// Loads a request without an access check.
    pub async fn load(&self, id: Uuid) -> Result<EmergencyRequest, DomainError> {
        with_retry(&self.retry, "find_request", || self.store.find_by_id(id))
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Emergency request {id}")))
    }

    /// Loads a request the actor is allowed to see.
    pub async fn get(&self, id: Uuid, actor: &Actor) -> Result<EmergencyRequest, DomainError> {
        let request = self.load(id).await?;
        Self::authorize(&request, actor)?;
        Ok(request)
    }

    /// The user's requests, newest first.
    pub async fn history(&self, user_id: &str) -> Result<Vec<EmergencyRequest>, DomainError> {
        with_retry(&self.retry, "find_user_requests", || {
            self.store.find_by_user(user_id)
        })
        .await
    }

    pub fn validate_transition(from: RequestStatus, to: RequestStatus) -> Result<(), DomainError> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition { from, to })
        }
    }

    /// Owner, assigned provider, or any admin.
    pub fn authorize(request: &EmergencyRequest, actor: &Actor) -> Result<(), DomainError> {
        let is_owner = actor.user_id == request.user_id;
        let is_provider = request.assigned_provider_id() == Some(actor.user_id.as_str());

        if is_owner || is_provider || actor.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Authorization(format!(
                "user {} may not modify request {}",
                actor.user_id, request.id
            )))
        }
    }

    /// Moves `request` to `to` on behalf of `actor`.
    ///
    /// The transition is checked before the actor. On success the new state
    /// is persisted and the requester is notified; a failed notification is
    /// logged and does not undo the transition.
    pub async fn transition(
        &self,
        request: &EmergencyRequest,
        to: RequestStatus,
        actor: &Actor,
    ) -> Result<EmergencyRequest, DomainError> {
        Self::validate_transition(request.status, to)?;
        Self::authorize(request, actor)?;
        self.commit(request, StatusChange::new(request.status, to), actor)
            .await
    }

    pub async fn transition_by_id(
        &self,
        id: Uuid,
        to: RequestStatus,
        actor: &Actor,
    ) -> Result<EmergencyRequest, DomainError> {
        let request = self.load(id).await?;
        self.transition(&request, to, actor).await
    }

    /// Assigns a provider to a pending request. Admins only.
    pub async fn assign_provider(
        &self,
        id: Uuid,
        provider: AssignedProvider,
        estimated_arrival: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<EmergencyRequest, DomainError> {
        let request = self.load(id).await?;
        Self::validate_transition(request.status, RequestStatus::Assigned)?;
        if !actor.is_admin() {
            return Err(DomainError::Authorization(
                "only admins may assign providers".into(),
            ));
        }
        provider.validate()?;

        let mut change = StatusChange::new(request.status, RequestStatus::Assigned);
        change.assigned_provider = Some(provider);
        change.estimated_arrival = estimated_arrival;

        self.commit(&request, change, actor).await
    }

    /// Records the requester's rating of a completed request.
    pub async fn rate(
        &self,
        id: Uuid,
        rating: i32,
        feedback: Option<String>,
        actor: &Actor,
    ) -> Result<EmergencyRequest, DomainError> {
        if !(1..=5).contains(&rating) {
            return Err(DomainError::validation("Rating must be between 1 and 5"));
        }

        let request = self.load(id).await?;
        if actor.user_id != request.user_id {
            return Err(DomainError::Authorization(
                "only the requester may rate a request".into(),
            ));
        }
        if request.status != RequestStatus::Completed {
            return Err(DomainError::validation(
                "Only completed requests can be rated",
            ));
        }
        if request.rating.is_some() {
            return Err(DomainError::Conflict("Request has already been rated".into()));
        }

        self.store
            .set_rating(id, rating, feedback)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Emergency request {id}")))
    }

    async fn commit(
        &self,
        request: &EmergencyRequest,
        change: StatusChange,
        actor: &Actor,
    ) -> Result<EmergencyRequest, DomainError> {
        let updated = match self.store.apply_status_change(request.id, &change).await? {
            Some(updated) => updated,
            None => return Err(self.lost_race(request.id, change.to).await),
        };

        counter!("request_status_transitions_total", "to" => change.to.as_str()).increment(1);
        tracing::info!(
            request_id = %updated.id,
            from = %change.from,
            to = %change.to,
            actor_id = %actor.user_id,
            actor_role = %actor.role,
            "Request status changed"
        );

        if let Some(notification) = status_notification(&updated) {
            if let Err(err) = self.notifications.emit(notification).await {
                tracing::warn!(
                    request_id = %updated.id,
                    status = %updated.status,
                    error = %err,
                    "Failed to send status notification"
                );
            }
        }

        Ok(updated)
    }

    /// Explains why a compare-and-swap did not apply.
    async fn lost_race(&self, id: Uuid, to: RequestStatus) -> DomainError {
        match self.load(id).await {
            Ok(fresh) if !fresh.status.can_transition_to(to) => DomainError::InvalidTransition {
                from: fresh.status,
                to,
            },
            Ok(_) => DomainError::Conflict(format!("Request {id} was modified concurrently")),
            Err(err) => err,
        }
    }
}

/// The requester-facing notification for the request's current status.
pub fn status_notification(request: &EmergencyRequest) -> Option<NewNotification> {
    let (title, message, priority) = match request.status {
        RequestStatus::Assigned => {
            let message = match &request.assigned_provider {
                Some(provider) => format!(
                    "{} has been assigned to your request and is on the way",
                    provider.name
                ),
                None => "A service provider has been assigned to your request".to_string(),
            };
            ("Service Provider Assigned", message, NotificationPriority::Medium)
        }
        RequestStatus::InProgress => (
            "Service In Progress",
            "Your service provider has arrived and work is in progress".to_string(),
            NotificationPriority::Medium,
        ),
        RequestStatus::Completed => (
            "Service Completed",
            "Your emergency service request has been completed".to_string(),
            NotificationPriority::High,
        ),
        RequestStatus::Cancelled => (
            "Request Cancelled",
            "Your emergency service request has been cancelled".to_string(),
            NotificationPriority::Medium,
        ),
        RequestStatus::Pending => return None,
    };

    Some(
        NewNotification::new(
            request.user_id.clone(),
            NotificationType::ServiceUpdate,
            title,
            message,
        )
        .with_priority(priority)
        .with_data(json!({
            "requestId": request.id,
            "status": request.status.as_str(),
        })),
    )
}
