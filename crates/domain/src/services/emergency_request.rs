//! Request creation: location eligibility, quota reservation, persistence
//! and confirmation.

use std::sync::Arc;

use metrics::counter;
use serde_json::json;

use crate::error::DomainError;
use crate::models::emergency_request::{CreateEmergencyRequest, EmergencyRequest};
use crate::models::notification::{NewNotification, NotificationPriority, NotificationType};
use crate::services::location_processor::UserZoneStateStore;
use crate::services::notification::NotificationEmitter;
use crate::services::quota::QuotaService;
use crate::services::request_lifecycle::RequestLifecycleManager;

/// Orchestrates creating an emergency request for a user.
#[derive(Clone)]
pub struct EmergencyRequestService {
    quota: QuotaService,
    lifecycle: RequestLifecycleManager,
    notifications: NotificationEmitter,
    zone_state: Arc<dyn UserZoneStateStore>,
}

impl EmergencyRequestService {
    pub fn new(
        quota: QuotaService,
        lifecycle: RequestLifecycleManager,
        notifications: NotificationEmitter,
        zone_state: Arc<dyn UserZoneStateStore>,
    ) -> Self {
        Self {
            quota,
            lifecycle,
            notifications,
            zone_state,
        }
    }

    pub fn quota(&self) -> &QuotaService {
        &self.quota
    }

    pub fn lifecycle(&self) -> &RequestLifecycleManager {
        &self.lifecycle
    }

    /// Validates the payload, checks that the user is not inside a
    /// restricted zone, reserves one request from the user's quota and
    /// persists the request at the user's current pricing tier. The
    /// reservation is returned if persistence fails.
    pub async fn create_request(
        &self,
        user_id: &str,
        payload: CreateEmergencyRequest,
    ) -> Result<EmergencyRequest, DomainError> {
        payload.check()?;

        let zone_state = self.zone_state.get(user_id).await?;
        if !zone_state.service_eligible {
            counter!("requests_blocked_by_zone_total").increment(1);
            tracing::info!(user_id = %user_id, "Request refused inside restricted zone");
            return Err(DomainError::validation(
                "Emergency services are unavailable at your location",
            ));
        }

        self.quota.ensure_subscription(user_id).await?;

        let reserved = self.quota.reserve_request(user_id).await?;

        let created = match self
            .lifecycle
            .create(payload, user_id, zone_state.pricing_tier)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                if let Err(release_err) = self.quota.release_request(user_id).await {
                    tracing::error!(
                        user_id = %user_id,
                        error = %release_err,
                        "Failed to release request quota after creation failure"
                    );
                }
                return Err(err);
            }
        };

        counter!("emergency_requests_created_total").increment(1);
        tracing::info!(
            request_id = %created.id,
            user_id = %user_id,
            requests_used = reserved.requests_used,
            requests_limit = reserved.requests_limit,
            pricing_tier = %created.pricing_tier.as_str(),
            "Emergency request submitted"
        );

        let confirmation = NewNotification::new(
            user_id,
            NotificationType::ServiceUpdate,
            "Request Submitted",
            "Your emergency service request has been received. We are finding a provider near you.",
        )
        .with_priority(NotificationPriority::High)
        .with_data(json!({ "requestId": created.id }));

        if let Err(err) = self.notifications.emit(confirmation).await {
            tracing::warn!(
                request_id = %created.id,
                error = %err,
                "Failed to send request confirmation"
            );
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::emergency_request::{
        RequestLocation, RequestPriority, RequestType, RequesterContact, VehicleInfo,
    };
    use crate::models::subscription::{PlanType, Subscription};
    use crate::models::user_zone_state::PricingTier;
    use crate::retry::RetryPolicy;
    use crate::services::location_processor::InMemoryUserZoneStateStore;
    use crate::services::notification::InMemoryNotificationSink;
    use crate::services::quota::{InMemorySubscriptionStore, SubscriptionStore};
    use crate::services::request_lifecycle::{InMemoryRequestStore, RequestStore};

    struct Harness {
        service: EmergencyRequestService,
        requests: Arc<InMemoryRequestStore>,
        subscriptions: Arc<InMemorySubscriptionStore>,
        sink: Arc<InMemoryNotificationSink>,
        zone_states: Arc<InMemoryUserZoneStateStore>,
    }

    fn harness() -> Harness {
        let requests = Arc::new(InMemoryRequestStore::new());
        let subscriptions = Arc::new(InMemorySubscriptionStore::new());
        let sink = Arc::new(InMemoryNotificationSink::new());
        let zone_states = Arc::new(InMemoryUserZoneStateStore::new());
        let emitter = NotificationEmitter::new(sink.clone()).with_retry_policy(RetryPolicy::none());

        let quota = QuotaService::new(subscriptions.clone()).with_retry_policy(RetryPolicy::none());
        let lifecycle = RequestLifecycleManager::new(requests.clone(), emitter.clone())
            .with_retry_policy(RetryPolicy::none());

        Harness {
            service: EmergencyRequestService::new(quota, lifecycle, emitter, zone_states.clone()),
            requests,
            subscriptions,
            sink,
            zone_states,
        }
    }

    fn payload() -> CreateEmergencyRequest {
        CreateEmergencyRequest {
            contact: RequesterContact {
                name: "Kiran Shah".to_string(),
                phone: "+919820000001".to_string(),
                email: "kiran@example.com".to_string(),
            },
            location: Some(RequestLocation {
                latitude: 18.5204,
                longitude: 73.8567,
                address: "FC Road, Pune".to_string(),
            }),
            vehicle_info: Some(VehicleInfo {
                vehicle_type: "scooter".to_string(),
                model: "Ather 450X".to_string(),
                battery_level: 1,
            }),
            request_type: Some(RequestType::JumpStart),
            priority: RequestPriority::Urgent,
            notes: "Parked outside the cafe".to_string(),
        }
    }

    async fn used(h: &Harness, user_id: &str) -> i32 {
        h.subscriptions
            .find_by_user(user_id)
            .await
            .unwrap()
            .map(|s| s.requests_used)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_first_request_creates_basic_subscription() {
        let h = harness();
        let created = h.service.create_request("uid_1", payload()).await.unwrap();

        assert_eq!(created.user_id, "uid_1");
        assert_eq!(used(&h, "uid_1").await, 1);
        assert_eq!(h.sink.titles_for("uid_1"), vec!["Request Submitted".to_string()]);
    }

    #[tokio::test]
    async fn test_limit_reached_creates_nothing() {
        let h = harness();
        h.service.create_request("uid_1", payload()).await.unwrap();
        h.service.create_request("uid_1", payload()).await.unwrap();

        let third = h.service.create_request("uid_1", payload()).await;
        assert_eq!(third, Err(DomainError::QuotaExceeded { used: 2, limit: 2 }));
        assert_eq!(h.requests.len(), 2);
        assert_eq!(used(&h, "uid_1").await, 2);
    }

    #[tokio::test]
    async fn test_invalid_payload_consumes_no_quota() {
        let h = harness();
        let mut bad = payload();
        bad.location = None;

        assert!(matches!(
            h.service.create_request("uid_1", bad).await,
            Err(DomainError::Validation(_))
        ));
        assert_eq!(used(&h, "uid_1").await, 0);
        assert!(h.requests.is_empty());
    }

    #[tokio::test]
    async fn test_restricted_zone_blocks_request_without_using_quota() {
        let h = harness();
        h.zone_states
            .set_service_eligibility("uid_1", false)
            .await
            .unwrap();

        let result = h.service.create_request("uid_1", payload()).await;
        assert_eq!(
            result,
            Err(DomainError::Validation(
                "Emergency services are unavailable at your location".to_string()
            ))
        );
        assert!(h.requests.is_empty());
        assert!(h.subscriptions.find_by_user("uid_1").await.unwrap().is_none());
        assert!(h.sink.all().is_empty());

        h.zone_states
            .set_service_eligibility("uid_1", true)
            .await
            .unwrap();
        assert!(h.service.create_request("uid_1", payload()).await.is_ok());
    }

    #[tokio::test]
    async fn test_request_carries_current_pricing_tier() {
        let h = harness();
        let standard = h.service.create_request("uid_1", payload()).await.unwrap();
        assert_eq!(standard.pricing_tier, PricingTier::Standard);

        h.zone_states
            .set_pricing_tier("uid_1", PricingTier::Premium)
            .await
            .unwrap();
        let premium = h.service.create_request("uid_1", payload()).await.unwrap();
        assert_eq!(premium.pricing_tier, PricingTier::Premium);

        let stored = h.requests.find_by_id(premium.id).await.unwrap().unwrap();
        assert_eq!(stored.pricing_tier, PricingTier::Premium);
    }

    #[tokio::test]
    async fn test_store_failure_releases_reservation() {
        let h = harness();
        h.requests.set_fail_inserts(true);

        let result = h.service.create_request("uid_1", payload()).await;
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert_eq!(used(&h, "uid_1").await, 0);
        assert!(h.sink.all().is_empty());

        h.requests.set_fail_inserts(false);
        assert!(h.service.create_request("uid_1", payload()).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_respects_limit() {
        for limit in [0, 1, 5] {
            let h = harness();
            let mut sub = Subscription::new("uid_race", PlanType::Premium);
            sub.requests_limit = limit;
            h.subscriptions.upsert(sub).await.unwrap();

            let handles: Vec<_> = (0..24)
                .map(|_| {
                    let service = h.service.clone();
                    tokio::spawn(async move { service.create_request("uid_race", payload()).await })
                })
                .collect();

            let mut admitted = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => admitted += 1,
                    Err(err) => assert!(
                        matches!(err, DomainError::QuotaExceeded { .. }),
                        "unexpected {err:?}"
                    ),
                }
            }

            assert_eq!(admitted, limit, "limit {limit}");
            assert_eq!(h.requests.len(), limit as usize);
            assert_eq!(
                h.requests.find_by_user("uid_race").await.unwrap().len(),
                limit as usize
            );
        }
    }
}
