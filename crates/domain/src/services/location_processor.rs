//! Location event processing.
//!
//! Turns raw location samples into zone transitions and drives the per-zone
//! side effects: notifications, service eligibility, pricing tier and the
//! user's current service-area label.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use moka::future::Cache;
use serde_json::json;
use shared::geo::Coordinates;
use tokio::sync::OwnedMutexGuard;

use crate::error::DomainError;
use crate::models::geofence::{Geofence, GeofenceType};
use crate::models::location::{LocationEvent, UserLocationSample};
use crate::models::notification::{NewNotification, NotificationPriority, NotificationType};
use crate::models::user_zone_state::{PricingTier, UserZoneState};
use crate::services::notification::NotificationEmitter;
use crate::services::zone_registry::ZoneRegistry;

/// Persists [`UserZoneState`] records.
#[async_trait]
pub trait UserZoneStateStore: Send + Sync {
    /// State for `user_id`, or the defaults if nothing was stored yet.
    async fn get(&self, user_id: &str) -> Result<UserZoneState, DomainError>;

    async fn set_service_eligibility(&self, user_id: &str, eligible: bool)
        -> Result<(), DomainError>;

    async fn set_pricing_tier(&self, user_id: &str, tier: PricingTier) -> Result<(), DomainError>;

    /// Points the user's location label at `area`, or clears it.
    async fn set_current_service_area(
        &self,
        user_id: &str,
        area: Option<&Geofence>,
    ) -> Result<(), DomainError>;
}

/// In-memory zone state store for development and testing.
#[derive(Default)]
pub struct InMemoryUserZoneStateStore {
    states: Mutex<HashMap<String, UserZoneState>>,
}

impl InMemoryUserZoneStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, user_id: &str, f: F)
    where
        F: FnOnce(&mut UserZoneState),
    {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = states
            .entry(user_id.to_string())
            .or_insert_with(|| UserZoneState::new(user_id));
        f(state);
        state.updated_at = Utc::now();
    }
}

#[async_trait]
impl UserZoneStateStore for InMemoryUserZoneStateStore {
    async fn get(&self, user_id: &str) -> Result<UserZoneState, DomainError> {
        let states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(states
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserZoneState::new(user_id)))
    }

    async fn set_service_eligibility(
        &self,
        user_id: &str,
        eligible: bool,
    ) -> Result<(), DomainError> {
        self.update(user_id, |s| s.service_eligible = eligible);
        Ok(())
    }

    async fn set_pricing_tier(&self, user_id: &str, tier: PricingTier) -> Result<(), DomainError> {
        self.update(user_id, |s| s.pricing_tier = tier);
        Ok(())
    }

    async fn set_current_service_area(
        &self,
        user_id: &str,
        area: Option<&Geofence>,
    ) -> Result<(), DomainError> {
        self.update(user_id, |s| {
            s.current_service_area_id = area.map(|a| a.id.clone());
            s.current_service_area_name = area.map(|a| a.name.clone());
        });
        Ok(())
    }
}

/// Sizing for the last-known-location cache.
#[derive(Debug, Clone)]
pub struct LocationCacheConfig {
    pub capacity: u64,
    /// Entries untouched for this long are evicted.
    pub idle: Duration,
}

impl Default for LocationCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            idle: Duration::from_secs(30 * 60),
        }
    }
}

type UserLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Exclusive turn for one user. Dropping it releases the lock and removes
/// the map entry once no other caller is holding or waiting on it.
struct UserTurn<'a> {
    locks: &'a UserLocks,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserTurn<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}

/// Converts location updates into [`LocationEvent`]s.
///
/// Updates for the same user are serialized by a per-user lock held for the
/// whole call, so the diff always runs against the sample written by the
/// previous call. Locks live outside the bounded sample cache and only exist
/// while a call for that user is in flight.
pub struct LocationEventProcessor {
    registry: Arc<ZoneRegistry>,
    notifications: NotificationEmitter,
    zone_state: Arc<dyn UserZoneStateStore>,
    last_known: Cache<String, UserLocationSample>,
    locks: UserLocks,
}

impl LocationEventProcessor {
    pub fn new(
        registry: Arc<ZoneRegistry>,
        notifications: NotificationEmitter,
        zone_state: Arc<dyn UserZoneStateStore>,
        cache: LocationCacheConfig,
    ) -> Self {
        let last_known = Cache::builder()
            .max_capacity(cache.capacity)
            .time_to_idle(cache.idle)
            .build();

        Self {
            registry,
            notifications,
            zone_state,
            last_known,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn begin_turn(&self, user_id: &str) -> UserTurn<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(user_id.to_string()).or_default().clone()
        };
        UserTurn {
            locks: &self.locks,
            user_id: user_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn registry(&self) -> &Arc<ZoneRegistry> {
        &self.registry
    }

    /// Current zone state for `user_id`.
    pub async fn zone_state(&self, user_id: &str) -> Result<UserZoneState, DomainError> {
        self.zone_state.get(user_id).await
    }

    /// Last sample recorded for `user_id`, if still cached.
    pub async fn last_location(&self, user_id: &str) -> Option<UserLocationSample> {
        self.last_known.get(user_id).await
    }

    /// Processes a sample captured now.
    pub async fn process_location(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
    ) -> Result<LocationEvent, DomainError> {
        let sample =
            UserLocationSample::new(user_id, Coordinates::new(latitude, longitude), accuracy);
        self.process_sample(sample).await
    }

    /// Processes a sample with a caller-supplied capture time.
    pub async fn process_sample(
        &self,
        sample: UserLocationSample,
    ) -> Result<LocationEvent, DomainError> {
        if sample.user_id.trim().is_empty() {
            return Err(DomainError::validation("User id is required"));
        }
        shared::validation::validate_coordinates(
            sample.coordinates.latitude,
            sample.coordinates.longitude,
        )?;
        shared::validation::validate_accuracy(sample.accuracy)?;

        let user_id = sample.user_id.clone();
        let _turn = self.begin_turn(&user_id).await;
        let last = self.last_known.get(&user_id).await;

        let current = self.registry.containing(sample.coordinates);
        let (entered, exited) = match last.as_ref() {
            Some(previous) => {
                let before = self.registry.containing(previous.coordinates);
                diff_zones(&before, &current)
            }
            None => (current.clone(), Vec::new()),
        };

        self.last_known.insert(user_id.clone(), sample.clone()).await;

        for zone in &entered {
            counter!(
                "zone_transitions_total",
                "direction" => "enter",
                "zone_type" => zone.zone_type.as_str()
            )
            .increment(1);
            if let Err(err) = self.on_enter(&user_id, zone).await {
                tracing::warn!(
                    user_id = %user_id,
                    zone_id = %zone.id,
                    error = %err,
                    "Zone entry handling failed"
                );
            }
        }

        for zone in &exited {
            counter!(
                "zone_transitions_total",
                "direction" => "exit",
                "zone_type" => zone.zone_type.as_str()
            )
            .increment(1);
            if let Err(err) = self.on_exit(&user_id, zone).await {
                tracing::warn!(
                    user_id = %user_id,
                    zone_id = %zone.id,
                    error = %err,
                    "Zone exit handling failed"
                );
            }
        }

        let (eligible, tier) = zone_flags(&current);
        if let Err(err) = self.zone_state.set_service_eligibility(&user_id, eligible).await {
            tracing::warn!(
                user_id = %user_id,
                error = %err,
                "Failed to update service eligibility"
            );
        }
        if let Err(err) = self.zone_state.set_pricing_tier(&user_id, tier).await {
            tracing::warn!(
                user_id = %user_id,
                error = %err,
                "Failed to update pricing tier"
            );
        }

        let service_area = current
            .iter()
            .find(|z| z.zone_type == GeofenceType::ServiceArea);
        if let Err(err) = self
            .zone_state
            .set_current_service_area(&user_id, service_area)
            .await
        {
            tracing::warn!(
                user_id = %user_id,
                error = %err,
                "Failed to update current service area"
            );
        }

        tracing::debug!(
            user_id = %user_id,
            entered = entered.len(),
            exited = exited.len(),
            current = current.len(),
            "Location processed"
        );

        Ok(LocationEvent {
            user_id,
            location: sample,
            entered,
            exited,
            current,
        })
    }

    async fn on_enter(&self, user_id: &str, zone: &Geofence) -> Result<(), DomainError> {
        self.notify(
            user_id,
            zone,
            NotificationType::Info,
            NotificationPriority::Low,
            format!("Entered {}", zone.name),
            format!("You have entered {}", zone.name),
        )
        .await?;

        match zone.zone_type {
            GeofenceType::ServiceArea if zone.properties.service_available => {
                self.notify(
                    user_id,
                    zone,
                    NotificationType::Info,
                    NotificationPriority::Medium,
                    "Emergency Services Available",
                    format!("Emergency roadside assistance is available in {}", zone.name),
                )
                .await
            }
            GeofenceType::ServiceArea => {
                self.notify(
                    user_id,
                    zone,
                    NotificationType::Info,
                    NotificationPriority::Medium,
                    "Service Not Available",
                    format!(
                        "Emergency services are not yet available in {}",
                        zone.name
                    ),
                )
                .await
            }
            GeofenceType::PremiumZone => {
                self.notify(
                    user_id,
                    zone,
                    NotificationType::Pricing,
                    NotificationPriority::Medium,
                    "Premium Pricing Area",
                    format!("Premium pricing applies to service requests in {}", zone.name),
                )
                .await
            }
            GeofenceType::RestrictedZone => {
                self.notify(
                    user_id,
                    zone,
                    NotificationType::Alert,
                    NotificationPriority::High,
                    "Service Unavailable",
                    format!(
                        "Emergency services are unavailable in {}. Please relocate to a safe area.",
                        zone.name
                    ),
                )
                .await
            }
            GeofenceType::ChargingHub => {
                let closed = zone
                    .properties
                    .operating_hours
                    .as_ref()
                    .and_then(|h| h.is_open_at(Utc::now()))
                    == Some(false);
                let message = if closed {
                    format!("{} is nearby but currently closed", zone.name)
                } else {
                    format!("{} is nearby", zone.name)
                };
                self.notify(
                    user_id,
                    zone,
                    NotificationType::Info,
                    NotificationPriority::Low,
                    "Charging Hub Nearby",
                    message,
                )
                .await
            }
        }
    }

    async fn on_exit(&self, user_id: &str, zone: &Geofence) -> Result<(), DomainError> {
        self.notify(
            user_id,
            zone,
            NotificationType::Info,
            NotificationPriority::Low,
            format!("Left {}", zone.name),
            format!("You have left {}", zone.name),
        )
        .await?;

        match zone.zone_type {
            GeofenceType::PremiumZone => {
                self.notify(
                    user_id,
                    zone,
                    NotificationType::Pricing,
                    NotificationPriority::Medium,
                    "Standard Pricing Resumed",
                    "Standard pricing now applies to your service requests",
                )
                .await
            }
            GeofenceType::RestrictedZone => {
                self.notify(
                    user_id,
                    zone,
                    NotificationType::Info,
                    NotificationPriority::Medium,
                    "Services Available Again",
                    format!(
                        "You have left {}. Emergency services are available again.",
                        zone.name
                    ),
                )
                .await
            }
            _ => Ok(()),
        }
    }

    async fn notify(
        &self,
        user_id: &str,
        zone: &Geofence,
        notification_type: NotificationType,
        priority: NotificationPriority,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), DomainError> {
        let notification = NewNotification::new(user_id, notification_type, title, message)
            .with_priority(priority)
            .with_data(json!({
                "zoneId": zone.id,
                "zoneType": zone.zone_type.as_str(),
            }));
        self.notifications.emit(notification).await.map(|_| ())
    }
}

/// Eligibility and pricing for a user inside `current`. Any restricted zone
/// suspends service and any premium zone applies premium pricing, regardless
/// of which zones were crossed to get there.
pub fn zone_flags(current: &[Geofence]) -> (bool, PricingTier) {
    let eligible = !current
        .iter()
        .any(|z| z.zone_type == GeofenceType::RestrictedZone);
    let tier = if current.iter().any(|z| z.zone_type == GeofenceType::PremiumZone) {
        PricingTier::Premium
    } else {
        PricingTier::Standard
    };
    (eligible, tier)
}

/// Splits a before/after pair of zone sets into (entered, exited), keyed by
/// zone id. Order follows `after` and `before` respectively.
pub fn diff_zones(before: &[Geofence], after: &[Geofence]) -> (Vec<Geofence>, Vec<Geofence>) {
    let before_ids: HashSet<&str> = before.iter().map(|z| z.id.as_str()).collect();
    let after_ids: HashSet<&str> = after.iter().map(|z| z.id.as_str()).collect();

    let entered = after
        .iter()
        .filter(|z| !before_ids.contains(z.id.as_str()))
        .cloned()
        .collect();
    let exited = before
        .iter()
        .filter(|z| !after_ids.contains(z.id.as_str()))
        .cloned()
        .collect();

    (entered, exited)
}
