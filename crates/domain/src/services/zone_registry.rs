//! Geospatial zone registry.
//!
//! Holds the process-wide set of circular geofences and answers containment
//! queries. Reads vastly outnumber writes, so the zone list sits behind an
//! `RwLock` and is cloned out to callers.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveTime, Utc};
use shared::geo::Coordinates;
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::geofence::{
    CreateGeofenceRequest, Geofence, GeofenceProperties, GeofenceType, OperatingHours,
};

#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: RwLock<Vec<Geofence>>,
}

impl ZoneRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with `zones`. Fails if any zone is malformed or ids
    /// collide.
    pub fn with_zones(zones: Vec<Geofence>) -> Result<Self, DomainError> {
        let mut seen = BTreeSet::new();
        for zone in &zones {
            zone.validate_shape()?;
            if !seen.insert(zone.id.clone()) {
                return Err(DomainError::Conflict(format!(
                    "Duplicate geofence id '{}'",
                    zone.id
                )));
            }
        }

        Ok(Self {
            zones: RwLock::new(zones),
        })
    }

    /// A registry seeded with [`default_zones`].
    pub fn with_default_zones() -> Self {
        Self {
            zones: RwLock::new(default_zones()),
        }
    }

    /// Every zone whose great-circle distance to (`latitude`, `longitude`) is
    /// at most its radius, in registration order.
    pub fn containing_zones(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<Geofence>, DomainError> {
        shared::validation::validate_coordinates(latitude, longitude)?;
        Ok(self.containing(Coordinates::new(latitude, longitude)))
    }

    /// Unvalidated containment lookup for points already checked upstream.
    pub fn containing(&self, point: Coordinates) -> Vec<Geofence> {
        self.read()
            .iter()
            .filter(|zone| zone.contains(point))
            .cloned()
            .collect()
    }

    pub fn all_zones(&self) -> Vec<Geofence> {
        self.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Geofence> {
        self.read().iter().find(|zone| zone.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registers a new zone under a fresh time-ordered id.
    pub fn add_zone(&self, request: CreateGeofenceRequest) -> Result<Geofence, DomainError> {
        request.check()?;

        let zone = Geofence {
            id: Uuid::now_v7().to_string(),
            name: request.name,
            zone_type: request.zone_type,
            center: Coordinates::new(request.latitude, request.longitude),
            radius_meters: request.radius_meters,
            properties: request.properties,
            created_at: Utc::now(),
        };

        self.write().push(zone.clone());

        tracing::info!(
            zone_id = %zone.id,
            zone_type = %zone.zone_type,
            radius_meters = zone.radius_meters,
            "Geofence registered"
        );

        Ok(zone)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Geofence>> {
        self.zones.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Geofence>> {
        self.zones.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn seed(
    id: &str,
    name: &str,
    zone_type: GeofenceType,
    center: (f64, f64),
    radius_meters: f64,
    properties: GeofenceProperties,
) -> Geofence {
    Geofence {
        id: id.to_string(),
        name: name.to_string(),
        zone_type,
        center: Coordinates::new(center.0, center.1),
        radius_meters,
        properties,
        created_at: Utc::now(),
    }
}

/// The Mumbai/Pune launch zones.
pub fn default_zones() -> Vec<Geofence> {
    let available = GeofenceProperties {
        service_available: true,
        ..Default::default()
    };

    vec![
        seed(
            "mumbai_central",
            "Mumbai Central",
            GeofenceType::ServiceArea,
            (19.0176, 72.8562),
            10_000.0,
            available.clone(),
        ),
        seed(
            "pune_city",
            "Pune City",
            GeofenceType::ServiceArea,
            (18.5204, 73.8567),
            15_000.0,
            available,
        ),
        seed(
            "thane_west",
            "Thane West",
            GeofenceType::ServiceArea,
            (19.2183, 72.9781),
            8_000.0,
            GeofenceProperties::default(),
        ),
        seed(
            "airport_restricted",
            "Airport Restricted Zone",
            GeofenceType::RestrictedZone,
            (19.0896, 72.8656),
            2_000.0,
            GeofenceProperties {
                restrictions: BTreeSet::from(["no_roadside_service".to_string()]),
                ..Default::default()
            },
        ),
        seed(
            "bkc_premium",
            "Bandra Kurla Complex",
            GeofenceType::PremiumZone,
            (19.0607, 72.8633),
            2_000.0,
            GeofenceProperties {
                service_available: true,
                premium_pricing: true,
                ..Default::default()
            },
        ),
        seed(
            "andheri_hub",
            "Andheri Charging Hub",
            GeofenceType::ChargingHub,
            (19.1136, 72.8697),
            500.0,
            GeofenceProperties {
                service_available: true,
                operating_hours: NaiveTime::from_hms_opt(6, 0, 0)
                    .zip(NaiveTime::from_hms_opt(23, 0, 0))
                    .map(|(open, close)| OperatingHours {
                        open,
                        close,
                        timezone: "Asia/Kolkata".to_string(),
                    }),
                ..Default::default()
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::geo::offset_north;

    fn ids(zones: &[Geofence]) -> Vec<&str> {
        zones.iter().map(|z| z.id.as_str()).collect()
    }

    #[test]
    fn test_default_zones_are_valid() {
        let zones = default_zones();
        assert_eq!(zones.len(), 6);
        for zone in &zones {
            assert!(zone.validate_shape().is_ok(), "{}", zone.id);
        }
        assert!(ZoneRegistry::with_zones(zones).is_ok());
    }

    #[test]
    fn test_mumbai_central_point_is_only_in_mumbai_central() {
        let registry = ZoneRegistry::with_default_zones();
        let zones = registry.containing_zones(19.0176, 72.8562).unwrap();
        assert_eq!(ids(&zones), vec!["mumbai_central"]);
    }

    #[test]
    fn test_airport_center_is_in_airport_and_mumbai_central() {
        let registry = ZoneRegistry::with_default_zones();
        let zones = registry.containing_zones(19.0896, 72.8656).unwrap();
        assert_eq!(ids(&zones), vec!["mumbai_central", "airport_restricted"]);
    }

    #[test]
    fn test_far_away_point_is_in_nothing() {
        let registry = ZoneRegistry::with_default_zones();
        assert!(registry.containing_zones(28.6139, 77.2090).unwrap().is_empty());
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let center = Coordinates::new(10.0, 10.0);
        let edge = offset_north(center, 1_000.0);
        let radius = center.distance_to(&edge);
        let registry = ZoneRegistry::with_zones(vec![seed(
            "edge",
            "Edge",
            GeofenceType::ServiceArea,
            (center.latitude, center.longitude),
            radius,
            GeofenceProperties::default(),
        )])
        .unwrap();

        assert_eq!(ids(&registry.containing(edge)), vec!["edge"]);
        assert!(registry.containing(offset_north(center, 1_000.5)).is_empty());
    }

    #[test]
    fn test_containing_zones_rejects_bad_coordinates() {
        let registry = ZoneRegistry::with_default_zones();
        assert!(matches!(
            registry.containing_zones(91.0, 0.0),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            registry.containing_zones(0.0, -181.0),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_add_zone_assigns_fresh_ids() {
        let registry = ZoneRegistry::new();
        assert!(registry.is_empty());

        let request = CreateGeofenceRequest {
            name: "Navi Mumbai".to_string(),
            zone_type: GeofenceType::ServiceArea,
            latitude: 19.0330,
            longitude: 73.0297,
            radius_meters: 12_000.0,
            properties: GeofenceProperties {
                service_available: true,
                ..Default::default()
            },
        };
        let a = registry.add_zone(request.clone()).unwrap();
        let b = registry.add_zone(request).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(&a.id), Some(a.clone()));
        assert_eq!(ids(&registry.containing_zones(19.0330, 73.0297).unwrap()).len(), 2);
    }

    #[test]
    fn test_add_zone_rejects_degenerate_input() {
        let registry = ZoneRegistry::new();
        let request = CreateGeofenceRequest {
            name: "Bad".to_string(),
            zone_type: GeofenceType::PremiumZone,
            latitude: 0.0,
            longitude: 0.0,
            radius_meters: -1.0,
            properties: GeofenceProperties::default(),
        };
        assert!(matches!(
            registry.add_zone(request),
            Err(DomainError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_with_zones_rejects_duplicates() {
        let zones = vec![default_zones()[0].clone(), default_zones()[0].clone()];
        assert!(matches!(
            ZoneRegistry::with_zones(zones),
            Err(DomainError::Conflict(_))
        ));
    }
}
