//! Geofence domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared::geo::Coordinates;
use validator::Validate;

use crate::error::DomainError;

/// Kind of area a geofence describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceType {
    ServiceArea,
    RestrictedZone,
    PremiumZone,
    ChargingHub,
}

impl GeofenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceType::ServiceArea => "service_area",
            GeofenceType::RestrictedZone => "restricted_zone",
            GeofenceType::PremiumZone => "premium_zone",
            GeofenceType::ChargingHub => "charging_hub",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "service_area" => Some(GeofenceType::ServiceArea),
            "restricted_zone" => Some(GeofenceType::RestrictedZone),
            "premium_zone" => Some(GeofenceType::PremiumZone),
            "charging_hub" => Some(GeofenceType::ChargingHub),
            _ => None,
        }
    }
}

impl std::fmt::Display for GeofenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily opening window, expressed in the zone's local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// IANA time zone name, e.g. `Asia/Kolkata`.
    pub timezone: String,
}

impl OperatingHours {
    /// Whether the window covers `local`. Windows where `close < open` wrap
    /// past midnight.
    pub fn contains_local(&self, local: NaiveTime) -> bool {
        if self.open <= self.close {
            local >= self.open && local < self.close
        } else {
            local >= self.open || local < self.close
        }
    }

    /// Whether the zone is open at `at`. `None` when the time zone is unknown.
    pub fn is_open_at(&self, at: DateTime<Utc>) -> Option<bool> {
        let tz: Tz = self.timezone.parse().ok()?;
        Some(self.contains_local(at.with_timezone(&tz).time()))
    }
}

/// Availability and pricing flags attached to a geofence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceProperties {
    pub service_available: bool,
    pub premium_pricing: bool,
    #[serde(default)]
    pub restrictions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_hours: Option<OperatingHours>,
}

/// A named circular region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: GeofenceType,
    pub center: Coordinates,
    pub radius_meters: f64,
    pub properties: GeofenceProperties,
    pub created_at: DateTime<Utc>,
}

impl Geofence {
    /// Checks the coordinate and radius invariants.
    pub fn validate_shape(&self) -> Result<(), DomainError> {
        shared::validation::validate_coordinates(self.center.latitude, self.center.longitude)?;
        shared::validation::validate_radius(self.radius_meters)?;
        Ok(())
    }

    /// Great-circle distance from the zone center to `point`, in meters.
    pub fn distance_to(&self, point: Coordinates) -> f64 {
        self.center.distance_to(&point)
    }

    /// Closed containment: a point exactly on the boundary is inside.
    pub fn contains(&self, point: Coordinates) -> bool {
        self.distance_to(point) <= self.radius_meters
    }
}

/// Request payload for registering a geofence at runtime.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeofenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[serde(rename = "type")]
    pub zone_type: GeofenceType,

    pub latitude: f64,

    pub longitude: f64,

    pub radius_meters: f64,

    #[serde(default)]
    pub properties: GeofenceProperties,
}

impl CreateGeofenceRequest {
    /// Runs field validation plus the coordinate and radius range checks.
    pub fn check(&self) -> Result<(), DomainError> {
        self.validate()?;
        shared::validation::validate_coordinates(self.latitude, self.longitude)?;
        shared::validation::validate_radius(self.radius_meters)?;
        Ok(())
    }
}

/// Response for listing geofences.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesResponse {
    pub geofences: Vec<Geofence>,
    pub total: usize,
}

/// Query parameters for a containment lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainingZonesQuery {
    pub latitude: f64,
    pub longitude: f64,
}
