//! Location samples and the zone transitions derived from them.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use shared::geo::Coordinates;

use crate::error::DomainError;
use crate::models::geofence::Geofence;

/// The most recent position reported by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocationSample {
    pub user_id: String,
    pub coordinates: Coordinates,
    /// Reported horizontal accuracy in meters.
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl UserLocationSample {
    pub fn new(user_id: impl Into<String>, coordinates: Coordinates, accuracy: f64) -> Self {
        Self {
            user_id: user_id.into(),
            coordinates,
            accuracy,
            timestamp: Utc::now(),
        }
    }
}

/// Result of processing one location update. Not persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEvent {
    pub user_id: String,
    pub location: UserLocationSample,
    pub entered: Vec<Geofence>,
    pub exited: Vec<Geofence>,
    pub current: Vec<Geofence>,
}

impl LocationEvent {
    pub fn entered_ids(&self) -> Vec<&str> {
        self.entered.iter().map(|g| g.id.as_str()).collect()
    }

    pub fn exited_ids(&self) -> Vec<&str> {
        self.exited.iter().map(|g| g.id.as_str()).collect()
    }

    pub fn current_ids(&self) -> Vec<&str> {
        self.current.iter().map(|g| g.id.as_str()).collect()
    }
}

/// Request payload for reporting a location sample.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: f64,
    /// Capture time in milliseconds since epoch. Defaults to receipt time.
    pub timestamp: Option<i64>,
}

impl ReportLocationRequest {
    pub fn check(&self) -> Result<(), DomainError> {
        shared::validation::validate_coordinates(self.latitude, self.longitude)?;
        shared::validation::validate_accuracy(self.accuracy)?;
        if let Some(ts) = self.timestamp {
            shared::validation::validate_timestamp(ts)?;
        }
        Ok(())
    }

    /// Capture time, falling back to now when absent.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.timestamp
            .and_then(|ts| Utc.timestamp_millis_opt(ts).single())
            .unwrap_or_else(Utc::now)
    }
}
