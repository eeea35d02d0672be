//! Emergency roadside-assistance request model and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;
use crate::models::user_zone_state::PricingTier;

/// Kind of assistance requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Charging,
    Towing,
    JumpStart,
    TireChange,
    Other,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Charging => "charging",
            RequestType::Towing => "towing",
            RequestType::JumpStart => "jump_start",
            RequestType::TireChange => "tire_change",
            RequestType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "charging" => Some(RequestType::Charging),
            "towing" => Some(RequestType::Towing),
            "jump_start" => Some(RequestType::JumpStart),
            "tire_change" => Some(RequestType::TireChange),
            "other" => Some(RequestType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl RequestPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPriority::Low => "low",
            RequestPriority::Medium => "medium",
            RequestPriority::High => "high",
            RequestPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RequestPriority::Low),
            "medium" => Some(RequestPriority::Medium),
            "high" => Some(RequestPriority::High),
            "urgent" => Some(RequestPriority::Urgent),
            _ => None,
        }
    }
}

/// Lifecycle status of a request.
///
/// ```text
/// pending ──► assigned ──► in_progress ──► completed
///    │            │             │
///    └────────────┴─────────────┴────────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Assigned,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    /// Statuses reachable in one step from `self`.
    pub fn allowed_successors(&self) -> &'static [RequestStatus] {
        match self {
            RequestStatus::Pending => &[RequestStatus::Assigned, RequestStatus::Cancelled],
            RequestStatus::Assigned => &[RequestStatus::InProgress, RequestStatus::Cancelled],
            RequestStatus::InProgress => &[RequestStatus::Completed, RequestStatus::Cancelled],
            RequestStatus::Completed | RequestStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        self.allowed_successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_successors().is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Assigned => "assigned",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "assigned" => Some(RequestStatus::Assigned),
            "in_progress" => Some(RequestStatus::InProgress),
            "completed" => Some(RequestStatus::Completed),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requester contact details captured when the request is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequesterContact {
    #[validate(length(min = 1, max = 100, message = "Contact name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 5, max = 20, message = "Contact phone must be 5-20 characters"))]
    pub phone: String,
    #[validate(email(message = "Contact email is invalid"))]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestLocation {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "Longitude must be between -180 and 180"
    ))]
    pub longitude: f64,
    #[serde(default)]
    pub address: String,
}

/// Vehicle snapshot at request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    #[validate(length(min = 1, message = "Vehicle type is required"))]
    pub vehicle_type: String,
    #[serde(default)]
    pub model: String,
    #[validate(range(min = 0, max = 100, message = "Battery level must be between 0 and 100"))]
    pub battery_level: i32,
}

/// The mobile service unit handling a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignedProvider {
    #[validate(length(min = 1, message = "Provider id is required"))]
    pub id: String,
    #[validate(length(min = 1, message = "Provider name is required"))]
    pub name: String,
    pub phone: String,
    pub vehicle_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub id: Uuid,
    pub user_id: String,
    pub contact: RequesterContact,
    pub location: RequestLocation,
    pub vehicle_info: VehicleInfo,
    pub request_type: RequestType,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_provider: Option<AssignedProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_arrival: Option<DateTime<Utc>>,
    pub notes: String,
    /// Pricing in effect where the user was when the request was created.
    #[serde(default)]
    pub pricing_tier: PricingTier,
    /// Set by billing; never negative.
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmergencyRequest {
    pub fn assigned_provider_id(&self) -> Option<&str> {
        self.assigned_provider.as_ref().map(|p| p.id.as_str())
    }
}

/// Request payload for creating an emergency request.
///
/// Location, vehicle info and request type are optional at the wire level so
/// that their absence is reported as a validation error rather than a
/// deserialization failure.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmergencyRequest {
    #[validate(nested)]
    pub contact: RequesterContact,
    #[validate(nested)]
    pub location: Option<RequestLocation>,
    #[validate(nested)]
    pub vehicle_info: Option<VehicleInfo>,
    pub request_type: Option<RequestType>,
    #[serde(default)]
    pub priority: RequestPriority,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: String,
}

impl CreateEmergencyRequest {
    /// Checks required fields, then field-level rules.
    pub fn check(&self) -> Result<(), DomainError> {
        if self.location.is_none() {
            return Err(DomainError::validation("Location is required"));
        }
        if self.vehicle_info.is_none() {
            return Err(DomainError::validation("Vehicle information is required"));
        }
        if self.request_type.is_none() {
            return Err(DomainError::validation("Request type is required"));
        }
        self.validate()?;
        Ok(())
    }

    /// Builds a new `pending` request owned by `user_id`.
    pub fn into_request(self, user_id: &str) -> Result<EmergencyRequest, DomainError> {
        self.check()?;
        let now = Utc::now();
        let (Some(location), Some(vehicle_info), Some(request_type)) =
            (self.location, self.vehicle_info, self.request_type)
        else {
            return Err(DomainError::validation("Missing required request fields"));
        };

        Ok(EmergencyRequest {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            contact: self.contact,
            location,
            vehicle_info,
            request_type,
            priority: self.priority,
            status: RequestStatus::Pending,
            assigned_provider: None,
            estimated_arrival: None,
            actual_arrival: None,
            notes: self.notes,
            pricing_tier: PricingTier::Standard,
            cost: 0.0,
            rating: None,
            feedback: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Request payload for a status change. The status is kept as text so that
/// unknown values are rejected with a validation error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
}

impl UpdateStatusRequest {
    pub fn parse_status(&self) -> Result<RequestStatus, DomainError> {
        RequestStatus::parse(&self.status).ok_or_else(|| {
            DomainError::Validation(format!("Unknown request status '{}'", self.status))
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignProviderRequest {
    #[validate(nested)]
    pub provider: AssignedProvider,
    pub estimated_arrival: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RateRequestPayload {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 1000, message = "Feedback must be at most 1000 characters"))]
    pub feedback: Option<String>,
}

/// Response for a user's service history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequestsResponse {
    pub requests: Vec<EmergencyRequest>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_payload() -> CreateEmergencyRequest {
        CreateEmergencyRequest {
            contact: RequesterContact {
                name: "Asha Rao".to_string(),
                phone: "+919800000000".to_string(),
                email: "asha@example.com".to_string(),
            },
            location: Some(RequestLocation {
                latitude: 19.0176,
                longitude: 72.8562,
                address: "Mumbai Central".to_string(),
            }),
            vehicle_info: Some(VehicleInfo {
                vehicle_type: "car".to_string(),
                model: "Nexon EV".to_string(),
                battery_level: 4,
            }),
            request_type: Some(RequestType::Charging),
            priority: RequestPriority::High,
            notes: String::new(),
        }
    }

    #[test]
    fn test_transition_table() {
        use RequestStatus::*;
        assert_eq!(Pending.allowed_successors(), &[Assigned, Cancelled]);
        assert_eq!(Assigned.allowed_successors(), &[InProgress, Cancelled]);
        assert_eq!(InProgress.allowed_successors(), &[Completed, Cancelled]);
        assert!(Completed.allowed_successors().is_empty());
        assert!(Cancelled.allowed_successors().is_empty());
    }

    #[test]
    fn test_no_self_transitions() {
        for status in RequestStatus::ALL {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_status_parse_and_serde_agree() {
        for status in RequestStatus::ALL {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(RequestStatus::parse("on_hold"), None);
    }

    #[test]
    fn test_request_type_and_priority_parse() {
        assert_eq!(RequestType::parse("jump_start"), Some(RequestType::JumpStart));
        assert_eq!(RequestType::parse("teleport"), None);
        assert_eq!(RequestPriority::parse("urgent"), Some(RequestPriority::Urgent));
        assert_eq!(RequestPriority::default(), RequestPriority::Medium);
    }

    #[test]
    fn test_into_request_defaults() {
        let request = create_payload().into_request("uid_1").unwrap();
        assert_eq!(request.user_id, "uid_1");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.cost, 0.0);
        assert!(request.assigned_provider.is_none());
        assert_eq!(request.contact.name, "Asha Rao");
    }

    #[test]
    fn test_check_requires_location_vehicle_and_type() {
        let mut payload = create_payload();
        payload.location = None;
        assert_eq!(
            payload.check(),
            Err(DomainError::Validation("Location is required".into()))
        );

        let mut payload = create_payload();
        payload.vehicle_info = None;
        assert_eq!(
            payload.check(),
            Err(DomainError::Validation("Vehicle information is required".into()))
        );

        let mut payload = create_payload();
        payload.request_type = None;
        assert_eq!(
            payload.check(),
            Err(DomainError::Validation("Request type is required".into()))
        );
    }

    #[test]
    fn test_check_validates_nested_fields() {
        let mut payload = create_payload();
        if let Some(v) = payload.vehicle_info.as_mut() {
            v.battery_level = 140;
        }
        assert!(matches!(payload.check(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_create_payload_deserialization_missing_fields() {
        let json = r#"{
            "contact": {"name": "A", "phone": "12345", "email": "a@example.com"},
            "requestType": "towing"
        }"#;
        let payload: CreateEmergencyRequest = serde_json::from_str(json).unwrap();
        assert!(payload.location.is_none());
        assert_eq!(payload.priority, RequestPriority::Medium);
        assert!(payload.check().is_err());
    }

    #[test]
    fn test_update_status_rejects_unknown() {
        let update = UpdateStatusRequest {
            status: "teleported".to_string(),
        };
        assert!(matches!(update.parse_status(), Err(DomainError::Validation(_))));

        let update = UpdateStatusRequest {
            status: "in_progress".to_string(),
        };
        assert_eq!(update.parse_status(), Ok(RequestStatus::InProgress));
    }

    #[test]
    fn test_request_serialization_skips_empty_optionals() {
        let request = create_payload().into_request("uid_1").unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["requestType"], "charging");
        assert!(json.get("assignedProvider").is_none());
        assert!(json.get("rating").is_none());
    }
}
