//! Emergency request entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::emergency_request::{
    AssignedProvider, EmergencyRequest, RequestLocation, RequestPriority, RequestStatus,
    RequestType, RequesterContact, VehicleInfo,
};
use domain::models::user_zone_state::PricingTier;
use domain::DomainError;

use super::corrupt;

/// Database row mapping for the emergency_requests table.
#[derive(Debug, Clone, FromRow)]
pub struct EmergencyRequestEntity {
    pub id: Uuid,
    pub user_id: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub vehicle_type: String,
    pub vehicle_model: String,
    pub battery_level: i32,
    pub request_type: String,
    pub priority: String,
    pub status: String,
    pub provider_id: Option<String>,
    pub provider_name: Option<String>,
    pub provider_phone: Option<String>,
    pub provider_vehicle_id: Option<String>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub notes: String,
    pub pricing_tier: String,
    pub cost: f64,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EmergencyRequestEntity> for EmergencyRequest {
    type Error = DomainError;

    fn try_from(entity: EmergencyRequestEntity) -> Result<Self, Self::Error> {
        let request_type = RequestType::parse(&entity.request_type)
            .ok_or_else(|| corrupt("request_type", &entity.request_type))?;
        let priority = RequestPriority::parse(&entity.priority)
            .ok_or_else(|| corrupt("priority", &entity.priority))?;
        let status = RequestStatus::parse(&entity.status)
            .ok_or_else(|| corrupt("status", &entity.status))?;
        let pricing_tier = PricingTier::parse(&entity.pricing_tier)
            .ok_or_else(|| corrupt("pricing_tier", &entity.pricing_tier))?;

        let assigned_provider = entity.provider_id.map(|id| AssignedProvider {
            id,
            name: entity.provider_name.unwrap_or_default(),
            phone: entity.provider_phone.unwrap_or_default(),
            vehicle_id: entity.provider_vehicle_id.unwrap_or_default(),
        });

        Ok(Self {
            id: entity.id,
            user_id: entity.user_id,
            contact: RequesterContact {
                name: entity.contact_name,
                phone: entity.contact_phone,
                email: entity.contact_email,
            },
            location: RequestLocation {
                latitude: entity.latitude,
                longitude: entity.longitude,
                address: entity.address,
            },
            vehicle_info: VehicleInfo {
                vehicle_type: entity.vehicle_type,
                model: entity.vehicle_model,
                battery_level: entity.battery_level,
            },
            request_type,
            priority,
            status,
            assigned_provider,
            estimated_arrival: entity.estimated_arrival,
            actual_arrival: entity.actual_arrival,
            notes: entity.notes,
            pricing_tier,
            cost: entity.cost,
            rating: entity.rating,
            feedback: entity.feedback,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
