//! User zone state entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::user_zone_state::{PricingTier, UserZoneState};
use domain::DomainError;

use super::corrupt;

#[derive(Debug, Clone, FromRow)]
pub struct UserZoneStateEntity {
    pub user_id: String,
    pub service_eligible: bool,
    pub pricing_tier: String,
    pub current_service_area_id: Option<String>,
    pub current_service_area_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserZoneStateEntity> for UserZoneState {
    type Error = DomainError;

    fn try_from(entity: UserZoneStateEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            pricing_tier: PricingTier::parse(&entity.pricing_tier)
                .ok_or_else(|| corrupt("pricing_tier", &entity.pricing_tier))?,
            user_id: entity.user_id,
            service_eligible: entity.service_eligible,
            current_service_area_id: entity.current_service_area_id,
            current_service_area_name: entity.current_service_area_name,
            updated_at: entity.updated_at,
        })
    }
}
