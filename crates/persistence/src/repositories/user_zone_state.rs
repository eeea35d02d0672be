//! User zone state repository.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::geofence::Geofence;
use domain::models::user_zone_state::{PricingTier, UserZoneState};
use domain::services::location_processor::UserZoneStateStore;
use domain::DomainError;

use crate::entities::UserZoneStateEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct UserZoneStateRepository {
    pool: PgPool,
}

impl UserZoneStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserZoneStateStore for UserZoneStateRepository {
    async fn get(&self, user_id: &str) -> Result<UserZoneState, DomainError> {
        let timer = QueryTimer::new("find_user_zone_state");
        let result = sqlx::query_as::<_, UserZoneStateEntity>(
            r#"
            SELECT * FROM user_zone_states WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        match result? {
            Some(entity) => entity.try_into(),
            None => Ok(UserZoneState::new(user_id)),
        }
    }

    async fn set_service_eligibility(
        &self,
        user_id: &str,
        eligible: bool,
    ) -> Result<(), DomainError> {
        let timer = QueryTimer::new("set_service_eligibility");
        let result = sqlx::query(
            r#"
            INSERT INTO user_zone_states (user_id, service_eligible)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET service_eligible = EXCLUDED.service_eligible, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(eligible)
        .execute(&self.pool)
        .await;
        timer.finish(&result);

        result?;
        Ok(())
    }

    async fn set_pricing_tier(&self, user_id: &str, tier: PricingTier) -> Result<(), DomainError> {
        let timer = QueryTimer::new("set_pricing_tier");
        let result = sqlx::query(
            r#"
            INSERT INTO user_zone_states (user_id, pricing_tier)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET pricing_tier = EXCLUDED.pricing_tier, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(tier.as_str())
        .execute(&self.pool)
        .await;
        timer.finish(&result);

        result?;
        Ok(())
    }

    async fn set_current_service_area(
        &self,
        user_id: &str,
        area: Option<&Geofence>,
    ) -> Result<(), DomainError> {
        let timer = QueryTimer::new("set_current_service_area");
        let result = sqlx::query(
            r#"
            INSERT INTO user_zone_states (user_id, current_service_area_id, current_service_area_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET current_service_area_id = EXCLUDED.current_service_area_id,
                current_service_area_name = EXCLUDED.current_service_area_name,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(area.map(|a| a.id.as_str()))
        .bind(area.map(|a| a.name.as_str()))
        .execute(&self.pool)
        .await;
        timer.finish(&result);

        result?;
        Ok(())
    }
}
