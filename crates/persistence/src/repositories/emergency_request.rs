//! Emergency request repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::emergency_request::EmergencyRequest;
use domain::services::request_lifecycle::{RequestStore, StatusChange};
use domain::DomainError;

use crate::entities::EmergencyRequestEntity;
use crate::metrics::QueryTimer;

/// Repository for emergency request database operations.
#[derive(Clone)]
pub struct EmergencyRequestRepository {
    pool: PgPool,
}

impl EmergencyRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for EmergencyRequestRepository {
    async fn insert(&self, request: EmergencyRequest) -> Result<EmergencyRequest, DomainError> {
        let provider = request.assigned_provider.as_ref();
        let timer = QueryTimer::new("insert_emergency_request");
        let result = sqlx::query_as::<_, EmergencyRequestEntity>(
            r#"
            INSERT INTO emergency_requests (
                id, user_id, contact_name, contact_phone, contact_email,
                latitude, longitude, address, vehicle_type, vehicle_model, battery_level,
                request_type, priority, status,
                provider_id, provider_name, provider_phone, provider_vehicle_id,
                estimated_arrival, actual_arrival, notes, pricing_tier, cost, rating, feedback,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(&request.user_id)
        .bind(&request.contact.name)
        .bind(&request.contact.phone)
        .bind(&request.contact.email)
        .bind(request.location.latitude)
        .bind(request.location.longitude)
        .bind(&request.location.address)
        .bind(&request.vehicle_info.vehicle_type)
        .bind(&request.vehicle_info.model)
        .bind(request.vehicle_info.battery_level)
        .bind(request.request_type.as_str())
        .bind(request.priority.as_str())
        .bind(request.status.as_str())
        .bind(provider.map(|p| p.id.as_str()))
        .bind(provider.map(|p| p.name.as_str()))
        .bind(provider.map(|p| p.phone.as_str()))
        .bind(provider.map(|p| p.vehicle_id.as_str()))
        .bind(request.estimated_arrival)
        .bind(request.actual_arrival)
        .bind(&request.notes)
        .bind(request.pricing_tier.as_str())
        .bind(request.cost)
        .bind(request.rating)
        .bind(&request.feedback)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);

        result?.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<EmergencyRequest>, DomainError> {
        let timer = QueryTimer::new("find_emergency_request_by_id");
        let result = sqlx::query_as::<_, EmergencyRequestEntity>(
            r#"
            SELECT * FROM emergency_requests WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        result?.map(TryInto::try_into).transpose()
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<EmergencyRequest>, DomainError> {
        let timer = QueryTimer::new("find_emergency_requests_by_user");
        let result = sqlx::query_as::<_, EmergencyRequestEntity>(
            r#"
            SELECT * FROM emergency_requests
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);

        result?.into_iter().map(TryInto::try_into).collect()
    }

    async fn apply_status_change(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Option<EmergencyRequest>, DomainError> {
        let provider = change.assigned_provider.as_ref();
        let timer = QueryTimer::new("update_emergency_request_status");
        let result = sqlx::query_as::<_, EmergencyRequestEntity>(
            r#"
            UPDATE emergency_requests
            SET status = $3,
                provider_id = COALESCE($4, provider_id),
                provider_name = COALESCE($5, provider_name),
                provider_phone = COALESCE($6, provider_phone),
                provider_vehicle_id = COALESCE($7, provider_vehicle_id),
                estimated_arrival = COALESCE($8, estimated_arrival),
                actual_arrival = COALESCE($9, actual_arrival),
                updated_at = $10
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(provider.map(|p| p.id.as_str()))
        .bind(provider.map(|p| p.name.as_str()))
        .bind(provider.map(|p| p.phone.as_str()))
        .bind(provider.map(|p| p.vehicle_id.as_str()))
        .bind(change.estimated_arrival)
        .bind(change.actual_arrival)
        .bind(change.updated_at)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        result?.map(TryInto::try_into).transpose()
    }

    async fn set_rating(
        &self,
        id: Uuid,
        rating: i32,
        feedback: Option<String>,
    ) -> Result<Option<EmergencyRequest>, DomainError> {
        let timer = QueryTimer::new("rate_emergency_request");
        let result = sqlx::query_as::<_, EmergencyRequestEntity>(
            r#"
            UPDATE emergency_requests
            SET rating = $2, feedback = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(rating)
        .bind(feedback)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        result?.map(TryInto::try_into).transpose()
    }
}
