//! Subscription entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::subscription::{PlanType, Subscription, SubscriptionStatus};
use domain::DomainError;

use super::corrupt;

/// Database row mapping for the subscriptions table.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionEntity {
    pub user_id: String,
    pub plan: String,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub requests_used: i32,
    pub requests_limit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionEntity> for Subscription {
    type Error = DomainError;

    fn try_from(entity: SubscriptionEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            plan: PlanType::parse(&entity.plan).ok_or_else(|| corrupt("plan", &entity.plan))?,
            status: SubscriptionStatus::parse(&entity.status)
                .ok_or_else(|| corrupt("status", &entity.status))?,
            user_id: entity.user_id,
            start_date: entity.start_date,
            end_date: entity.end_date,
            requests_used: entity.requests_used,
            requests_limit: entity.requests_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(plan: &str, limit: i32) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            user_id: "uid_1".to_string(),
            plan: plan.to_string(),
            status: "active".to_string(),
            start_date: now,
            end_date: None,
            requests_used: 7,
            requests_limit: limit,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_entity_to_domain() {
        let sub = Subscription::try_from(entity("enterprise", -1)).unwrap();
        assert_eq!(sub.plan, PlanType::Enterprise);
        assert!(sub.is_unlimited());
        assert_eq!(sub.requests_used, 7);
    }

    #[test]
    fn test_unknown_plan() {
        assert!(Subscription::try_from(entity("platinum", 50)).is_err());
    }
}
