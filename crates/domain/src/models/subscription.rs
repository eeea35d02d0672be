//! Subscription plan and request-quota model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `requests_limit` value meaning "no cap".
pub const UNLIMITED_REQUESTS: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Basic,
    Premium,
    Enterprise,
}

impl PlanType {
    /// Requests per billing period included in the plan.
    pub fn default_requests_limit(&self) -> i32 {
        match self {
            PlanType::Basic => 2,
            PlanType::Premium => 10,
            PlanType::Enterprise => UNLIMITED_REQUESTS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Basic => "basic",
            PlanType::Premium => "premium",
            PlanType::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(PlanType::Basic),
            "premium" => Some(PlanType::Premium),
            "enterprise" => Some(PlanType::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "inactive" => Some(SubscriptionStatus::Inactive),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub user_id: String,
    pub plan: PlanType,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub requests_used: i32,
    pub requests_limit: i32,
}

impl Subscription {
    /// The plan every new account starts on.
    pub fn new_basic(user_id: impl Into<String>) -> Self {
        Self::new(user_id, PlanType::Basic)
    }

    pub fn new(user_id: impl Into<String>, plan: PlanType) -> Self {
        Self {
            user_id: user_id.into(),
            plan,
            status: SubscriptionStatus::Active,
            start_date: Utc::now(),
            end_date: None,
            requests_used: 0,
            requests_limit: plan.default_requests_limit(),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.requests_limit == UNLIMITED_REQUESTS
    }

    /// Requests left this period, or [`UNLIMITED_REQUESTS`] when uncapped.
    /// Never negative otherwise.
    pub fn remaining_requests(&self) -> i32 {
        if self.is_unlimited() {
            UNLIMITED_REQUESTS
        } else {
            (self.requests_limit - self.requests_used).max(0)
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.is_unlimited() || self.requests_limit - self.requests_used > 0
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end <= now)
    }
}

/// Non-throwing answer to "may this user create a request now?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEligibility {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_requests: Option<i32>,
}

impl RequestEligibility {
    pub fn allowed(remaining_requests: i32) -> Self {
        Self {
            allowed: true,
            reason: None,
            remaining_requests: Some(remaining_requests),
        }
    }

    pub fn denied(reason: impl Into<String>, remaining_requests: Option<i32>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            remaining_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_plan_limits() {
        assert_eq!(PlanType::Basic.default_requests_limit(), 2);
        assert_eq!(PlanType::Premium.default_requests_limit(), 10);
        assert_eq!(
            PlanType::Enterprise.default_requests_limit(),
            UNLIMITED_REQUESTS
        );
    }

    #[test]
    fn test_new_basic() {
        let sub = Subscription::new_basic("uid_1");
        assert_eq!(sub.plan, PlanType::Basic);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.requests_used, 0);
        assert_eq!(sub.remaining_requests(), 2);
        assert!(sub.has_capacity());
    }

    #[test]
    fn test_remaining_requests_exhausted() {
        let mut sub = Subscription::new_basic("uid_1");
        sub.requests_used = 2;
        assert_eq!(sub.remaining_requests(), 0);
        assert!(!sub.has_capacity());
    }

    #[test]
    fn test_remaining_requests_unlimited() {
        let mut sub = Subscription::new("uid_1", PlanType::Enterprise);
        sub.requests_used = 10_000;
        assert!(sub.is_unlimited());
        assert_eq!(sub.remaining_requests(), UNLIMITED_REQUESTS);
        assert!(sub.has_capacity());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut sub = Subscription::new_basic("uid_1");
        assert!(!sub.is_expired_at(now));
        sub.end_date = Some(now - Duration::days(1));
        assert!(sub.is_expired_at(now));
    }

    #[test]
    fn test_eligibility_serialization() {
        let json = serde_json::to_value(RequestEligibility::denied(
            "Monthly request limit exceeded",
            Some(0),
        ))
        .unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["reason"], "Monthly request limit exceeded");
        assert_eq!(json["remainingRequests"], 0);

        let json = serde_json::to_value(RequestEligibility::allowed(-1)).unwrap();
        assert!(json.get("reason").is_none());
        assert_eq!(json["remainingRequests"], -1);
    }
}
