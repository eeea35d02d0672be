//! Per-user state derived from zone transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingTier {
    #[default]
    Standard,
    Premium,
}

impl PricingTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingTier::Standard => "standard",
            PricingTier::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(PricingTier::Standard),
            "premium" => Some(PricingTier::Premium),
            _ => None,
        }
    }
}

/// Eligibility, pricing and location label maintained by the location
/// event processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserZoneState {
    pub user_id: String,
    pub service_eligible: bool,
    pub pricing_tier: PricingTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_service_area_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_service_area_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserZoneState {
    /// State for a user with no zone history.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            service_eligible: true,
            pricing_tier: PricingTier::Standard,
            current_service_area_id: None,
            current_service_area_name: None,
            updated_at: Utc::now(),
        }
    }
}
