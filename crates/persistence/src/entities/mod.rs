//! Entity definitions (database row mappings).

pub mod emergency_request;
pub mod notification;
pub mod subscription;
pub mod user_zone_state;

pub use emergency_request::EmergencyRequestEntity;
pub use notification::NotificationEntity;
pub use subscription::SubscriptionEntity;
pub use user_zone_state::UserZoneStateEntity;

use domain::DomainError;

/// A stored enum column held a value the domain does not know.
pub(crate) fn corrupt(column: &str, value: &str) -> DomainError {
    DomainError::Infrastructure(format!("unexpected {column} value '{value}' in database"))
}
