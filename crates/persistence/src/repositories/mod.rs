//! PostgreSQL implementations of the domain store traits.

pub mod emergency_request;
pub mod notification;
pub mod subscription;
pub mod user_zone_state;

pub use emergency_request::EmergencyRequestRepository;
pub use notification::NotificationRepository;
pub use subscription::SubscriptionRepository;
pub use user_zone_state::UserZoneStateRepository;
