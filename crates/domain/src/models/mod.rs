//! Domain models for EV Assist.

pub mod actor;
pub mod emergency_request;
pub mod geofence;
pub mod location;
pub mod notification;
pub mod subscription;
pub mod user_zone_state;

pub use actor::{Actor, ActorRole};
pub use emergency_request::{EmergencyRequest, RequestStatus};
pub use geofence::{Geofence, GeofenceType};
pub use location::{LocationEvent, UserLocationSample};
pub use notification::{NewNotification, Notification, NotificationPriority, NotificationType};
pub use subscription::{RequestEligibility, Subscription};
pub use user_zone_state::{PricingTier, UserZoneState};
